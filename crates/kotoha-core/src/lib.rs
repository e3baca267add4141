//! # Kotoha Core
//!
//! Span-based named-entity recognition. Provides the offset-preserving
//! tokenizer, the BIO tagging model, and the [`Pipeline`] container that
//! loads, updates, and persists entity-recognition models.
//!
//! ## Quick Start
//!
//! ```rust
//! use kotoha_core::Pipeline;
//!
//! let mut nlp = Pipeline::blank("en");
//! nlp.add_entity_recognizer();
//! nlp.entity_recognizer_mut().unwrap().add_label("CITY");
//!
//! assert_eq!(nlp.pipe_names(), ["ner"]);
//! ```
pub mod error;
pub mod model;
pub mod pipeline;
pub mod recognizer;
pub mod tags;
pub mod tokenizer;
pub mod types;

// Re-export primary API
pub use error::{KotohaError, Result};
pub use pipeline::{ENTITY_RECOGNIZER, Pipeline, TRAINING_ACTIVE_STAGES};
pub use recognizer::EntityRecognizer;
pub use tags::TagSet;
pub use tokenizer::{Token, Tokenizer};
pub use types::{EntitySpan, ExtractedEntity};
