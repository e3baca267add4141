//! # Kotoha Trainer
//!
//! Loads span-annotated training corpora and drives a
//! [`kotoha_core::Pipeline`] through shuffled-minibatch updates to fit or
//! fine-tune an entity model, then persists the result.

pub mod batch;
pub mod data;
pub mod infer;
pub mod trainer;

pub use data::{CorpusError, TrainingExample, load_corpus, load_corpus_or_empty};
pub use infer::infer;
pub use trainer::{TrainConfig, train};
