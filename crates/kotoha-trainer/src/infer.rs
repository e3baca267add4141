//! Inference over a saved model.

use std::path::Path;

use anyhow::Context;

use kotoha_core::{ExtractedEntity, Pipeline};

/// Load a trained model directory and extract entities from one text.
///
/// This is a standalone operation with no import-time side effects; it can
/// be called without ever touching the training path.
pub fn infer(model_dir: impl AsRef<Path>, text: &str) -> anyhow::Result<Vec<ExtractedEntity>> {
    let model_dir = model_dir.as_ref();
    let nlp = Pipeline::load(model_dir)
        .with_context(|| format!("loading model from {}", model_dir.display()))?;
    Ok(nlp.extract_entities(text))
}
