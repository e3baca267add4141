//! Training orchestration: shuffled compounding minibatches over a corpus,
//! driving the pipeline's update step.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use oorandom::Rand32;

use kotoha_core::{ENTITY_RECOGNIZER, EntitySpan, Pipeline, TRAINING_ACTIVE_STAGES};

use crate::batch::{compounding, minibatch};
use crate::data::load_corpus_or_empty;

/// Dropout probability applied on every update step.
const DROPOUT: f32 = 0.5;

/// Compounding minibatch schedule bounds.
const BATCH_START: f64 = 4.0;
const BATCH_STOP: f64 = 32.0;
const BATCH_FACTOR: f64 = 1.001;

/// Parameters for one training run.
#[derive(Debug, Clone)]
pub struct TrainConfig<'a> {
    /// Path to the training data JSON file.
    pub input: &'a Path,
    /// Directory the trained model is written to. `None` keeps the model in
    /// memory only.
    pub output_dir: Option<&'a Path>,
    /// Saved model to fine-tune. `None` starts from a blank pipeline.
    pub base_model: Option<&'a str>,
    /// Number of training rounds.
    pub n_iter: usize,
    /// RNG seed for shuffling and dropout. `None` seeds from the clock.
    pub seed: Option<u64>,
}

impl<'a> TrainConfig<'a> {
    pub fn new(input: &'a Path) -> Self {
        Self {
            input,
            output_dir: None,
            base_model: None,
            n_iter: 100,
            seed: None,
        }
    }
}

/// Fit or fine-tune an entity model and return the trained pipeline.
///
/// The corpus is loaded fail-soft: an unreadable or malformed training file
/// means zero examples, an empty label set, and no-op training rounds (see
/// [`load_corpus_or_empty`]). Everything else — base-model load, update
/// steps, output-directory creation, save — is fatal and aborts the run.
pub fn train(config: &TrainConfig<'_>) -> anyhow::Result<Pipeline> {
    let mut nlp = match config.base_model {
        Some(name) => {
            let nlp = Pipeline::load(name)
                .with_context(|| format!("loading base model '{name}'"))?;
            println!("Loaded model '{name}'");
            nlp
        }
        None => {
            println!("Created blank 'en' model");
            Pipeline::blank("en")
        }
    };

    if !nlp.has_stage(ENTITY_RECOGNIZER) {
        nlp.add_entity_recognizer();
    }

    let mut corpus = load_corpus_or_empty(config.input);
    println!("Loaded {} training examples", corpus.len());

    let ner = nlp
        .entity_recognizer_mut()
        .context("pipeline has no entity recognizer")?;
    for example in &corpus {
        for span in &example.entities {
            ner.add_label(&span.label);
        }
    }

    let mut rng = Rand32::new(config.seed.unwrap_or_else(clock_seed));
    let fresh = config.base_model.is_none();
    let n_iter = config.n_iter;

    nlp.with_only_stages(TRAINING_ACTIVE_STAGES, |nlp| -> anyhow::Result<()> {
        // Reset and initialize the weights, but only for a new model
        if fresh {
            nlp.begin_training();
        }

        for round in 0..n_iter {
            shuffle(&mut corpus, &mut rng);
            let mut losses: HashMap<String, f32> = HashMap::new();

            for batch in minibatch(&corpus, compounding(BATCH_START, BATCH_STOP, BATCH_FACTOR)) {
                let texts: Vec<&str> = batch.iter().map(|ex| ex.text.as_str()).collect();
                let annotations: Vec<&[EntitySpan]> =
                    batch.iter().map(|ex| ex.entities.as_slice()).collect();
                nlp.update(&texts, &annotations, DROPOUT, &mut losses, &mut rng)?;
            }

            println!("Iteration {}/{} - losses: {:?}", round + 1, n_iter, losses);
        }

        Ok(())
    })?;

    if let Some(dir) = config.output_dir {
        if !dir.exists() {
            // Non-recursive: a missing parent directory is an error
            fs::create_dir(dir)
                .with_context(|| format!("creating output directory {}", dir.display()))?;
        }
        nlp.save(dir)
            .with_context(|| format!("saving model to {}", dir.display()))?;
        println!("Saved model to {}", dir.display());
    }

    Ok(nlp)
}

/// Uniform in-place Fisher-Yates shuffle.
fn shuffle<T>(items: &mut [T], rng: &mut Rand32) {
    for i in (1..items.len()).rev() {
        let j = rng.rand_range(0..(i as u32 + 1)) as usize;
        items.swap(i, j);
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
