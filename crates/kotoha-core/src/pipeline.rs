//! # Pipeline
//!
//! Ordered, named processing stages over a shared tokenizer, with on-disk
//! persistence. A model directory holds `meta.json` (language and stage
//! order) plus one weights file per trainable stage.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use oorandom::Rand32;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KotohaError, Result};
use crate::recognizer::EntityRecognizer;
use crate::tokenizer::Tokenizer;
use crate::types::{EntitySpan, ExtractedEntity};

/// Name of the entity-recognition stage.
pub const ENTITY_RECOGNIZER: &str = "ner";

/// Stage names left enabled while the entity recognizer is trained.
/// "wordpiecer" and "tok2vec" feed token representations to the recognizer
/// in embedding-backed configurations and must stay active with it.
pub const TRAINING_ACTIVE_STAGES: &[&str] = &[ENTITY_RECOGNIZER, "wordpiecer", "tok2vec"];

const META_FILE: &str = "meta.json";
const NER_FILE: &str = "ner.json";

/// One named pipeline stage.
#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    component: Component,
    enabled: bool,
}

impl Stage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

/// Stage behavior. Stages from foreign configurations that this crate
/// cannot run are carried as `Inert` so their pipelines round-trip through
/// save and load.
#[derive(Debug, Clone)]
enum Component {
    EntityRecognizer(EntityRecognizer),
    Inert,
}

/// Pipeline-level metadata, stored as `meta.json` in a model directory.
#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    lang: String,
    pipeline: Vec<String>,
}

/// A language-processing pipeline: a tokenizer plus ordered, named stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    lang: String,
    tokenizer: Tokenizer,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Fresh pipeline for a language, with no stages.
    pub fn blank(lang: &str) -> Self {
        Self {
            lang: lang.to_string(),
            tokenizer: Tokenizer::new(),
            stages: Vec::new(),
        }
    }

    /// Load a previously saved pipeline from a model directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let load_err = |reason: String| KotohaError::ModelLoad {
            path: dir.to_path_buf(),
            reason,
        };

        let meta_raw =
            fs::read_to_string(dir.join(META_FILE)).map_err(|e| load_err(e.to_string()))?;
        let meta: Meta = serde_json::from_str(&meta_raw).map_err(|e| load_err(e.to_string()))?;

        let mut pipeline = Self::blank(&meta.lang);
        for name in meta.pipeline {
            let component = if name == ENTITY_RECOGNIZER {
                let raw = fs::read_to_string(dir.join(NER_FILE))
                    .map_err(|e| load_err(e.to_string()))?;
                let ner: EntityRecognizer =
                    serde_json::from_str(&raw).map_err(|e| load_err(e.to_string()))?;
                Component::EntityRecognizer(ner)
            } else {
                debug!(stage = %name, "carrying stage without a runnable component");
                Component::Inert
            };
            pipeline.stages.push(Stage {
                name,
                component,
                enabled: true,
            });
        }

        debug!(path = %dir.display(), "loaded pipeline");
        Ok(pipeline)
    }

    /// Serialize the full pipeline state into `dir`, which must already
    /// exist.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let save_err = |reason: String| KotohaError::ModelSave {
            path: dir.to_path_buf(),
            reason,
        };

        let meta = Meta {
            lang: self.lang.clone(),
            pipeline: self.stages.iter().map(|s| s.name.clone()).collect(),
        };
        let meta_raw =
            serde_json::to_string_pretty(&meta).map_err(|e| save_err(e.to_string()))?;
        fs::write(dir.join(META_FILE), meta_raw).map_err(|e| save_err(e.to_string()))?;

        for stage in &self.stages {
            if let Component::EntityRecognizer(ner) = &stage.component {
                let raw = serde_json::to_string(ner).map_err(|e| save_err(e.to_string()))?;
                fs::write(dir.join(NER_FILE), raw).map_err(|e| save_err(e.to_string()))?;
            }
        }

        debug!(path = %dir.display(), "saved pipeline");
        Ok(())
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Names of all stages, in pipeline order.
    pub fn pipe_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn has_stage(&self, name: &str) -> bool {
        self.stages.iter().any(|s| s.name == name)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Append a fresh entity-recognition stage at the end of the pipeline.
    pub fn add_entity_recognizer(&mut self) {
        self.stages.push(Stage {
            name: ENTITY_RECOGNIZER.to_string(),
            component: Component::EntityRecognizer(EntityRecognizer::new()),
            enabled: true,
        });
    }

    pub fn entity_recognizer(&self) -> Option<&EntityRecognizer> {
        self.stages.iter().find_map(|s| match &s.component {
            Component::EntityRecognizer(ner) => Some(ner),
            Component::Inert => None,
        })
    }

    pub fn entity_recognizer_mut(&mut self) -> Option<&mut EntityRecognizer> {
        self.stages.iter_mut().find_map(|s| match &mut s.component {
            Component::EntityRecognizer(ner) => Some(ner),
            Component::Inert => None,
        })
    }

    /// Reset every trainable stage's weights from scratch.
    pub fn begin_training(&mut self) {
        for stage in &mut self.stages {
            if let Component::EntityRecognizer(ner) = &mut stage.component {
                ner.begin_training();
            }
        }
    }

    /// Run `f` with every stage not named in `keep` disabled, restoring the
    /// previous enabled set afterward on both the success and the error
    /// path. Stages appended inside `f` keep their own enabled flag.
    pub fn with_only_stages<T, E, F>(&mut self, keep: &[&str], f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Pipeline) -> std::result::Result<T, E>,
    {
        let saved: Vec<bool> = self.stages.iter().map(|s| s.enabled).collect();
        for stage in &mut self.stages {
            if !keep.contains(&stage.name.as_str()) {
                stage.enabled = false;
            }
        }

        let result = f(self);

        for (stage, enabled) in self.stages.iter_mut().zip(saved) {
            stage.enabled = enabled;
        }
        result
    }

    /// One update step over a minibatch of texts and parallel annotation
    /// sets. Each enabled trainable stage adds its loss to `losses` under
    /// its stage name.
    pub fn update(
        &mut self,
        texts: &[&str],
        annotations: &[&[EntitySpan]],
        dropout: f32,
        losses: &mut HashMap<String, f32>,
        rng: &mut Rand32,
    ) -> Result<()> {
        if texts.len() != annotations.len() {
            return Err(KotohaError::BatchShape {
                texts: texts.len(),
                annotations: annotations.len(),
            });
        }

        for stage in &mut self.stages {
            if !stage.enabled {
                continue;
            }
            if let Component::EntityRecognizer(ner) = &mut stage.component {
                let loss = ner.update(&self.tokenizer, texts, annotations, dropout, rng);
                *losses.entry(stage.name.clone()).or_insert(0.0) += loss;
            }
        }

        Ok(())
    }

    /// Extract entities from `text` with the enabled entity recognizer. A
    /// pipeline without one extracts nothing.
    pub fn extract_entities(&self, text: &str) -> Vec<ExtractedEntity> {
        for stage in &self.stages {
            if !stage.enabled {
                continue;
            }
            if let Component::EntityRecognizer(ner) = &stage.component {
                return ner.extract(&self.tokenizer, text);
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn trained_pipeline() -> Pipeline {
        let mut nlp = Pipeline::blank("en");
        nlp.add_entity_recognizer();
        nlp.entity_recognizer_mut().unwrap().add_label("CITY");

        let spans = vec![EntitySpan::new(17, 22, "CITY")];
        let mut rng = Rand32::new(11);
        let mut losses = HashMap::new();
        for _ in 0..50 {
            nlp.update(
                &["Book a flight to Paris"],
                &[spans.as_slice()],
                0.0,
                &mut losses,
                &mut rng,
            )
            .unwrap();
        }
        nlp
    }

    #[test]
    fn test_blank_pipeline_has_no_stages() {
        let nlp = Pipeline::blank("en");
        assert_eq!(nlp.lang(), "en");
        assert!(nlp.pipe_names().is_empty());
        assert!(nlp.entity_recognizer().is_none());
        assert!(nlp.extract_entities("Book a flight to Paris").is_empty());
    }

    #[test]
    fn test_add_entity_recognizer() {
        let mut nlp = Pipeline::blank("en");
        nlp.add_entity_recognizer();
        assert!(nlp.has_stage(ENTITY_RECOGNIZER));
        assert_eq!(nlp.pipe_names(), ["ner"]);
        assert!(nlp.entity_recognizer().is_some());
    }

    #[test]
    fn test_with_only_stages_restores_on_success() {
        let mut nlp = Pipeline::blank("en");
        nlp.add_entity_recognizer();
        nlp.stages.push(Stage {
            name: "tagger".to_string(),
            component: Component::Inert,
            enabled: true,
        });

        nlp.with_only_stages::<_, (), _>(TRAINING_ACTIVE_STAGES, |nlp| {
            let tagger = nlp.stages.iter().find(|s| s.name == "tagger").unwrap();
            assert!(!tagger.enabled());
            let ner = nlp.stages.iter().find(|s| s.name == "ner").unwrap();
            assert!(ner.enabled());
            Ok(())
        })
        .unwrap();

        assert!(nlp.stages.iter().all(|s| s.enabled()));
    }

    #[test]
    fn test_with_only_stages_restores_on_error() {
        let mut nlp = Pipeline::blank("en");
        nlp.add_entity_recognizer();
        nlp.stages.push(Stage {
            name: "tagger".to_string(),
            component: Component::Inert,
            enabled: true,
        });

        let result: std::result::Result<(), &str> =
            nlp.with_only_stages(&["ner"], |_| Err("training blew up"));
        assert!(result.is_err());
        assert!(nlp.stages.iter().all(|s| s.enabled()));
    }

    #[test]
    fn test_update_rejects_mismatched_batch() {
        let mut nlp = Pipeline::blank("en");
        nlp.add_entity_recognizer();
        let mut losses = HashMap::new();
        let mut rng = Rand32::new(1);

        let result = nlp.update(&["a", "b"], &[&[]], 0.5, &mut losses, &mut rng);
        assert!(matches!(result, Err(KotohaError::BatchShape { .. })));
    }

    #[test]
    fn test_update_accumulates_losses_under_stage_name() {
        let mut nlp = Pipeline::blank("en");
        nlp.add_entity_recognizer();
        nlp.entity_recognizer_mut().unwrap().add_label("CITY");

        let spans = vec![EntitySpan::new(17, 22, "CITY")];
        let mut losses = HashMap::new();
        let mut rng = Rand32::new(3);
        nlp.update(
            &["Book a flight to Paris"],
            &[spans.as_slice()],
            0.0,
            &mut losses,
            &mut rng,
        )
        .unwrap();

        // Fresh weights predict everything as Outside, so the entity token
        // counts as one mistake.
        assert_eq!(losses.get("ner"), Some(&1.0));
    }

    #[test]
    fn test_disabled_recognizer_neither_trains_nor_extracts() {
        let mut nlp = trained_pipeline();
        let mut losses = HashMap::new();
        let mut rng = Rand32::new(5);

        nlp.with_only_stages::<_, KotohaError, _>(&[], |nlp| {
            assert!(nlp.extract_entities("Book a flight to Paris").is_empty());
            nlp.update(&["Book a flight to Paris"], &[&[]], 0.0, &mut losses, &mut rng)?;
            Ok(())
        })
        .unwrap();

        assert!(losses.is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let nlp = trained_pipeline();
        let dir = TempDir::new().unwrap();
        nlp.save(dir.path()).unwrap();
        assert!(dir.path().join("meta.json").exists());
        assert!(dir.path().join("ner.json").exists());

        let back = Pipeline::load(dir.path()).unwrap();
        assert_eq!(back.lang(), "en");
        assert_eq!(back.pipe_names(), ["ner"]);
        assert_eq!(back.entity_recognizer().unwrap().labels(), ["CITY"]);

        let entities = back.extract_entities("Book a flight to Paris");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "Paris");
        assert_eq!(entities[0].label, "CITY");
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let result = Pipeline::load(dir.path().join("nope"));
        assert!(matches!(result, Err(KotohaError::ModelLoad { .. })));
    }

    #[test]
    fn test_foreign_stages_round_trip_as_inert() {
        let mut nlp = Pipeline::blank("en");
        nlp.stages.push(Stage {
            name: "tok2vec".to_string(),
            component: Component::Inert,
            enabled: true,
        });
        nlp.add_entity_recognizer();

        let dir = TempDir::new().unwrap();
        nlp.save(dir.path()).unwrap();
        let back = Pipeline::load(dir.path()).unwrap();
        assert_eq!(back.pipe_names(), ["tok2vec", "ner"]);
    }
}
