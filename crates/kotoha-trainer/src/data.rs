//! Corpus loading for span-annotated training data.
//!
//! The on-disk format is the rasa NLU JSON export: a top-level
//! `rasa_nlu_data` object holding a `common_examples` array of records,
//! each with a `text` and a list of `entities` carrying `start`/`end`
//! character offsets and an `entity` label.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use kotoha_core::EntitySpan;

/// One training sentence with its labeled entity spans, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingExample {
    pub text: String,
    pub entities: Vec<EntitySpan>,
}

impl TrainingExample {
    pub fn new(text: impl Into<String>, entities: Vec<EntitySpan>) -> Self {
        Self {
            text: text.into(),
            entities,
        }
    }
}

/// Why a corpus could not be loaded.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// The training file does not exist.
    #[error("training file not found: {0:?}")]
    NotFound(PathBuf),

    /// The training file is not valid JSON.
    #[error("training file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON is valid but a record is structurally broken.
    #[error("malformed training record: {0}")]
    Malformed(String),

    /// Any other I/O failure while reading the file.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Load a corpus, distinguishing "no data" from "unreadable data".
///
/// A file whose `rasa_nlu_data` or `common_examples` key is absent, null,
/// or empty is a valid, **empty** corpus — downstream code treats that as
/// nothing to train on, not as a failure. A missing file, invalid JSON, or
/// a structurally broken record is an error, and no partial corpus is ever
/// returned.
///
/// Entity fields pass through unvalidated: offsets are not checked against
/// the text and spans may overlap.
pub fn load_corpus(path: impl AsRef<Path>) -> Result<Vec<TrainingExample>, CorpusError> {
    let path = path.as_ref();
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CorpusError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(CorpusError::Io(e)),
    };
    // Tolerate a UTF-8 byte-order marker
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

    let doc: Value = serde_json::from_str(raw)?;
    let Some(data) = doc.get("rasa_nlu_data").filter(|v| !v.is_null()) else {
        return Ok(Vec::new());
    };
    let Some(examples) = data.get("common_examples").filter(|v| !v.is_null()) else {
        return Ok(Vec::new());
    };
    let Some(records) = examples.as_array() else {
        return Err(CorpusError::Malformed(
            "common_examples is not an array".into(),
        ));
    };

    let mut corpus = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let example = parse_record(record)
            .map_err(|reason| CorpusError::Malformed(format!("record {i}: {reason}")))?;
        corpus.push(example);
    }
    Ok(corpus)
}

fn parse_record(record: &Value) -> Result<TrainingExample, String> {
    let text = record
        .get("text")
        .and_then(Value::as_str)
        .ok_or("missing text")?;
    let raw_entities = record
        .get("entities")
        .and_then(Value::as_array)
        .ok_or("missing entities")?;

    let mut entities = Vec::with_capacity(raw_entities.len());
    for entity in raw_entities {
        let start = entity
            .get("start")
            .and_then(Value::as_u64)
            .ok_or("entity missing start")?;
        let end = entity
            .get("end")
            .and_then(Value::as_u64)
            .ok_or("entity missing end")?;
        let label = entity
            .get("entity")
            .and_then(Value::as_str)
            .ok_or("entity missing label")?;
        entities.push(EntitySpan::new(start as usize, end as usize, label));
    }

    Ok(TrainingExample::new(text, entities))
}

/// Load a corpus, degrading any failure to an empty corpus.
///
/// Reproduces the historical fail-soft policy: the error is reported with a
/// distinguishing message and training proceeds with nothing to train on.
/// Callers that want to abort on a broken file use [`load_corpus`] instead.
pub fn load_corpus_or_empty(path: impl AsRef<Path>) -> Vec<TrainingExample> {
    match load_corpus(path) {
        Ok(corpus) => corpus,
        Err(err @ CorpusError::NotFound(_)) => {
            warn!("{err}; check the file path");
            Vec::new()
        }
        Err(err @ CorpusError::Json(_)) => {
            warn!("{err}");
            Vec::new()
        }
        Err(err) => {
            warn!("could not load training data: {err}");
            Vec::new()
        }
    }
}
