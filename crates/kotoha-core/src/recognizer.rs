//! # Entity Recognizer
//!
//! The trainable pipeline stage: owns the registered label set and the
//! tagging model, aligns corpus spans to token-level BIO tags for updates,
//! and merges decoded tags back into character spans for extraction.

use oorandom::Rand32;
use serde::{Deserialize, Serialize};

use crate::model::{TagModel, featurize};
use crate::tags::{OUTSIDE, TagSet};
use crate::tokenizer::{Token, Tokenizer};
use crate::types::{EntitySpan, ExtractedEntity};

/// Trainable named-entity recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecognizer {
    tags: TagSet,
    model: TagModel,
}

impl EntityRecognizer {
    pub fn new() -> Self {
        let tags = TagSet::new();
        let model = TagModel::new(tags.num_tags());
        Self { tags, model }
    }

    /// Register an entity label. Registering the same label twice is a
    /// no-op; the tag space and model grow in place for new labels.
    pub fn add_label(&mut self, label: &str) {
        self.tags.add_label(label);
        self.model.grow(self.tags.num_tags());
    }

    /// Registered labels, in registration order.
    pub fn labels(&self) -> &[String] {
        self.tags.labels()
    }

    /// Throw away learned weights and start from scratch.
    pub fn begin_training(&mut self) {
        self.model.reset();
    }

    /// One update step over a minibatch. Returns the summed loss.
    pub fn update(
        &mut self,
        tokenizer: &Tokenizer,
        texts: &[&str],
        annotations: &[&[EntitySpan]],
        dropout: f32,
        rng: &mut Rand32,
    ) -> f32 {
        let mask = self.tags.transition_mask();
        let mut loss = 0.0;

        for (text, spans) in texts.iter().zip(annotations.iter()) {
            let tokens = tokenizer.tokenize(text);
            if tokens.is_empty() {
                continue;
            }
            let gold = self.align(&tokens, spans);
            let features = featurize(&tokens);
            loss += self.model.train_step(&features, &gold, &mask, dropout, rng);
        }

        loss
    }

    /// Extract entities from one text with the current weights.
    pub fn extract(&self, tokenizer: &Tokenizer, text: &str) -> Vec<ExtractedEntity> {
        let tokens = tokenizer.tokenize(text);
        if tokens.is_empty() {
            return Vec::new();
        }
        let features = featurize(&tokens);
        let mask = self.tags.transition_mask();
        let predicted = self.model.predict(&features, &mask);
        self.spans_from_tags(text, &tokens, &predicted)
    }

    /// Project character spans onto the token sequence as BIO tags. Spans
    /// with unregistered labels or offsets covering no token are skipped.
    fn align(&self, tokens: &[Token], spans: &[EntitySpan]) -> Vec<usize> {
        let mut gold = vec![OUTSIDE; tokens.len()];

        for span in spans {
            let Some(label_idx) = self.tags.labels().iter().position(|l| l == &span.label)
            else {
                continue;
            };
            let mut first = true;
            for (i, token) in tokens.iter().enumerate() {
                if token.start >= span.start && token.end <= span.end {
                    gold[i] = if first {
                        self.tags.begin(label_idx)
                    } else {
                        self.tags.inside(label_idx)
                    };
                    first = false;
                }
            }
        }

        gold
    }

    /// Merge a decoded tag sequence back into character spans.
    fn spans_from_tags(
        &self,
        text: &str,
        tokens: &[Token],
        predicted: &[usize],
    ) -> Vec<ExtractedEntity> {
        let chars: Vec<char> = text.chars().collect();
        let mut entities = Vec::new();
        let mut open: Option<(usize, usize, String)> = None;

        for (token, &tag) in tokens.iter().zip(predicted.iter()) {
            match self.tags.label_of(tag) {
                Some(label) if self.tags.is_begin(tag) => {
                    if let Some(span) = open.take() {
                        entities.push(finish(&chars, span));
                    }
                    open = Some((token.start, token.end, label.to_string()));
                }
                Some(label) => match open.as_mut() {
                    // Inside tag extends the open span when the label agrees
                    Some((_, end, open_label)) if open_label == label => *end = token.end,
                    _ => {
                        if let Some(span) = open.take() {
                            entities.push(finish(&chars, span));
                        }
                        open = Some((token.start, token.end, label.to_string()));
                    }
                },
                None => {
                    if let Some(span) = open.take() {
                        entities.push(finish(&chars, span));
                    }
                }
            }
        }
        if let Some(span) = open.take() {
            entities.push(finish(&chars, span));
        }

        entities
    }
}

fn finish(chars: &[char], (start, end, label): (usize, usize, String)) -> ExtractedEntity {
    let text = chars[start.min(chars.len())..end.min(chars.len())]
        .iter()
        .collect();
    ExtractedEntity {
        text,
        label,
        start,
        end,
    }
}

impl Default for EntityRecognizer {
    fn default() -> Self {
        Self::new()
    }
}
