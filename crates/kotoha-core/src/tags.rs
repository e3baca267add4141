//! # BIO Tags over a Runtime Label Set
//!
//! Tag indices for sequence labeling with the BIO (Begin-Inside-Outside)
//! scheme. Labels are registered at run time, so the tag space grows with
//! the corpus instead of being fixed at compile time.
//!
//! Tag 0 is Outside; label `i` owns the Begin tag `2i + 1` and the Inside
//! tag `2i + 2`. Appending a label never renumbers existing tags.

use serde::{Deserialize, Serialize};

/// Index of the Outside tag.
pub const OUTSIDE: usize = 0;

/// BIO tag indices derived from an ordered set of entity labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    labels: Vec<String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self { labels: Vec::new() }
    }

    /// Register a label and return its index. Registering a label that is
    /// already present is a no-op.
    pub fn add_label(&mut self, label: &str) -> usize {
        if let Some(idx) = self.labels.iter().position(|l| l == label) {
            return idx;
        }
        self.labels.push(label.to_string());
        self.labels.len() - 1
    }

    /// Registered labels, in registration order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Total number of distinct tags: Outside plus Begin/Inside per label.
    pub fn num_tags(&self) -> usize {
        2 * self.labels.len() + 1
    }

    /// The Begin tag index for a label index.
    pub fn begin(&self, label_idx: usize) -> usize {
        2 * label_idx + 1
    }

    /// The Inside tag index for a label index.
    pub fn inside(&self, label_idx: usize) -> usize {
        2 * label_idx + 2
    }

    /// Check if this is a "Begin" tag.
    pub fn is_begin(&self, tag: usize) -> bool {
        tag != OUTSIDE && tag < self.num_tags() && tag % 2 == 1
    }

    /// Check if this is an "Inside" tag.
    pub fn is_inside(&self, tag: usize) -> bool {
        tag != OUTSIDE && tag < self.num_tags() && tag % 2 == 0
    }

    /// The label a tag belongs to, or `None` for Outside and out-of-range
    /// tags.
    pub fn label_of(&self, tag: usize) -> Option<&str> {
        if tag == OUTSIDE || tag >= self.num_tags() {
            return None;
        }
        Some(self.labels[(tag - 1) / 2].as_str())
    }

    /// Display name for a tag: `O`, `B-CITY`, `I-CITY`.
    pub fn name(&self, tag: usize) -> String {
        match self.label_of(tag) {
            None => "O".to_string(),
            Some(label) if self.is_begin(tag) => format!("B-{label}"),
            Some(label) => format!("I-{label}"),
        }
    }

    /// Check if transitioning from `from` to `to` is valid. An Inside tag is
    /// only reachable from the Begin or Inside tag of the same label;
    /// everything else is open.
    pub fn is_valid_transition(&self, from: usize, to: usize) -> bool {
        if !self.is_inside(to) {
            return true;
        }
        from == to - 1 || from == to
    }

    /// Dense transition mask, indexed `mask[from][to]`. Row [`OUTSIDE`]
    /// doubles as the start-of-sequence condition.
    pub fn transition_mask(&self) -> Vec<Vec<bool>> {
        let n = self.num_tags();
        (0..n)
            .map(|from| (0..n).map(|to| self.is_valid_transition(from, to)).collect())
            .collect()
    }
}
