use serde::{Deserialize, Serialize};

/// One labeled entity span, with character offsets into the annotated text.
///
/// Offsets are half-open: `start` is the first covered character and `end`
/// is one past the last. They are carried through from the corpus
/// unvalidated; spans that fall outside the text simply align to no tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    /// Character offset of the first covered character.
    pub start: usize,
    /// Character offset one past the last covered character.
    pub end: usize,
    /// The entity label, e.g. `CITY`.
    pub label: String,
}

impl EntitySpan {
    pub fn new(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }
}

/// An entity extracted from text by a trained pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntity {
    /// The covered text.
    pub text: String,
    /// The entity label.
    pub label: String,
    /// Character offset of the first covered character.
    pub start: usize,
    /// Character offset one past the last covered character.
    pub end: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_roundtrips_through_json() {
        let span = EntitySpan::new(17, 22, "CITY");
        let raw = serde_json::to_string(&span).unwrap();
        let back: EntitySpan = serde_json::from_str(&raw).unwrap();
        assert_eq!(span, back);
    }
}
