//! # Tokenizer
//!
//! Splits text into tokens while preserving character offsets, so tokens
//! line up with corpus entity spans.

/// A token with positional information.
///
/// Offsets are **character** positions into the original string, matching
/// the offsets used by [`crate::types::EntitySpan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token text content.
    pub text: String,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
    /// Token index in the sequence.
    pub index: usize,
}

/// Whitespace-and-punctuation tokenizer.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer;

impl Tokenizer {
    /// Create a new tokenizer instance.
    pub fn new() -> Self {
        Self
    }

    /// Tokenize `input` into a sequence of tokens.
    ///
    /// Runs of non-whitespace, non-punctuation characters form one token;
    /// each punctuation character stands alone. Token text is kept verbatim
    /// so case and accents stay available as model features.
    pub fn tokenize(&self, input: &str) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut word = String::new();
        let mut word_start = 0;

        for (pos, c) in input.chars().enumerate() {
            if c.is_whitespace() || c.is_ascii_punctuation() {
                if !word.is_empty() {
                    let index = tokens.len();
                    tokens.push(Token {
                        text: std::mem::take(&mut word),
                        start: word_start,
                        end: pos,
                        index,
                    });
                }
                if c.is_ascii_punctuation() {
                    let index = tokens.len();
                    tokens.push(Token {
                        text: c.to_string(),
                        start: pos,
                        end: pos + 1,
                        index,
                    });
                }
            } else {
                if word.is_empty() {
                    word_start = pos;
                }
                word.push(c);
            }
        }

        // Don't forget the last token
        if !word.is_empty() {
            let end = word_start + word.chars().count();
            let index = tokens.len();
            tokens.push(Token {
                text: word,
                start: word_start,
                end,
                index,
            });
        }

        tokens
    }
}
