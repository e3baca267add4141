//! # Tagging Model
//!
//! Linear sequence-labeling model: hashed binary token features scored
//! against per-tag emission weights plus a tag-transition matrix, decoded
//! with a constrained Viterbi pass. Updates are perceptron-style with
//! feature dropout.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use oorandom::Rand32;
use serde::{Deserialize, Serialize};

use crate::tokenizer::Token;

/// Size of the hashed feature space, per tag.
pub const FEATURE_BUCKETS: usize = 1 << 13;

const LEARN_RATE: f32 = 1.0;
const TRANSITION_RATE: f32 = 0.01;

fn bucket(feature: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    feature.hash(&mut hasher);
    (hasher.finish() as usize) % FEATURE_BUCKETS
}

/// Feature buckets for every token in the sequence.
///
/// Features are binary: word identity, short prefix/suffix, shape flags,
/// and the neighboring word identities (with sentence-boundary markers).
pub fn featurize(tokens: &[Token]) -> Vec<Vec<usize>> {
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let text = token.text.as_str();
            let lower = text.to_lowercase();
            let chars: Vec<char> = lower.chars().collect();

            let mut feats = Vec::with_capacity(12);
            feats.push(bucket("bias"));
            feats.push(bucket(&format!("word={lower}")));

            let prefix: String = chars.iter().take(3).collect();
            let suffix: String = chars[chars.len().saturating_sub(3)..].iter().collect();
            feats.push(bucket(&format!("pre={prefix}")));
            feats.push(bucket(&format!("suf={suffix}")));

            if text.chars().next().is_some_and(|c| c.is_uppercase()) {
                feats.push(bucket("shape=init_upper"));
            }
            if text.chars().any(|c| c.is_alphabetic())
                && text.chars().all(|c| !c.is_alphabetic() || c.is_uppercase())
            {
                feats.push(bucket("shape=all_caps"));
            }
            if text.chars().any(|c| c.is_ascii_digit()) {
                feats.push(bucket("shape=has_digit"));
            }
            if text.chars().all(|c| c.is_ascii_digit()) {
                feats.push(bucket("shape=all_digit"));
            }
            if chars.len() == 1 && text.chars().all(|c| c.is_ascii_punctuation()) {
                feats.push(bucket("shape=punct"));
            }

            match i.checked_sub(1).and_then(|p| tokens.get(p)) {
                Some(prev) => feats.push(bucket(&format!("prev={}", prev.text.to_lowercase()))),
                None => feats.push(bucket("prev=<s>")),
            }
            match tokens.get(i + 1) {
                Some(next) => feats.push(bucket(&format!("next={}", next.text.to_lowercase()))),
                None => feats.push(bucket("next=</s>")),
            }

            feats
        })
        .collect()
}

/// Trainable weights for the entity recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagModel {
    num_tags: usize,
    /// Emission weights, `num_tags * FEATURE_BUCKETS`, one row per tag.
    emission: Vec<f32>,
    /// Transition weights, `num_tags * num_tags`, one row per source tag.
    transition: Vec<f32>,
}

impl TagModel {
    pub fn new(num_tags: usize) -> Self {
        Self {
            num_tags,
            emission: vec![0.0; num_tags * FEATURE_BUCKETS],
            transition: vec![0.0; num_tags * num_tags],
        }
    }

    pub fn num_tags(&self) -> usize {
        self.num_tags
    }

    /// Grow the tag space to `num_tags`, preserving learned weights for
    /// existing tags. Tag indices never shift because labels only append.
    pub fn grow(&mut self, num_tags: usize) {
        if num_tags <= self.num_tags {
            return;
        }

        let mut emission = vec![0.0; num_tags * FEATURE_BUCKETS];
        emission[..self.emission.len()].copy_from_slice(&self.emission);

        let mut transition = vec![0.0; num_tags * num_tags];
        for from in 0..self.num_tags {
            for to in 0..self.num_tags {
                transition[from * num_tags + to] = self.transition[from * self.num_tags + to];
            }
        }

        self.emission = emission;
        self.transition = transition;
        self.num_tags = num_tags;
    }

    /// Reset all weights to zero.
    pub fn reset(&mut self) {
        self.emission.fill(0.0);
        self.transition.fill(0.0);
    }

    fn emission_score(&self, feats: &[usize], tag: usize) -> f32 {
        let row = tag * FEATURE_BUCKETS;
        feats.iter().map(|&f| self.emission[row + f]).sum()
    }

    /// Emission score matrix, one row per token.
    pub fn emissions(&self, features: &[Vec<usize>]) -> Vec<Vec<f32>> {
        features
            .iter()
            .map(|feats| {
                (0..self.num_tags)
                    .map(|tag| self.emission_score(feats, tag))
                    .collect()
            })
            .collect()
    }

    /// Most likely tag sequence under the transition validity mask.
    pub fn predict(&self, features: &[Vec<usize>], mask: &[Vec<bool>]) -> Vec<usize> {
        let emissions = self.emissions(features);
        viterbi_decode(&emissions, &self.transition, mask, self.num_tags)
    }

    /// One perceptron update against a gold tag sequence.
    ///
    /// Each feature is suppressed with probability `dropout` for the
    /// duration of this update; prediction and weight change both see the
    /// thinned feature set. Returns the number of mispredicted tokens.
    pub fn train_step(
        &mut self,
        features: &[Vec<usize>],
        gold: &[usize],
        mask: &[Vec<bool>],
        dropout: f32,
        rng: &mut Rand32,
    ) -> f32 {
        let kept: Vec<Vec<usize>> = features
            .iter()
            .map(|feats| {
                feats
                    .iter()
                    .copied()
                    .filter(|_| dropout <= 0.0 || rng.rand_float() >= dropout)
                    .collect()
            })
            .collect();

        let preds = self.predict(&kept, mask);
        let mut loss = 0.0f32;

        for (i, (&pred, &gold_tag)) in preds.iter().zip(gold.iter()).enumerate() {
            if pred == gold_tag {
                continue;
            }
            loss += 1.0;
            for &f in &kept[i] {
                self.emission[gold_tag * FEATURE_BUCKETS + f] += LEARN_RATE;
                self.emission[pred * FEATURE_BUCKETS + f] -= LEARN_RATE;
            }
        }

        // Nudge transitions toward the gold sequence where the decode went wrong
        for i in 1..gold.len().min(preds.len()) {
            let predicted = (preds[i - 1], preds[i]);
            let wanted = (gold[i - 1], gold[i]);
            if predicted != wanted {
                self.transition[predicted.0 * self.num_tags + predicted.1] -= TRANSITION_RATE;
                self.transition[wanted.0 * self.num_tags + wanted.1] += TRANSITION_RATE;
            }
        }

        loss
    }
}

/// Viterbi decode over emission scores with a transition validity mask.
///
/// `emissions` is `[seq_len][num_tags]`; `transition` is a flat
/// `num_tags * num_tags` matrix, row per source tag. Row 0 of `mask`
/// doubles as the start-of-sequence condition, so tags unreachable from
/// Outside cannot open a sequence.
pub fn viterbi_decode(
    emissions: &[Vec<f32>],
    transition: &[f32],
    mask: &[Vec<bool>],
    num_tags: usize,
) -> Vec<usize> {
    let seq_len = emissions.len();
    if seq_len == 0 || num_tags == 0 {
        return Vec::new();
    }

    let mut dp = vec![vec![f32::NEG_INFINITY; num_tags]; seq_len];
    let mut backptr = vec![vec![0usize; num_tags]; seq_len];

    for tag in 0..num_tags {
        if mask[0][tag] {
            dp[0][tag] = emissions[0][tag];
        }
    }

    for pos in 1..seq_len {
        for curr in 0..num_tags {
            let mut best_score = f32::NEG_INFINITY;
            let mut best_prev = 0usize;

            for prev in 0..num_tags {
                if !mask[prev][curr] {
                    continue;
                }
                let score = dp[pos - 1][prev] + transition[prev * num_tags + curr];
                if score > best_score {
                    best_score = score;
                    best_prev = prev;
                }
            }

            dp[pos][curr] = best_score + emissions[pos][curr];
            backptr[pos][curr] = best_prev;
        }
    }

    let mut best_final = 0usize;
    let mut best_score = f32::NEG_INFINITY;
    for tag in 0..num_tags {
        if dp[seq_len - 1][tag] > best_score {
            best_score = dp[seq_len - 1][tag];
            best_final = tag;
        }
    }

    let mut path = vec![0usize; seq_len];
    path[seq_len - 1] = best_final;
    for pos in (1..seq_len).rev() {
        path[pos - 1] = backptr[pos][path[pos]];
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{OUTSIDE, TagSet};
    use crate::tokenizer::Tokenizer;

    fn city_tags() -> TagSet {
        let mut tags = TagSet::new();
        tags.add_label("CITY");
        tags
    }

    #[test]
    fn test_viterbi_prefers_high_emissions() {
        let tags = city_tags();
        let mask = tags.transition_mask();
        // O, B-CITY, O
        let emissions = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 2.0, 0.0],
            vec![1.0, 0.0, 0.0],
        ];
        let transition = vec![0.0; 9];

        let path = viterbi_decode(&emissions, &transition, &mask, 3);
        assert_eq!(path, [OUTSIDE, 1, OUTSIDE]);
    }

    #[test]
    fn test_viterbi_never_opens_with_inside() {
        let tags = city_tags();
        let mask = tags.transition_mask();
        // I-CITY has the best raw score everywhere, but can't start a
        // sequence and can't follow O.
        let emissions = vec![vec![0.0, 0.0, 5.0], vec![0.0, 0.0, 5.0]];
        let transition = vec![0.0; 9];

        let path = viterbi_decode(&emissions, &transition, &mask, 3);
        assert_ne!(path[0], 2);
        // Reaching I-CITY is only possible through B-CITY.
        if path[1] == 2 {
            assert_eq!(path[0], 1);
        }
    }

    #[test]
    fn test_viterbi_empty_sequence() {
        let tags = city_tags();
        let mask = tags.transition_mask();
        let path = viterbi_decode(&[], &[0.0; 9], &mask, 3);
        assert!(path.is_empty());
    }

    #[test]
    fn test_grow_preserves_weights() {
        let mut model = TagModel::new(3);
        model.emission[1 * FEATURE_BUCKETS + 7] = 2.5;
        model.transition[1 * 3 + 2] = 0.5;

        model.grow(5);
        assert_eq!(model.num_tags(), 5);
        assert_eq!(model.emission[1 * FEATURE_BUCKETS + 7], 2.5);
        assert_eq!(model.transition[1 * 5 + 2], 0.5);
    }

    #[test]
    fn test_train_step_learns_a_separable_example() {
        let tags = city_tags();
        let mask = tags.transition_mask();
        let mut model = TagModel::new(tags.num_tags());
        let mut rng = Rand32::new(42);

        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("Book a flight to Paris");
        let features = featurize(&tokens);
        let gold = vec![OUTSIDE, OUTSIDE, OUTSIDE, OUTSIDE, tags.begin(0)];

        for _ in 0..50 {
            model.train_step(&features, &gold, &mask, 0.0, &mut rng);
        }

        assert_eq!(model.predict(&features, &mask), gold);
    }

    #[test]
    fn test_reset_zeroes_weights() {
        let tags = city_tags();
        let mask = tags.transition_mask();
        let mut model = TagModel::new(tags.num_tags());
        let mut rng = Rand32::new(1);

        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("to Paris");
        let features = featurize(&tokens);
        model.train_step(&features, &[OUTSIDE, tags.begin(0)], &mask, 0.0, &mut rng);

        model.reset();
        assert!(model.emission.iter().all(|&w| w == 0.0));
        assert!(model.transition.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_featurize_marks_sequence_boundaries() {
        let tokenizer = Tokenizer::new();
        let single = featurize(&tokenizer.tokenize("Paris"));
        assert_eq!(single.len(), 1);
        assert!(single[0].contains(&bucket("prev=<s>")));
        assert!(single[0].contains(&bucket("next=</s>")));
    }
}
