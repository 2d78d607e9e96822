// File: src/core/context.rs
use crate::core::types::WordId;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Generates (center, context) training pairs from a sentence of word ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindow {
    window_size: usize,
}

impl ContextWindow {
    pub fn new(window_size: usize) -> Self {
        Self { window_size: window_size.max(1) }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Pairs every position with its neighbours inside a randomly shrunk window,
    /// which weights near neighbours more than distant ones.
    /// O(n * window_size).
    pub fn pairs<R: Rng>(&self, sentence: &[WordId], rng: &mut R) -> Vec<(WordId, WordId)> {
        let mut pairs = Vec::with_capacity(sentence.len() * self.window_size);
        for (pos, &center) in sentence.iter().enumerate() {
            let reach = rng.gen_range(1..=self.window_size);
            let lo = pos.saturating_sub(reach);
            let hi = (pos + reach + 1).min(sentence.len());
            for (ctx_pos, &context) in sentence[lo..hi].iter().enumerate() {
                if lo + ctx_pos != pos {
                    pairs.push((center, context));
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn never_pairs_a_position_with_itself() {
        let window = ContextWindow::new(2);
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let sentence = [0, 1, 2, 3, 4];
        for (center, context) in window.pairs(&sentence, &mut rng) {
            assert_ne!(center, context);
        }
    }

    #[test]
    fn window_of_one_pairs_adjacent_words_only() {
        let window = ContextWindow::new(1);
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let pairs = window.pairs(&[10, 20, 30], &mut rng);
        assert_eq!(pairs, vec![(10, 20), (20, 10), (20, 30), (30, 20)]);
    }

    #[test]
    fn single_word_sentence_yields_nothing() {
        let window = ContextWindow::new(5);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert!(window.pairs(&[3], &mut rng).is_empty());
    }
}
