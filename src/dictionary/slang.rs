// File: src/dictionary/slang.rs
use crate::core::embedding::EmbeddingModel;
use crate::dictionary::ReferenceDictionary;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An explanatory word and its similarity to the word it explains.
pub type Meaning = (String, f32);

/// Unfamiliar words mapped to their closest known words, best first.
/// Serializes as `{"word": [["explanation", score], ...], ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlangDictionary {
    words: BTreeMap<String, Vec<Meaning>>,
}

impl SlangDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries the `top_n` neighbours of every candidate and keeps the ones
    /// scoring at least `threshold`. Candidates with nothing left are dropped.
    pub fn build(
        model: &EmbeddingModel,
        candidates: &[String],
        top_n: usize,
        threshold: f32,
    ) -> Result<Self> {
        let mut dictionary = Self::new();
        for word in candidates {
            let meanings = model.nearest_neighbors(word, top_n)?;
            dictionary.insert_above(word, meanings, threshold);
        }
        Ok(dictionary)
    }

    /// Adds `word` with the meanings scoring at least `threshold`.
    /// Scores are clamped into [0, 1] and sorted best first.
    pub fn insert_above(&mut self, word: &str, meanings: Vec<Meaning>, threshold: f32) {
        let mut kept: Vec<Meaning> = meanings
            .into_iter()
            .filter(|(_, score)| *score >= threshold)
            .map(|(w, score)| (w, score.clamp(0.0, 1.0)))
            .collect();
        if kept.is_empty() {
            return;
        }
        kept.sort_by(|a, b| b.1.total_cmp(&a.1));
        self.words.insert(word.to_string(), kept);
    }

    /// Keeps only meanings the reference dictionary knows, then drops words
    /// without any meaning. Applying it twice changes nothing.
    pub fn filter(&mut self, reference: &ReferenceDictionary) {
        self.words.retain(|_, meanings| {
            meanings.retain(|(explanation, _)| reference.contains(explanation));
            !meanings.is_empty()
        });
    }

    /// A copy with every entry cut to its `n` best meanings.
    pub fn top_n_meanings(&self, n: usize) -> Self {
        if n == 0 {
            return Self::new();
        }
        let words = self
            .words
            .iter()
            .map(|(word, meanings)| (word.clone(), meanings.iter().take(n).cloned().collect()))
            .collect();
        Self { words }
    }

    /// Removes one meaning; a missing word or meaning is not an error.
    pub fn remove_meaning(&mut self, word: &str, explanation: &str) {
        if let Some(meanings) = self.words.get_mut(word) {
            meanings.retain(|(w, _)| w != explanation);
            if meanings.is_empty() {
                self.words.remove(word);
            }
        }
    }

    pub fn meanings(&self, word: &str) -> Option<&[Meaning]> {
        self.words.get(word).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Meaning>)> {
        self.words.iter()
    }
}
