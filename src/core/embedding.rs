// File: src/core/embedding.rs
use crate::config::TrainerConfig;
use crate::core::context::ContextWindow;
use crate::core::types::{Batch, Comment, WordId};
use crate::core::vocab::Vocabulary;
use crate::dictionary::ReferenceDictionary;
use crate::error::{Result, SlangError};
use crate::learning::{LearningEngine, Weights};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use tracing::debug;

/// Mixes the update generation into the seed so every call draws fresh randomness
/// while a replay of the same history stays reproducible.
const GENERATION_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// The word-embedding model: vocabulary, vectors and training parameters.
///
/// Every mutation goes through `&mut self` or consumes `self`, so a model has
/// exactly one writer at a time. Snapshots are deep copies via `Clone`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModel {
    pub vocab: Vocabulary,
    weights: Weights,
    context: ContextWindow,
    config: TrainerConfig,
    generation: u64,
}

impl EmbeddingModel {
    pub fn new(config: &TrainerConfig) -> Self {
        Self {
            vocab: Vocabulary::new(),
            weights: Weights::new(config.dimensions),
            context: ContextWindow::new(config.context_window),
            config: config.clone(),
            generation: 0,
        }
    }

    /// Builds a base model from an initialization stream. When `restrict_to` is
    /// given, only tokens known to that dictionary are learned. Words learned
    /// here carry no window provenance and are never pruned.
    pub fn initialize<I>(
        batches: I,
        config: &TrainerConfig,
        restrict_to: Option<&ReferenceDictionary>,
    ) -> Self
    where
        I: IntoIterator<Item = Batch>,
    {
        let mut model = Self::new(config);
        for batch in batches {
            let comments: Vec<Comment> = match restrict_to {
                Some(dictionary) => batch
                    .comments
                    .into_iter()
                    .map(|c| c.into_iter().filter(|w| dictionary.contains(w)).collect())
                    .collect(),
                None => batch.comments,
            };
            model.extend_vocabulary(&comments, true);
            model.train(&comments);
        }
        model
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocab.len()
    }

    fn next_rng(&mut self) -> ChaCha20Rng {
        let seed = self.config.seed ^ self.generation.wrapping_mul(GENERATION_MIX);
        self.generation += 1;
        ChaCha20Rng::seed_from_u64(seed)
    }

    /// Merges the vocabulary of `comments` into the model.
    /// Returns how many new words were retained.
    pub fn extend_vocabulary(&mut self, comments: &[Comment], allow_new_words: bool) -> usize {
        self.extend_tagged(comments, allow_new_words, None)
    }

    /// Like `extend_vocabulary`, attributing the counts to one window.
    pub fn extend_window(&mut self, window_start: i64, comments: &[Comment], allow_new_words: bool) -> usize {
        self.extend_tagged(comments, allow_new_words, Some(window_start))
    }

    fn extend_tagged(&mut self, comments: &[Comment], allow_new_words: bool, window: Option<i64>) -> usize {
        // Sorted so ids, and therefore vector initialization, are reproducible.
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for word in comments.iter().flatten() {
            *counts.entry(word.as_str()).or_insert(0) += 1;
        }

        let mut rng = self.next_rng();
        let mut added = 0;
        for (word, occurrences) in counts {
            let known = self.vocab.contains(word);
            if !known && (!allow_new_words || occurrences < self.config.min_count) {
                continue;
            }
            let (id, is_new) = self.vocab.get_or_create(word);
            if is_new {
                self.weights.push_row(&mut rng);
                added += 1;
            }
            self.vocab.record(id, occurrences, window);
        }
        debug!(added, vocabulary = self.vocab.len(), "extended vocabulary");
        added
    }

    /// One incremental optimization pass. Out-of-vocabulary tokens are skipped.
    /// Returns the number of word positions trained.
    pub fn train(&mut self, comments: &[Comment]) -> usize {
        let sentences: Vec<Vec<WordId>> = comments
            .iter()
            .map(|c| c.iter().filter_map(|w| self.vocab.id_of(w)).collect::<Vec<_>>())
            .filter(|ids| ids.len() > 1)
            .collect();
        let mut rng = self.next_rng();
        let engine = LearningEngine::new(&self.config);
        engine.learn(&mut self.weights, &self.vocab, &self.context, &sentences, &mut rng)
    }

    /// Consumes this snapshot and returns the one updated with `batch`.
    /// Provenance is recorded at window-key resolution so archive evictions
    /// can be forgotten by key.
    pub fn apply(mut self, batch: &Batch) -> Self {
        self.update(batch);
        self
    }

    /// In-place form of `apply`.
    pub fn update(&mut self, batch: &Batch) {
        self.extend_window(batch.key().timestamp(), &batch.comments, true);
        self.train(&batch.comments);
    }

    /// Up to `top_n` other words, most similar first.
    pub fn nearest_neighbors(&self, word: &str, top_n: usize) -> Result<Vec<(String, f32)>> {
        let target = self
            .vocab
            .id_of(word)
            .ok_or_else(|| SlangError::UnknownWord(word.to_string()))?;
        if top_n == 0 {
            return Ok(Vec::new());
        }

        // Min-heap of the best `top_n` seen so far.
        let mut heap: BinaryHeap<Reverse<Neighbor>> =
            BinaryHeap::with_capacity(top_n.min(self.vocab.len()));
        for id in (0..self.vocab.len()).filter(|&id| id != target) {
            let candidate = Neighbor { score: self.weights.cosine(target, id), id };
            if heap.len() < top_n {
                heap.push(Reverse(candidate));
            } else if heap.peek().is_some_and(|Reverse(worst)| candidate > *worst) {
                heap.pop();
                heap.push(Reverse(candidate));
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(n)| (self.vocab.word(n.id).to_string(), n.score))
            .collect())
    }

    pub fn similarity(&self, a: &str, b: &str) -> Result<f32> {
        let lookup = |w: &str| {
            self.vocab
                .id_of(w)
                .ok_or_else(|| SlangError::UnknownWord(w.to_string()))
        };
        Ok(self.weights.cosine(lookup(a)?, lookup(b)?))
    }

    /// Vocabulary words seen more than `min_occurrence` times that the
    /// reference dictionary does not know.
    pub fn unfamiliar_words(&self, reference: &ReferenceDictionary, min_occurrence: u64) -> Vec<String> {
        self.vocab
            .iter()
            .filter(|(_, entry)| entry.count > min_occurrence && !reference.contains(&entry.word))
            .map(|(_, entry)| entry.word.clone())
            .collect()
    }

    /// Drops the contribution of an evicted window. Words whose every
    /// occurrence came from forgotten windows leave the vocabulary.
    /// Returns the number of words removed.
    pub fn forget_window(&mut self, window_start: i64) -> usize {
        let mut orphaned = Vec::new();
        for (id, entry) in self.vocab.metadata_store.iter_mut().enumerate() {
            if let Some(occurrences) = entry.provenance.remove(&window_start) {
                entry.count = entry.count.saturating_sub(occurrences);
                if entry.provenance.is_empty() && !entry.pinned {
                    orphaned.push(id);
                }
            }
        }
        // Highest ids first so a swapped-in entry is never one still queued.
        for &id in orphaned.iter().rev() {
            self.vocab.swap_remove(id);
            self.weights.swap_remove_row(id);
        }
        if !orphaned.is_empty() {
            debug!(removed = orphaned.len(), window_start, "pruned evicted vocabulary");
        }
        orphaned.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Neighbor {
    score: f32,
    id: WordId,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    // Ties go to the lower id so results are deterministic.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> TrainerConfig {
        TrainerConfig {
            dimensions: 16,
            context_window: 2,
            epochs: 3,
            min_count: 2,
            sample: 0.0,
            ..TrainerConfig::default()
        }
    }

    fn sentence(words: &str) -> Comment {
        words.split_whitespace().map(str::to_string).collect()
    }

    fn corpus() -> Vec<Comment> {
        let mut comments = Vec::new();
        for _ in 0..20 {
            comments.push(sentence("the pizza was good and the pizza was hot"));
            comments.push(sentence("the yeet was good and the yeet was hot"));
            comments.push(sentence("a cat sat on a mat near a dog"));
        }
        comments
    }

    #[test]
    fn extend_respects_min_count_and_allow_flag() {
        let mut model = EmbeddingModel::new(&small_config());
        let comments = vec![sentence("rare common common")];
        assert_eq!(model.extend_vocabulary(&comments, true), 1);
        assert!(model.vocab.contains("common"));
        assert!(!model.vocab.contains("rare"));

        let more = vec![sentence("fresh fresh common")];
        assert_eq!(model.extend_vocabulary(&more, false), 0);
        assert!(!model.vocab.contains("fresh"));
        assert_eq!(model.vocab.count("common"), Some(3));
    }

    #[test]
    fn training_unknown_words_is_a_noop() {
        let mut model = EmbeddingModel::new(&small_config());
        assert_eq!(model.train(&[sentence("nothing here is known")]), 0);
    }

    #[test]
    fn nearest_neighbors_rejects_unknown_word() {
        let model = EmbeddingModel::new(&small_config());
        assert!(matches!(
            model.nearest_neighbors("yeet", 5),
            Err(SlangError::UnknownWord(w)) if w == "yeet"
        ));
    }

    #[test]
    fn huge_top_n_returns_the_whole_vocabulary() {
        let mut model = EmbeddingModel::new(&small_config());
        let comments = corpus();
        model.extend_vocabulary(&comments, true);
        model.train(&comments);

        let neighbors = model.nearest_neighbors("pizza", usize::MAX).unwrap();
        assert_eq!(neighbors.len(), model.vocabulary_size() - 1);
    }

    #[test]
    fn nearest_neighbors_are_sorted_and_bounded() {
        let mut model = EmbeddingModel::new(&small_config());
        let comments = corpus();
        model.extend_vocabulary(&comments, true);
        model.train(&comments);

        let neighbors = model.nearest_neighbors("pizza", 4).unwrap();
        assert_eq!(neighbors.len(), 4);
        assert!(neighbors.iter().all(|(w, _)| w != "pizza"));
        assert!(neighbors.windows(2).all(|pair| pair[0].1 >= pair[1].1));
    }

    #[test]
    fn words_in_identical_contexts_end_up_close() {
        let mut model = EmbeddingModel::new(&TrainerConfig { epochs: 20, ..small_config() });
        let comments = corpus();
        model.extend_vocabulary(&comments, true);
        model.train(&comments);

        let twin = model.similarity("pizza", "yeet").unwrap();
        let stranger = model.similarity("pizza", "cat").unwrap();
        assert!(twin > stranger, "twin {twin} <= stranger {stranger}");
    }

    #[test]
    fn same_history_gives_same_model() {
        let comments = corpus();
        let a = EmbeddingModel::new(&small_config()).apply(&Batch { window_start: 0, comments: comments.clone() });
        let b = EmbeddingModel::new(&small_config()).apply(&Batch { window_start: 0, comments });
        assert_eq!(
            a.nearest_neighbors("pizza", 3).unwrap(),
            b.nearest_neighbors("pizza", 3).unwrap()
        );
    }

    #[test]
    fn unfamiliar_words_skip_known_and_rare_words() {
        let mut model = EmbeddingModel::new(&small_config());
        model.extend_vocabulary(&corpus(), true);
        let reference: ReferenceDictionary = ["the", "pizza", "was", "good", "and", "hot"]
            .into_iter()
            .collect();
        let mut unknown = model.unfamiliar_words(&reference, 20);
        unknown.sort();
        // "cat", "mat" and friends occur exactly 20 times, which is not enough.
        assert_eq!(unknown, vec!["a", "yeet"]);
    }

    #[test]
    fn forgetting_a_window_prunes_only_its_words() {
        let mut model = EmbeddingModel::new(&small_config());
        model.extend_vocabulary(&[sentence("base base")], true);
        model.extend_window(100, &[sentence("old old base base")], true);
        model.extend_window(200, &[sentence("new new")], true);

        assert_eq!(model.forget_window(100), 1);
        assert!(!model.vocab.contains("old"));
        assert_eq!(model.vocab.count("base"), Some(2));
        assert!(model.vocab.contains("new"));
        assert_eq!(model.vocabulary_size(), 2);
        assert!(model.nearest_neighbors("new", 1).is_ok());
    }
}
