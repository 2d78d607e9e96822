// --- File: src/core/vocab.rs
use crate::core::types::{WordEntry, WordId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Word <-> id mapping plus per-word metadata.
/// Ids are dense so they double as row indices into the vector tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    index: HashMap<String, WordId>,
    pub metadata_store: Vec<WordEntry>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.metadata_store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata_store.is_empty()
    }

    pub fn id_of(&self, word: &str) -> Option<WordId> {
        self.index.get(word).copied()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    pub fn word(&self, id: WordId) -> &str {
        &self.metadata_store[id].word
    }

    pub fn count(&self, word: &str) -> Option<u64> {
        self.id_of(word).map(|id| self.metadata_store[id].count)
    }

    /// Gets or creates metadata for a word, returning its id and whether it is new.
    pub fn get_or_create(&mut self, word: &str) -> (WordId, bool) {
        if let Some(id) = self.id_of(word) {
            return (id, false);
        }
        let id = self.metadata_store.len();
        self.metadata_store.push(WordEntry::new(word));
        self.index.insert(word.to_string(), id);
        (id, true)
    }

    /// Records `occurrences` of an existing word, optionally attributed to a window.
    pub fn record(&mut self, id: WordId, occurrences: u64, window: Option<i64>) {
        let entry = &mut self.metadata_store[id];
        entry.count += occurrences;
        match window {
            Some(start) => *entry.provenance.entry(start).or_insert(0) += occurrences,
            None => entry.pinned = true,
        }
    }

    /// Removes a word by swapping the last entry into its slot.
    /// Returns the id of the entry that moved into `id`, if any, so callers can
    /// mirror the swap in their own parallel tables.
    pub fn swap_remove(&mut self, id: WordId) -> Option<WordId> {
        let removed = self.metadata_store.swap_remove(id);
        self.index.remove(&removed.word);
        if id < self.metadata_store.len() {
            let moved = &self.metadata_store[id];
            self.index.insert(moved.word.clone(), id);
            Some(self.metadata_store.len())
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (WordId, &WordEntry)> {
        self.metadata_store.iter().enumerate()
    }
}
