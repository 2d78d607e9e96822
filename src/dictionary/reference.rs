// File: src/dictionary/reference.rs
use crate::core::tokenizer::TextProcessor;
use crate::error::{Result, SlangError};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// The set of words that need no explanation.
/// Training never mutates it; only explicit `add`/`remove` do.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDictionary {
    words: HashSet<String>,
}

impl ReferenceDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a word list, one word per line. Each line goes through the same
    /// processor as the stream; only its first token is kept.
    pub fn from_word_list(path: &Path, processor: &TextProcessor) -> Result<Self> {
        let file = File::open(path).map_err(|e| SlangError::storage(path, e))?;
        let dictionary = Self::from_reader(BufReader::new(file), processor)
            .map_err(|e| SlangError::storage(path, e))?;
        info!(words = dictionary.len(), path = %path.display(), "loaded reference dictionary");
        Ok(dictionary)
    }

    pub fn from_reader<R: BufRead>(reader: R, processor: &TextProcessor) -> std::io::Result<Self> {
        let mut dictionary = Self::new();
        for line in reader.lines() {
            if let Some(word) = processor.first_token(&line?) {
                dictionary.add(&word);
            }
        }
        Ok(dictionary)
    }

    pub fn add(&mut self, word: &str) {
        self.words.insert(word.to_string());
    }

    pub fn remove(&mut self, word: &str) {
        self.words.remove(word);
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for ReferenceDictionary {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self { words: iter.into_iter().map(str::to_string).collect() }
    }
}
