// File: src/pipeline.rs
//! Per-window refresh cycle: replay, train, persist, evict, explain.

use crate::archive::Archive;
use crate::config::PipelineConfig;
use crate::core::embedding::EmbeddingModel;
use crate::core::types::{Batch, WindowKey};
use crate::dictionary::{ReferenceDictionary, SlangDictionary};
use crate::error::{Result, SlangError};
use crate::persistence::{save_json_pretty, save_model, StorageLayout};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleStage {
    Idle,
    ReplayingArchive,
    TrainingNewBatch,
    Persisting,
    DerivingGlossary,
}

/// What one cycle did.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub window: WindowKey,
    pub comments: usize,
    /// Archived batches replayed into a fresh copy of the stable model.
    pub replayed: usize,
    pub evicted: Vec<WindowKey>,
    pub pruned_words: usize,
    pub vocabulary: usize,
    pub glossary_entries: usize,
}

/// Drives one batch at a time through the training and glossary stages.
///
/// The stable model is the initialization snapshot and is never mutated; the
/// live model is whatever the previous cycle produced. Once the archive holds
/// K - 1 windows, every cycle rebuilds the live model from a copy of the stable
/// one plus the archive, which bounds how far it drifts from recent history.
pub struct Orchestrator {
    config: PipelineConfig,
    layout: StorageLayout,
    archive: Archive,
    reference: ReferenceDictionary,
    stable: EmbeddingModel,
    live: EmbeddingModel,
    stage: CycleStage,
    glossary: SlangDictionary,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, stable: EmbeddingModel, reference: ReferenceDictionary) -> Result<Self> {
        config.validate()?;
        let layout = StorageLayout::new(config.storage_root.clone());
        let archive = Archive::new(layout.archive_dir());
        Ok(Self {
            config,
            layout,
            archive,
            reference,
            live: stable.clone(),
            stable,
            stage: CycleStage::Idle,
            glossary: SlangDictionary::new(),
        })
    }

    /// Where the last cycle is, or stopped if it failed.
    pub fn stage(&self) -> CycleStage {
        self.stage
    }

    /// The base snapshot every replay starts from.
    pub fn stable_model(&self) -> &EmbeddingModel {
        &self.stable
    }

    pub fn live_model(&self) -> &EmbeddingModel {
        &self.live
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// The glossary derived by the last completed cycle.
    pub fn glossary(&self) -> &SlangDictionary {
        &self.glossary
    }

    pub fn reference_mut(&mut self) -> &mut ReferenceDictionary {
        &mut self.reference
    }

    fn enter(&mut self, stage: CycleStage) {
        debug!(from = ?self.stage, to = ?stage, "stage transition");
        self.stage = stage;
    }

    /// Runs every batch to completion, stopping at the first failed cycle.
    pub fn run<I>(&mut self, batches: I) -> Result<Vec<CycleReport>>
    where
        I: IntoIterator<Item = Batch>,
    {
        let started = Instant::now();
        let mut reports = Vec::new();
        for batch in batches {
            reports.push(self.process(batch)?);
        }
        info!(cycles = reports.len(), elapsed = ?started.elapsed(), "stream exhausted");
        Ok(reports)
    }

    /// One full cycle for `batch`. A storage failure aborts the cycle and is
    /// returned; the live model keeps the new state but is not saved, and the
    /// next full-archive cycle rebuilds it from disk.
    pub fn process(&mut self, batch: Batch) -> Result<CycleReport> {
        let key = batch.key();
        self.stage = CycleStage::Idle;
        info!(window = %key, comments = batch.comments.len(), "updating model");

        let replayed = self.replay_archive(&key)?;

        self.enter(CycleStage::TrainingNewBatch);
        let started = Instant::now();
        self.live.update(&batch);
        debug!(elapsed = ?started.elapsed(), "trained on new batch");
        let vocabulary = self.live.vocabulary_size();

        self.enter(CycleStage::Persisting);
        let (evicted, pruned_words) = self.persist(&batch, &key)?;

        self.enter(CycleStage::DerivingGlossary);
        let glossary_entries = self.derive_glossary(&key)?;

        self.enter(CycleStage::Idle);
        let report = CycleReport {
            window: key,
            comments: batch.comments.len(),
            replayed,
            evicted,
            pruned_words,
            vocabulary,
            glossary_entries,
        };
        info!(
            window = %key,
            replayed,
            evicted = report.evicted.len(),
            vocabulary,
            glossary_entries,
            "cycle complete"
        );
        Ok(report)
    }

    /// Rebuilds the live model from the stable one and the archive once the
    /// archive is full. Returns how many batches were replayed.
    fn replay_archive(&mut self, key: &WindowKey) -> Result<usize> {
        // A window being re-processed is replaced, not replayed twice.
        let archived: Vec<WindowKey> = self
            .archive
            .keys()?
            .into_iter()
            .filter(|archived| archived != key)
            .collect();

        if archived.len() + 1 < self.config.retention_windows {
            return Ok(0);
        }

        self.enter(CycleStage::ReplayingArchive);
        let started = Instant::now();
        let mut model = self.stable.clone();
        for archived_key in &archived {
            let old = self.archive.load(archived_key)?;
            model = model.apply(&old);
        }
        debug!(replayed = archived.len(), elapsed = ?started.elapsed(), "replayed archive");
        self.live = model;
        Ok(archived.len())
    }

    fn persist(&mut self, batch: &Batch, key: &WindowKey) -> Result<(Vec<WindowKey>, usize)> {
        save_model(&self.live, &self.layout.snapshot_dir(key))?;
        self.archive.store(batch)?;

        let horizon = batch.window_start.saturating_sub(self.config.retention_span_secs());
        let cutoff = WindowKey::from_timestamp(horizon)
            .ok_or_else(|| SlangError::config(format!("eviction horizon {horizon} out of range")))?;
        let capacity = self.config.retention_windows - 1;
        let evicted = self.archive.evict_expired(&cutoff, capacity)?;

        let mut pruned = 0;
        if self.config.prune_evicted_vocabulary {
            for window in &evicted {
                pruned += self.live.forget_window(window.timestamp());
            }
        }
        Ok((evicted, pruned))
    }

    fn derive_glossary(&mut self, key: &WindowKey) -> Result<usize> {
        let started = Instant::now();
        let live = &self.live;
        let unknown = live.unfamiliar_words(&self.reference, self.config.min_occurrence);
        let mut glossary = SlangDictionary::build(
            live,
            &unknown,
            self.config.top_n,
            self.config.similarity_threshold,
        )?;
        glossary.filter(&self.reference);
        let glossary = glossary.top_n_meanings(self.config.top_n);

        save_json_pretty(&glossary, &self.layout.glossary_path(key))?;
        debug!(
            candidates = unknown.len(),
            entries = glossary.len(),
            elapsed = ?started.elapsed(),
            "derived glossary"
        );
        let entries = glossary.len();
        self.glossary = glossary;
        Ok(entries)
    }
}
