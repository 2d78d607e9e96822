// File: src/learning.rs
use crate::config::TrainerConfig;
use crate::core::{context::ContextWindow, types::WordId, vocab::Vocabulary};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponent applied to word counts for the negative-sampling distribution.
const NEGATIVE_POWER: f64 = 0.75;
/// Dot products beyond this are treated as saturated.
const MAX_EXP: f32 = 6.0;

/// Input ("word") and output ("context") vectors, one row per vocabulary id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weights {
    dim: usize,
    input: Vec<f32>,
    output: Vec<f32>,
}

impl Weights {
    pub fn new(dim: usize) -> Self {
        Self { dim, input: Vec::new(), output: Vec::new() }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn rows(&self) -> usize {
        if self.dim == 0 { 0 } else { self.input.len() / self.dim }
    }

    /// Appends a row for a new word: small random input vector, zero output vector.
    pub fn push_row<R: Rng>(&mut self, rng: &mut R) {
        let scale = 1.0 / self.dim as f32;
        self.input
            .extend((0..self.dim).map(|_| (rng.gen::<f32>() - 0.5) * scale));
        self.output.extend(std::iter::repeat(0.0).take(self.dim));
    }

    /// Mirrors `Vocabulary::swap_remove`.
    pub fn swap_remove_row(&mut self, id: WordId) {
        let last = self.rows() - 1;
        if id != last {
            for k in 0..self.dim {
                self.input.swap(id * self.dim + k, last * self.dim + k);
                self.output.swap(id * self.dim + k, last * self.dim + k);
            }
        }
        self.input.truncate(last * self.dim);
        self.output.truncate(last * self.dim);
    }

    pub fn vector(&self, id: WordId) -> &[f32] {
        &self.input[id * self.dim..(id + 1) * self.dim]
    }

    fn norm(&self, id: WordId) -> f32 {
        self.vector(id).iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Cosine similarity between the input vectors of two words.
    pub fn cosine(&self, a: WordId, b: WordId) -> f32 {
        let denom = self.norm(a) * self.norm(b);
        if denom == 0.0 {
            return 0.0;
        }
        let dot: f32 = self.vector(a).iter().zip(self.vector(b)).map(|(x, y)| x * y).sum();
        dot / denom
    }
}

/// Skip-gram with negative sampling, applied incrementally on top of
/// whatever the weights already hold.
pub struct LearningEngine {
    learning_rate: f32,
    min_learning_rate: f32,
    negative: usize,
    epochs: usize,
    sample: f64,
}

impl LearningEngine {
    pub fn new(config: &TrainerConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            min_learning_rate: config.min_learning_rate,
            negative: config.negative,
            epochs: config.epochs,
            sample: config.sample,
        }
    }

    /// Runs `epochs` passes over `sentences` (already mapped to vocabulary ids).
    /// Returns the number of word positions trained.
    pub fn learn<R: Rng>(
        &self,
        weights: &mut Weights,
        vocab: &Vocabulary,
        context: &ContextWindow,
        sentences: &[Vec<WordId>],
        rng: &mut R,
    ) -> usize {
        let total_positions: usize = sentences.iter().map(Vec::len).sum();
        let Some(noise) = self.noise_distribution(vocab) else {
            return 0;
        };
        if total_positions == 0 {
            return 0;
        }

        let total_words: u64 = vocab.iter().map(|(_, e)| e.count).sum();
        let total_work = (total_positions * self.epochs) as f32;
        let mut processed = 0usize;
        let mut trained = 0usize;
        let mut scratch = vec![0.0f32; weights.dim];

        for _ in 0..self.epochs {
            for sentence in sentences {
                let kept: Vec<WordId> = sentence
                    .iter()
                    .copied()
                    .filter(|&id| self.keep(vocab.metadata_store[id].count, total_words, rng))
                    .collect();
                processed += sentence.len();

                let progress = processed as f32 / total_work;
                let alpha = (self.learning_rate * (1.0 - progress)).max(self.min_learning_rate);

                for (center, target) in context.pairs(&kept, rng) {
                    self.update_pair(weights, center, target, &noise, alpha, &mut scratch, rng);
                }
                trained += kept.len();
            }
        }
        trained
    }

    fn noise_distribution(&self, vocab: &Vocabulary) -> Option<WeightedIndex<f64>> {
        let weights: Vec<f64> = vocab
            .iter()
            .map(|(_, e)| (e.count as f64).powf(NEGATIVE_POWER))
            .collect();
        WeightedIndex::new(weights).ok()
    }

    /// Frequent-word subsampling; `sample <= 0` keeps everything.
    fn keep<R: Rng>(&self, count: u64, total: u64, rng: &mut R) -> bool {
        if self.sample <= 0.0 || count == 0 {
            return true;
        }
        let threshold = self.sample * total as f64;
        let ratio = count as f64 / threshold;
        let keep_prob = ((ratio.sqrt() + 1.0) / ratio).min(1.0);
        rng.gen::<f64>() < keep_prob
    }

    #[allow(clippy::too_many_arguments)]
    fn update_pair<R: Rng>(
        &self,
        weights: &mut Weights,
        center: WordId,
        target: WordId,
        noise: &WeightedIndex<f64>,
        alpha: f32,
        scratch: &mut [f32],
        rng: &mut R,
    ) {
        let dim = weights.dim;
        scratch.iter_mut().for_each(|x| *x = 0.0);
        let in_row = center * dim..(center + 1) * dim;

        let mut step = |out_id: WordId, label: f32, weights: &mut Weights| {
            let out_row = out_id * dim..(out_id + 1) * dim;
            let input = &weights.input[in_row.clone()];
            let output = &mut weights.output[out_row];
            let f: f32 = input.iter().zip(output.iter()).map(|(a, b)| a * b).sum();
            let g = (label - sigmoid(f)) * alpha;
            for k in 0..dim {
                scratch[k] += g * output[k];
                output[k] += g * input[k];
            }
        };

        step(target, 1.0, weights);
        for _ in 0..self.negative {
            let sampled = noise.sample(rng);
            if sampled != target {
                step(sampled, 0.0, weights);
            }
        }

        for (w, delta) in weights.input[in_row].iter_mut().zip(scratch.iter()) {
            *w += delta;
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    if x > MAX_EXP {
        1.0
    } else if x < -MAX_EXP {
        0.0
    } else {
        1.0 / (1.0 + (-x).exp())
    }
}
