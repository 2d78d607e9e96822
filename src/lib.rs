// src/lib.rs

pub mod archive;
pub mod batcher;
pub mod config;
pub mod core;
pub mod dictionary;
pub mod error;
pub mod learning;
pub mod persistence;
pub mod pipeline;

pub use crate::core::embedding::EmbeddingModel;
pub use crate::error::{Result, SlangError};
pub use crate::pipeline::Orchestrator;
