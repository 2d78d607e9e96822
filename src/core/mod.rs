// src/core/mod.rs

pub mod context;
pub mod embedding;
pub mod tokenizer;
pub mod types;
pub mod vocab;
