// File: src/dictionary/mod.rs
pub mod reference;
pub mod slang;

pub use reference::ReferenceDictionary;
pub use slang::SlangDictionary;
