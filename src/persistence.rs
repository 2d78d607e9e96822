// File: src/persistence.rs
use crate::core::embedding::EmbeddingModel;
use crate::core::types::WindowKey;
use crate::error::{Result, SlangError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Bumped whenever the serialized model layout changes.
const SNAPSHOT_VERSION: u32 = 1;
const MODEL_FILE: &str = "model.bin";
const INIT_SNAPSHOT: &str = "init";

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    model: &'a EmbeddingModel,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    model: EmbeddingModel,
}

/// Directory layout under the storage root:
/// `archive/<key>.json`, `models/<key>/model.bin`, `glossaries/<key>.json`.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    pub fn snapshot_dir(&self, key: &WindowKey) -> PathBuf {
        self.root.join("models").join(key.to_string())
    }

    pub fn init_snapshot_dir(&self) -> PathBuf {
        self.root.join("models").join(INIT_SNAPSHOT)
    }

    pub fn glossary_path(&self, key: &WindowKey) -> PathBuf {
        self.root.join("glossaries").join(format!("{key}.json"))
    }
}

/// Writes through a temp file in the target directory and renames it into place,
/// so readers never observe a half-written file.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&NamedTempFile>) -> Result<()>,
{
    let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent_dir).map_err(|e| SlangError::storage(parent_dir, e))?;

    let temp_file = NamedTempFile::new_in(parent_dir).map_err(|e| SlangError::storage(parent_dir, e))?;
    {
        let mut writer = BufWriter::new(&temp_file);
        write(&mut writer)?;
        writer.flush().map_err(|e| SlangError::storage(path, e))?;
    }
    temp_file
        .persist(path)
        .map_err(|e| SlangError::storage(path, e.error))?;
    Ok(())
}

/// Saves a model snapshot as `<dir>/model.bin`.
pub fn save_model(model: &EmbeddingModel, dir: &Path) -> Result<()> {
    let state = SnapshotRef { version: SNAPSHOT_VERSION, model };
    write_atomic(&dir.join(MODEL_FILE), |writer| {
        bincode::serialize_into(writer, &state)?;
        Ok(())
    })
}

pub fn load_model(dir: &Path) -> Result<EmbeddingModel> {
    let path = dir.join(MODEL_FILE);
    let file = File::open(&path).map_err(|e| SlangError::storage(&path, e))?;
    let snapshot: Snapshot = bincode::deserialize_from(BufReader::new(file))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SlangError::Serialization(format!(
            "snapshot {} has version {}, expected {}",
            path.display(),
            snapshot.version,
            SNAPSHOT_VERSION
        )));
    }
    Ok(snapshot.model)
}

pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    write_atomic(path, |writer| {
        serde_json::to_writer(writer, value)?;
        Ok(())
    })
}

/// Tab-indented, for files people are expected to read.
pub fn save_json_pretty<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    write_atomic(path, |writer| {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
        value.serialize(&mut serializer)?;
        Ok(())
    })
}

pub fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| SlangError::storage(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainerConfig;
    use crate::core::types::Batch;

    #[test]
    fn model_survives_a_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainerConfig { dimensions: 8, min_count: 1, ..TrainerConfig::default() };
        let words: Vec<String> = "the cat sat on the mat".split(' ').map(String::from).collect();
        let model = EmbeddingModel::new(&config).apply(&Batch { window_start: 0, comments: vec![words] });

        let snapshot = dir.path().join("models").join("2018-01-15 00:00");
        save_model(&model, &snapshot).unwrap();
        let loaded = load_model(&snapshot).unwrap();

        assert_eq!(loaded.vocabulary_size(), model.vocabulary_size());
        assert_eq!(
            loaded.nearest_neighbors("cat", 3).unwrap(),
            model.nearest_neighbors("cat", 3).unwrap()
        );
    }

    #[test]
    fn missing_snapshot_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_model(dir.path()), Err(SlangError::Storage { .. })));
    }

    #[test]
    fn pretty_json_is_tab_indented() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        save_json_pretty(&serde_json::json!({"yeet": [["good", 0.9]]}), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n\t\"yeet\""));
        let back: serde_json::Value = load_json(&path).unwrap();
        assert_eq!(back["yeet"][0][0], "good");
    }

    #[test]
    fn layout_uses_canonical_keys() {
        let layout = StorageLayout::new("/data");
        let key = WindowKey::parse("2018-01-15 12:00").unwrap();
        assert_eq!(layout.snapshot_dir(&key), PathBuf::from("/data/models/2018-01-15 12:00"));
        assert_eq!(layout.glossary_path(&key), PathBuf::from("/data/glossaries/2018-01-15 12:00.json"));
        assert_eq!(layout.init_snapshot_dir(), PathBuf::from("/data/models/init"));
    }
}
