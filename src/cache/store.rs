//! Artifact stores backing the result cache

use super::CacheKey;
use crate::error::DrugPropResult;
use crate::matrix::LabeledMatrix;
use crate::table;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Persistence for cache artifacts.
///
/// `load` returns `Ok(None)` for an absent artifact; an `Err` means the
/// artifact exists but could not be read, which the cache treats as a miss.
pub trait ArtifactStore {
    fn load(&self, key: &CacheKey) -> DrugPropResult<Option<LabeledMatrix>>;

    /// Overwrite the artifact for `key`
    fn save(&self, key: &CacheKey, matrix: &LabeledMatrix) -> DrugPropResult<()>;

    fn contains(&self, key: &CacheKey) -> bool;
}

/// CSV artifacts in a directory, first column = row labels
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }
}

impl ArtifactStore for FileStore {
    fn load(&self, key: &CacheKey) -> DrugPropResult<Option<LabeledMatrix>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(table::read_matrix(&path)?))
    }

    fn save(&self, key: &CacheKey, matrix: &LabeledMatrix) -> DrugPropResult<()> {
        table::write_matrix(&self.path_for(key), matrix)?;
        Ok(())
    }

    fn contains(&self, key: &CacheKey) -> bool {
        self.path_for(key).exists()
    }
}

/// In-memory store; hits and misses are fully controlled by the caller
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: RwLock<HashMap<CacheKey, LabeledMatrix>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop one artifact, forcing the next lookup to miss
    pub fn evict(&self, key: &CacheKey) -> Option<LabeledMatrix> {
        self.artifacts.write().ok()?.remove(key)
    }
}

impl ArtifactStore for MemoryStore {
    fn load(&self, key: &CacheKey) -> DrugPropResult<Option<LabeledMatrix>> {
        let artifacts = self
            .artifacts
            .read()
            .map_err(|_| crate::error::DrugPropError::Cache("memory store lock poisoned".into()))?;
        Ok(artifacts.get(key).cloned())
    }

    fn save(&self, key: &CacheKey, matrix: &LabeledMatrix) -> DrugPropResult<()> {
        let mut artifacts = self
            .artifacts
            .write()
            .map_err(|_| crate::error::DrugPropError::Cache("memory store lock poisoned".into()))?;
        artifacts.insert(key.clone(), matrix.clone());
        Ok(())
    }

    fn contains(&self, key: &CacheKey) -> bool {
        self.artifacts
            .read()
            .map(|a| a.contains_key(key))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ArtifactKind;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_roundtrip_is_bit_identical() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        let key = CacheKey::new(ArtifactKind::Diffusion).with_fingerprint("f00d");
        let matrix = LabeledMatrix::new(
            ["D1", "D2"],
            ["1", "2", "3"],
            array![[1.0, 0.1 + 0.2, 1.0 / 3.0], [0.0, 1e-300, 0.4]],
        )
        .unwrap();

        assert!(!store.contains(&key));
        assert_eq!(store.load(&key).unwrap(), None);

        store.save(&key, &matrix).unwrap();
        assert!(store.contains(&key));
        assert_eq!(store.load(&key).unwrap(), Some(matrix));
    }

    #[test]
    fn test_file_store_malformed_artifact_errors() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        let key = CacheKey::new(ArtifactKind::NetworkMatrix);
        std::fs::write(store.path_for(&key), ",1,2\n1,0.0,not-a-number\n").unwrap();

        assert!(store.load(&key).is_err());
    }

    #[test]
    fn test_memory_store_evict() {
        let store = MemoryStore::new();
        let key = CacheKey::new(ArtifactKind::NetworkMatrix);
        let matrix = LabeledMatrix::zeros(["1"], ["1"]).unwrap();

        store.save(&key, &matrix).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.evict(&key), Some(matrix));
        assert!(store.is_empty());
    }
}
