use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Job-scoped directory of per-batch checkpoint files.
///
/// Each completed batch is written to its own file before the in-memory
/// accumulator is cleared, so a failed run costs at most one batch of work.
/// The directory only lives until `assemble` produces the canonical table.
pub struct CheckpointDir {
    dir: PathBuf,
}

impl CheckpointDir {
    pub fn create(ddir: &Path, job: &str) -> Result<Self> {
        let dir = ddir.join(format!("{job}_batches"));
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create checkpoint dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn write_batch<T: Serialize>(&self, index: usize, rows: &[T]) -> Result<PathBuf> {
        let path = self.dir.join(format!("batch_{index:05}.json"));
        let json = serde_json::to_string(rows).context("serialize batch")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).context("write batch checkpoint")?;
        fs::rename(&tmp, &path).context("swap batch checkpoint")?;
        Ok(path)
    }

    /// Merge every checkpoint into one table sorted ascending by `sort_key`,
    /// then delete the checkpoint directory.
    ///
    /// Batches complete out of rank order, so the sort here is the only
    /// ordering downstream stages may rely on.
    pub fn assemble<T, K, F>(self, sort_key: F) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        K: Ord,
        F: Fn(&T) -> K,
    {
        let mut rows: Vec<T> = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read checkpoint dir {}", self.dir.display()))?;
        for entry in entries {
            let path = entry.context("bad checkpoint dir entry")?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read checkpoint {}", path.display()))?;
            let batch: Vec<T> = serde_json::from_str(&raw)
                .with_context(|| format!("invalid checkpoint {}", path.display()))?;
            rows.extend(batch);
        }
        rows.sort_by_key(|row| sort_key(row));
        fs::remove_dir_all(&self.dir).context("failed to remove checkpoint dir")?;
        Ok(rows)
    }
}
