//! Opt-in concatenation of forward checkpoints into a single CSV.
//!
//! The forward pipeline leaves one file per chunk. This module stitches them
//! back together in start-row order. It refuses to merge when a checkpoint
//! is empty or when headers differ between files.

use crate::checkpoint::{CheckpointFile, CheckpointStore};
use crate::dataset::Dataset;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Result of a merge
#[derive(Debug, Clone)]
pub struct MergeSummary {
    /// Checkpoints merged, in order
    pub files: Vec<CheckpointFile>,
    /// Data rows written
    pub rows: usize,
    pub output: PathBuf,
}

/// Merge every checkpoint in `dir` into `output`
pub fn merge_checkpoints(dir: &Path, output: &Path) -> Result<MergeSummary> {
    let store = CheckpointStore::new(dir);
    let files = store.discover()?;

    if files.is_empty() {
        anyhow::bail!("No checkpoint files found in {}", dir.display());
    }

    let mut merged: Option<Dataset> = None;

    for file in &files {
        let chunk = Dataset::load(&file.path)?;
        if chunk.is_empty() {
            anyhow::bail!(
                "Checkpoint {} is empty; re-run the forward pipeline first",
                file.path.display()
            );
        }

        log::debug!("Merging {} ({} rows)", file.path.display(), chunk.len());

        match merged.as_mut() {
            None => merged = Some(chunk),
            Some(all) => all
                .extend(chunk)
                .with_context(|| format!("Cannot merge {}", file.path.display()))?,
        }
    }

    // files is non-empty, so at least one chunk was loaded
    let merged = merged.unwrap_or_default();
    merged.write_atomic(output)?;

    log::info!(
        "Merged {} checkpoints ({} rows) into {}",
        files.len(),
        merged.len(),
        output.display()
    );

    Ok(MergeSummary {
        rows: merged.len(),
        files,
        output: output.to_path_buf(),
    })
}

/// Completion state of one planned chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkState {
    pub chunk: crate::chunk::Chunk,
    pub path: PathBuf,
    pub complete: bool,
}

/// Which chunks of a `total_rows` dataset already have a usable checkpoint in `dir`.
/// Issues no lookups.
pub fn checkpoint_status(total_rows: usize, chunk_size: usize, dir: &Path) -> Result<Vec<ChunkState>> {
    if chunk_size == 0 {
        anyhow::bail!("Chunk size must be at least 1");
    }

    let store = CheckpointStore::new(dir);
    Ok(crate::chunk::plan_chunks(total_rows, chunk_size)
        .into_iter()
        .map(|chunk| ChunkState {
            path: store.path_for(chunk.start),
            complete: store.is_complete(chunk.start),
            chunk,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn chunk(ids: &[&str]) -> Dataset {
        Dataset::new(
            vec!["id".into(), "latitude".into(), "longitude".into()],
            ids.iter()
                .map(|id| vec![id.to_string(), "1.3".into(), "103.8".into()])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_merges_in_start_order() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path());
        // Written out of order; 10 sorts after 2 numerically, not lexically
        store.write(10, &chunk(&["c"]))?;
        store.write(0, &chunk(&["a"]))?;
        store.write(2, &chunk(&["b"]))?;

        let output = temp_dir.path().join("merged").join("all.csv");
        let summary = merge_checkpoints(temp_dir.path(), &output)?;

        assert_eq!(summary.rows, 3);
        assert_eq!(summary.files.len(), 3);

        let merged = Dataset::load(&output)?;
        let ids: Vec<&str> = (0..merged.len()).map(|r| merged.value(r, 0)).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        Ok(())
    }

    #[test]
    fn test_rejects_header_mismatch() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path());
        store.write(0, &chunk(&["a"]))?;
        fs::write(store.path_for(100), "id,lat,lon\nb,1,2\n")?;

        let err = merge_checkpoints(temp_dir.path(), &temp_dir.path().join("out.csv")).unwrap_err();
        assert!(format!("{:#}", err).contains("Header mismatch"));
        Ok(())
    }

    #[test]
    fn test_rejects_empty_checkpoint() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path());
        store.write(0, &chunk(&["a"]))?;
        fs::write(store.path_for(100), "id,latitude,longitude\n")?;

        let err = merge_checkpoints(temp_dir.path(), &temp_dir.path().join("out.csv")).unwrap_err();
        assert!(err.to_string().contains("empty"));
        Ok(())
    }

    #[test]
    fn test_no_checkpoints() -> Result<()> {
        let temp_dir = TempDir::new()?;
        assert!(merge_checkpoints(temp_dir.path(), &temp_dir.path().join("out.csv")).is_err());
        Ok(())
    }

    #[test]
    fn test_checkpoint_status() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path());
        store.write(0, &chunk(&["a"]))?;
        fs::write(store.path_for(200), "")?;

        let status = checkpoint_status(250, 100, temp_dir.path())?;
        let complete: Vec<bool> = status.iter().map(|s| s.complete).collect();
        assert_eq!(complete, vec![true, false, false]);
        assert_eq!(status[2].chunk.len(), 50);
        assert!(status[1].path.ends_with("roads_lat_long_100.csv"));

        assert!(checkpoint_status(10, 0, temp_dir.path()).is_err());
        Ok(())
    }
}
