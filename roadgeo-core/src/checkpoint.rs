use crate::dataset::Dataset;
use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

lazy_static::lazy_static! {
    static ref CHECKPOINT_NAME: Regex = Regex::new(r"^roads_lat_long_(\d+)\.csv$").unwrap();
}

/// File name of the checkpoint for the chunk starting at `start`
pub fn checkpoint_file_name(start: usize) -> String {
    format!("roads_lat_long_{}.csv", start)
}

/// A checkpoint file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointFile {
    /// Start row of the chunk, parsed from the file name
    pub start: usize,
    pub path: PathBuf,
}

/// Directory of per-chunk checkpoint files.
///
/// A checkpoint is trusted as soon as it holds one data record; the contents
/// are not validated beyond that.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, start: usize) -> PathBuf {
        self.dir.join(checkpoint_file_name(start))
    }

    /// Whether the chunk starting at `start` has already been processed.
    /// Missing, zero-byte, header-only and unreadable files all count as incomplete.
    pub fn is_complete(&self, start: usize) -> bool {
        let path = self.path_for(start);
        match has_data_record(&path) {
            Ok(complete) => complete,
            Err(e) => {
                log::debug!("Treating {} as incomplete: {:#}", path.display(), e);
                false
            }
        }
    }

    /// Persist a processed chunk. Returns the checkpoint path.
    pub fn write(&self, start: usize, chunk: &Dataset) -> Result<PathBuf> {
        let path = self.path_for(start);
        chunk
            .write_atomic(&path)
            .with_context(|| format!("Failed to write checkpoint for chunk at row {}", start))?;
        Ok(path)
    }

    /// All checkpoint files in the directory (non-recursive), ordered by start row
    pub fn discover(&self) -> Result<Vec<CheckpointFile>> {
        let mut found = Vec::new();

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry
                .with_context(|| format!("Failed to scan {}", self.dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str() else {
                continue;
            };

            if let Some(caps) = CHECKPOINT_NAME.captures(name) {
                // Skip indices that overflow usize instead of failing the whole scan
                if let Ok(start) = caps[1].parse::<usize>() {
                    found.push(CheckpointFile {
                        start,
                        path: entry.path().to_path_buf(),
                    });
                }
            }
        }

        found.sort_by_key(|c| c.start);
        Ok(found)
    }
}

fn has_data_record(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    if fs::metadata(path)?.len() == 0 {
        return Ok(false);
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut record = csv::StringRecord::new();
    Ok(reader.read_record(&mut record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn one_row() -> Dataset {
        Dataset::new(
            vec!["road".into(), "latitude".into(), "longitude".into()],
            vec![vec!["Orchard Road".into(), "1.3".into(), "103.8".into()]],
        )
        .unwrap()
    }

    #[test]
    fn test_file_name_pattern() {
        assert_eq!(checkpoint_file_name(0), "roads_lat_long_0.csv");
        assert_eq!(checkpoint_file_name(200), "roads_lat_long_200.csv");
    }

    #[test]
    fn test_missing_checkpoint_is_incomplete() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path());
        assert!(!store.is_complete(0));
        Ok(())
    }

    #[test]
    fn test_empty_and_header_only_are_incomplete() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path());

        fs::write(store.path_for(0), "")?;
        assert!(!store.is_complete(0));

        fs::write(store.path_for(100), "road,latitude,longitude\n")?;
        assert!(!store.is_complete(100));
        Ok(())
    }

    #[test]
    fn test_written_checkpoint_is_complete() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path().join("chunks"));

        let path = store.write(100, &one_row())?;
        assert_eq!(path, temp_dir.path().join("chunks").join("roads_lat_long_100.csv"));
        assert!(store.is_complete(100));
        assert!(!store.is_complete(0));
        Ok(())
    }

    #[test]
    fn test_malformed_nonempty_checkpoint_is_trusted() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path());

        // Wrong field count is not detected
        fs::write(store.path_for(0), "a,b,c\n1\n")?;
        assert!(store.is_complete(0));
        Ok(())
    }

    #[test]
    fn test_discover_orders_by_start() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = CheckpointStore::new(temp_dir.path());

        store.write(200, &one_row())?;
        store.write(0, &one_row())?;
        store.write(100, &one_row())?;
        fs::write(temp_dir.path().join("roads_lat_long_x.csv"), "junk")?;
        fs::write(temp_dir.path().join("input.csv"), "road\nA\n")?;
        fs::create_dir(temp_dir.path().join("roads_lat_long_300.csv"))?;

        let found = store.discover()?;
        let starts: Vec<usize> = found.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![0, 100, 200]);
        Ok(())
    }
}
