use anyhow::Result;
use std::path::{Path, PathBuf};

mod cache;
mod checkpoint;
mod chunk;
mod dataset;
mod forward;
mod geocoding;
mod merge;
mod nominatim;
mod progress;
mod reverse;

// Re-export public types
pub use cache::CachingGeocoder;
pub use checkpoint::{checkpoint_file_name, CheckpointFile, CheckpointStore};
pub use chunk::{chunk_count, plan_chunks, Chunk};
pub use dataset::Dataset;
pub use forward::{ChunkOutcome, ChunkStatus, ForwardSummary, LATITUDE_COLUMN, LONGITUDE_COLUMN};
pub use geocoding::{Address, Coordinates, GeocodeError, Geocoder, UNKNOWN_ROAD};
pub use merge::{checkpoint_status, merge_checkpoints, ChunkState, MergeSummary};
pub use nominatim::{NominatimConfig, NominatimGeocoder, DEFAULT_BASE_URL};
pub use progress::{CancellationToken, Progress, ProgressCallback, ProgressUnit};
pub use reverse::{ReverseSummary, ROAD_NAME_COLUMN};

/// Rows per forward chunk (and per checkpoint file)
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Appended to every road name before a forward lookup
pub const DEFAULT_LOCALITY_SUFFIX: &str = ", Singapore";

/// File written by the reverse pipeline
pub const DEFAULT_REVERSE_OUTPUT: &str = "output_with_road_names.csv";

/// What a pipeline does when a single lookup fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Write the sentinel value, log the row, keep going
    Tolerate,
    /// Stop the run and return the error
    Abort,
}

/// A lookup that failed and was replaced by a sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupFailure {
    /// Absolute, 0-based row index in the input dataset
    pub row_index: usize,
    /// Query sent to the geocoder (road + suffix, or "lat,lon")
    pub query: String,
    pub reason: String,
}

/// Configuration options for the enrichment engine
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Rows per forward chunk
    pub chunk_size: usize,
    /// Appended to the road name to form the forward query
    pub locality_suffix: String,
    /// Where forward checkpoint files live
    pub checkpoint_dir: PathBuf,
    /// Path of the reverse pipeline's output file
    pub reverse_output: PathBuf,
    /// Forward pipeline failure handling (defaults to Tolerate: write (0, 0))
    pub forward_failures: FailurePolicy,
    /// Reverse pipeline failure handling (defaults to Abort)
    pub reverse_failures: FailurePolicy,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            locality_suffix: DEFAULT_LOCALITY_SUFFIX.to_string(),
            checkpoint_dir: PathBuf::from("."),
            reverse_output: PathBuf::from(DEFAULT_REVERSE_OUTPUT),
            forward_failures: FailurePolicy::Tolerate,
            reverse_failures: FailurePolicy::Abort,
        }
    }
}

/// Runs the forward and reverse pipelines against a geocoder
pub struct EnrichEngine<G> {
    config: EnrichConfig,
    geocoder: G,
    cancel: CancellationToken,
}

impl<G: Geocoder> EnrichEngine<G> {
    /// Create a new engine with the given configuration and geocoder
    pub fn new(config: EnrichConfig, geocoder: G) -> Self {
        Self {
            config,
            geocoder,
            cancel: CancellationToken::new(),
        }
    }

    /// Handle for stopping a running pipeline from another thread
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Load `input` and geocode `column` chunk by chunk, writing one checkpoint per chunk
    pub fn forward_file(
        &self,
        input: &Path,
        column: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<ForwardSummary> {
        let dataset = Dataset::load(input)?;
        self.forward(&dataset, column, progress)
    }

    /// Geocode `column` of an already loaded dataset
    pub fn forward(
        &self,
        dataset: &Dataset,
        column: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<ForwardSummary> {
        forward::run_forward(
            dataset,
            column,
            &self.config,
            &self.geocoder,
            &progress,
            &self.cancel,
        )
    }

    /// Load `input` and add a road name to every latitude/longitude row
    pub fn reverse_file(
        &self,
        input: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<ReverseSummary> {
        let dataset = Dataset::load(input)?;
        self.reverse(dataset, progress)
    }

    /// Reverse geocode an already loaded dataset
    pub fn reverse(
        &self,
        dataset: Dataset,
        progress: Option<ProgressCallback>,
    ) -> Result<ReverseSummary> {
        reverse::run_reverse(
            dataset,
            &self.config,
            &self.geocoder,
            &progress,
            &self.cancel,
        )
    }

    /// Per-chunk checkpoint state for a dataset of `total_rows` rows
    pub fn checkpoint_status(&self, total_rows: usize) -> Result<Vec<ChunkState>> {
        merge::checkpoint_status(total_rows, self.config.chunk_size, &self.config.checkpoint_dir)
    }

    /// Concatenate this engine's checkpoints into `output`
    pub fn merge_checkpoints(&self, output: &Path) -> Result<MergeSummary> {
        merge::merge_checkpoints(&self.config.checkpoint_dir, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoding::fake::FakeGeocoder;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EnrichConfig::default();
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.locality_suffix, ", Singapore");
        assert_eq!(config.forward_failures, FailurePolicy::Tolerate);
        assert_eq!(config.reverse_failures, FailurePolicy::Abort);
        assert_eq!(config.reverse_output, PathBuf::from("output_with_road_names.csv"));
    }

    #[test]
    fn test_forward_file_then_merge() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let input = temp_dir.path().join("roads.csv");
        fs::write(
            &input,
            "road\nOrchard Road\nJalan Besar\nNorth Bridge Road\n",
        )?;

        let config = EnrichConfig {
            chunk_size: 2,
            checkpoint_dir: temp_dir.path().join("chunks"),
            ..EnrichConfig::default()
        };
        let geocoder = FakeGeocoder::new()
            .with_place("Orchard Road, Singapore", 1.3048, 103.8318)
            .with_place("Jalan Besar, Singapore", 1.3106, 103.8572);
        let engine = EnrichEngine::new(config, &geocoder);

        let summary = engine.forward_file(&input, "road", None)?;
        assert_eq!(summary.processed_chunks(), 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].row_index, 2);

        let status = engine.checkpoint_status(3)?;
        assert!(status.iter().all(|s| s.complete));

        let merged_path = temp_dir.path().join("merged.csv");
        let merged = engine.merge_checkpoints(&merged_path)?;
        assert_eq!(merged.rows, 3);

        let merged = Dataset::load(&merged_path)?;
        assert_eq!(merged.headers(), ["road", "latitude", "longitude"]);
        assert_eq!(merged.value(0, 1), "1.3048");
        assert_eq!(merged.value(2, 1), "0");
        Ok(())
    }

    #[test]
    fn test_reverse_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let input = temp_dir.path().join("points.csv");
        fs::write(&input, "latitude,longitude\n1.3048,103.8318\n")?;

        let config = EnrichConfig {
            reverse_output: temp_dir.path().join("out.csv"),
            ..EnrichConfig::default()
        };
        let geocoder = FakeGeocoder::new().with_road(1.3048, 103.8318, "Orchard Road");
        let engine = EnrichEngine::new(config, CachingGeocoder::new(&geocoder));

        let summary = engine.reverse_file(&input, None)?;
        assert_eq!(summary.output, Some(temp_dir.path().join("out.csv")));

        let output = Dataset::load(&temp_dir.path().join("out.csv"))?;
        assert_eq!(output.value(0, 2), "Orchard Road");
        Ok(())
    }

    #[test]
    fn test_cancelled_engine_does_no_work() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = EnrichConfig {
            checkpoint_dir: temp_dir.path().to_path_buf(),
            ..EnrichConfig::default()
        };
        let geocoder = FakeGeocoder::new();
        let engine = EnrichEngine::new(config, &geocoder);

        engine.cancellation_token().cancel();
        let dataset = Dataset::new(vec!["road".into()], vec![vec!["A".into()]])?;
        let summary = engine.forward(&dataset, "road", None)?;

        assert!(summary.cancelled);
        assert_eq!(geocoder.forward_count(), 0);

        engine.cancellation_token().reset();
        let summary = engine.forward(&dataset, "road", None)?;
        assert!(!summary.cancelled);
        assert_eq!(geocoder.forward_count(), 1);
        Ok(())
    }
}
