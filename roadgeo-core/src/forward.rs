//! Forward pipeline: road name -> latitude/longitude, in checkpointed chunks.
//!
//! The dataset is split into fixed-size chunks. Each chunk is looked up row
//! by row and written to its own checkpoint file; a chunk whose checkpoint
//! already holds data is skipped, so re-running after an interruption picks
//! up at the first unfinished chunk. Chunk files are not merged here (see
//! [`crate::merge`]).

use crate::checkpoint::CheckpointStore;
use crate::chunk::{plan_chunks, Chunk};
use crate::dataset::Dataset;
use crate::geocoding::{Coordinates, GeocodeError, Geocoder};
use crate::progress::{CancellationToken, ProgressCallback, ProgressReporter, ProgressUnit};
use crate::{EnrichConfig, FailurePolicy, LookupFailure};
use anyhow::Result;
use std::path::PathBuf;

pub const LATITUDE_COLUMN: &str = "latitude";
pub const LONGITUDE_COLUMN: &str = "longitude";

/// What happened to one chunk during a forward run
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkStatus {
    /// A non-empty checkpoint was already on disk; no lookups were made
    Skipped,
    /// Rows were looked up and the checkpoint written
    Processed { path: PathBuf, failures: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutcome {
    pub chunk: Chunk,
    pub status: ChunkStatus,
}

/// Result of a forward run
#[derive(Debug, Clone, Default)]
pub struct ForwardSummary {
    pub total_rows: usize,
    /// One entry per chunk reached, in order
    pub chunks: Vec<ChunkOutcome>,
    /// Rows that got the (0, 0) sentinel
    pub failures: Vec<LookupFailure>,
    /// Geocoder calls issued
    pub lookups: usize,
    /// Stopped early by the cancellation token
    pub cancelled: bool,
}

impl ForwardSummary {
    pub fn processed_chunks(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| matches!(c.status, ChunkStatus::Processed { .. }))
            .count()
    }

    pub fn skipped_chunks(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| c.status == ChunkStatus::Skipped)
            .count()
    }
}

/// Run the forward pipeline over an in-memory dataset
pub(crate) fn run_forward<G: Geocoder>(
    dataset: &Dataset,
    column: &str,
    config: &EnrichConfig,
    geocoder: &G,
    progress: &Option<ProgressCallback>,
    cancel: &CancellationToken,
) -> Result<ForwardSummary> {
    if config.chunk_size == 0 {
        anyhow::bail!("Chunk size must be at least 1");
    }
    let column_index = dataset.require_column(column)?;

    let store = CheckpointStore::new(&config.checkpoint_dir);
    let chunks = plan_chunks(dataset.len(), config.chunk_size);
    let reporter = ProgressReporter::new(progress, ProgressUnit::Chunk, chunks.len());

    log::info!(
        "Geocoding {} rows of '{}' in {} chunks of {}",
        dataset.len(),
        column,
        chunks.len(),
        config.chunk_size
    );

    let mut summary = ForwardSummary {
        total_rows: dataset.len(),
        ..ForwardSummary::default()
    };

    for chunk in chunks {
        if cancel.is_cancelled() {
            log::info!("Cancelled before chunk at row {}", chunk.start);
            summary.cancelled = true;
            break;
        }

        if store.is_complete(chunk.start) {
            log::info!(
                "Skipping rows {}..{}: checkpoint {} already exists",
                chunk.start,
                chunk.end,
                store.path_for(chunk.start).display()
            );
            summary.chunks.push(ChunkOutcome {
                chunk,
                status: ChunkStatus::Skipped,
            });
            reporter.report(chunk.index + 1);
            continue;
        }

        let mut coordinates = Vec::with_capacity(chunk.len());
        let mut chunk_failures = 0;

        for row in chunk.rows() {
            let value = dataset.value(row, column_index);
            let query = format!("{}{}", value, config.locality_suffix);

            let result = if value.trim().is_empty() {
                Err(anyhow::anyhow!("empty road name"))
            } else {
                summary.lookups += 1;
                match geocoder.forward(&query) {
                    Ok(Some(found)) => Ok(found),
                    Ok(None) => Err(GeocodeError::NotFound(query.clone()).into()),
                    Err(e) => Err(e.into()),
                }
            };

            match result {
                Ok(found) => coordinates.push(found),
                Err(e) => match config.forward_failures {
                    FailurePolicy::Tolerate => {
                        log::warn!("Lookup failed at record {} ('{}'): {:#}", row, query, e);
                        summary.failures.push(LookupFailure {
                            row_index: row,
                            query,
                            reason: format!("{:#}", e),
                        });
                        chunk_failures += 1;
                        coordinates.push(Coordinates::SENTINEL);
                    }
                    FailurePolicy::Abort => {
                        return Err(e.context(format!(
                            "Lookup failed at record {} ('{}')",
                            row, query
                        )));
                    }
                },
            }
        }

        let mut rows = dataset.slice(chunk.rows());
        rows.set_column(
            LATITUDE_COLUMN,
            coordinates.iter().map(|c| c.latitude.to_string()).collect(),
        )?;
        rows.set_column(
            LONGITUDE_COLUMN,
            coordinates.iter().map(|c| c.longitude.to_string()).collect(),
        )?;

        let path = store.write(chunk.start, &rows)?;

        log::info!(
            "Wrote rows {}..{} to {} ({} failed lookups)",
            chunk.start,
            chunk.end,
            path.display(),
            chunk_failures
        );

        summary.chunks.push(ChunkOutcome {
            chunk,
            status: ChunkStatus::Processed {
                path,
                failures: chunk_failures,
            },
        });
        reporter.report(chunk.index + 1);
    }

    Ok(summary)
}
