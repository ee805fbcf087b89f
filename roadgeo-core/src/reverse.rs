//! Reverse pipeline: latitude/longitude -> road name, one row at a time,
//! with a single output file written at the end.

use crate::dataset::Dataset;
use crate::forward::{LATITUDE_COLUMN, LONGITUDE_COLUMN};
use crate::geocoding::{Coordinates, GeocodeError, Geocoder, UNKNOWN_ROAD};
use crate::progress::{CancellationToken, ProgressCallback, ProgressReporter, ProgressUnit};
use crate::{EnrichConfig, FailurePolicy, LookupFailure};
use anyhow::{Context, Result};
use std::path::PathBuf;

pub const ROAD_NAME_COLUMN: &str = "road_name";

/// Result of a reverse run
#[derive(Debug, Clone, Default)]
pub struct ReverseSummary {
    pub total_rows: usize,
    /// Output file, `None` when the run was cancelled
    pub output: Option<PathBuf>,
    /// Rows that got "Unknown" because the lookup failed (tolerant policy only)
    pub failures: Vec<LookupFailure>,
    pub lookups: usize,
    pub cancelled: bool,
}

fn parse_coordinate(value: &str, column: &str) -> Result<f64> {
    let parsed: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} '{}'", column, value))?;
    if !parsed.is_finite() {
        anyhow::bail!("Invalid {} '{}'", column, value);
    }
    Ok(parsed)
}

fn lookup_road<G: Geocoder>(
    geocoder: &G,
    dataset: &Dataset,
    row: usize,
    lat_index: usize,
    lon_index: usize,
    lookups: &mut usize,
) -> Result<String> {
    let coordinates = Coordinates::new(
        parse_coordinate(dataset.value(row, lat_index), LATITUDE_COLUMN)?,
        parse_coordinate(dataset.value(row, lon_index), LONGITUDE_COLUMN)?,
    );

    *lookups += 1;
    match geocoder.reverse(coordinates)? {
        Some(address) => Ok(address.road_or_unknown().to_string()),
        None => Err(GeocodeError::NotFound(coordinates.to_string()).into()),
    }
}

/// Run the reverse pipeline and write `config.reverse_output`
pub(crate) fn run_reverse<G: Geocoder>(
    mut dataset: Dataset,
    config: &EnrichConfig,
    geocoder: &G,
    progress: &Option<ProgressCallback>,
    cancel: &CancellationToken,
) -> Result<ReverseSummary> {
    let lat_index = dataset.require_column(LATITUDE_COLUMN)?;
    let lon_index = dataset.require_column(LONGITUDE_COLUMN)?;

    let total = dataset.len();
    let reporter = ProgressReporter::new(progress, ProgressUnit::Row, total);
    let mut summary = ReverseSummary {
        total_rows: total,
        ..ReverseSummary::default()
    };

    log::info!("Reverse geocoding {} rows", total);

    let mut road_names = Vec::with_capacity(total);

    for row in 0..total {
        if cancel.is_cancelled() {
            log::info!("Cancelled at record {}; no output written", row);
            summary.cancelled = true;
            return Ok(summary);
        }

        let lookup = lookup_road(geocoder, &dataset, row, lat_index, lon_index, &mut summary.lookups);

        match lookup {
            Ok(road) => road_names.push(road),
            Err(e) => match config.reverse_failures {
                FailurePolicy::Abort => {
                    return Err(e.context(format!("Reverse lookup failed at record {}", row)));
                }
                FailurePolicy::Tolerate => {
                    let query = format!(
                        "{},{}",
                        dataset.value(row, lat_index),
                        dataset.value(row, lon_index)
                    );
                    log::warn!("Reverse lookup failed at record {} ({}): {:#}", row, query, e);
                    summary.failures.push(LookupFailure {
                        row_index: row,
                        query,
                        reason: format!("{:#}", e),
                    });
                    road_names.push(UNKNOWN_ROAD.to_string());
                }
            },
        }

        reporter.report(row + 1);
    }

    dataset.set_column(ROAD_NAME_COLUMN, road_names)?;
    dataset
        .write_atomic(&config.reverse_output)
        .with_context(|| format!("Failed to write {}", config.reverse_output.display()))?;

    log::info!(
        "Wrote {} rows to {}",
        total,
        config.reverse_output.display()
    );
    summary.output = Some(config.reverse_output.clone());
    Ok(summary)
}
