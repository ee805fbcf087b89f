use anyhow::{Context, Result};
use indicatif::MultiProgress;
use roadgeo_core::{
    checkpoint_status, merge_checkpoints, CachingGeocoder, Dataset, EnrichConfig, EnrichEngine,
    FailurePolicy, ForwardSummary, Geocoder, NominatimConfig, NominatimGeocoder,
};
use std::path::Path;
use std::time::Duration;

mod cli;
mod progress;

use cli::{Args, Command};

fn main() -> Result<()> {
    let args = cli::parse_args();
    let multi = progress::init_logger(args.verbose);

    match &args.command {
        Command::Columns { file } => {
            for (index, name) in Dataset::read_headers(file)?.iter().enumerate() {
                println!("{}\t{}", index, name);
            }
        }
        Command::Forward {
            file,
            column,
            checkpoint_dir,
            chunk_size,
            suffix,
            abort_on_failure,
            merge,
        } => {
            let config = EnrichConfig {
                chunk_size: *chunk_size,
                locality_suffix: suffix.clone(),
                checkpoint_dir: checkpoint_dir.clone(),
                forward_failures: if *abort_on_failure {
                    FailurePolicy::Abort
                } else {
                    FailurePolicy::Tolerate
                },
                ..EnrichConfig::default()
            };
            run_forward(&args, &multi, config, file, column, merge.as_deref())?;
        }
        Command::Reverse {
            file,
            output,
            tolerate_failures,
        } => {
            let config = EnrichConfig {
                reverse_output: output.clone(),
                reverse_failures: if *tolerate_failures {
                    FailurePolicy::Tolerate
                } else {
                    FailurePolicy::Abort
                },
                ..EnrichConfig::default()
            };
            run_reverse(&args, &multi, config, file)?;
        }
        Command::Status {
            file,
            checkpoint_dir,
            chunk_size,
        } => {
            let dataset = Dataset::load(file)?;
            let states = checkpoint_status(dataset.len(), *chunk_size, checkpoint_dir)?;

            for state in &states {
                println!(
                    "rows {:>7}..{:<7} {:<8} {}",
                    state.chunk.start,
                    state.chunk.end,
                    if state.complete { "done" } else { "pending" },
                    state.path.display()
                );
            }

            let complete = states.iter().filter(|s| s.complete).count();
            println!("{}/{} chunks complete", complete, states.len());
        }
        Command::Merge {
            checkpoint_dir,
            output,
        } => {
            let summary = merge_checkpoints(checkpoint_dir, output)?;
            println!(
                "Merged {} checkpoints ({} rows) into {}",
                summary.files.len(),
                summary.rows,
                summary.output.display()
            );
        }
    }

    Ok(())
}

/// Nominatim client configured from the global flags, optionally memoized
fn build_geocoder(args: &Args) -> Result<Box<dyn Geocoder>> {
    let defaults = NominatimConfig::default();
    let config = NominatimConfig {
        base_url: args.nominatim_url.clone(),
        user_agent: args.user_agent.clone().unwrap_or(defaults.user_agent),
        timeout: Duration::from_secs(args.timeout_secs),
        min_interval: Duration::from_millis(args.min_interval_ms),
    };

    let nominatim = NominatimGeocoder::new(config).context("Failed to create HTTP client")?;
    if args.cache {
        Ok(Box::new(CachingGeocoder::new(nominatim)))
    } else {
        Ok(Box::new(nominatim))
    }
}

/// Bar and console message for a finished forward run
fn forward_completion_message(summary: &ForwardSummary) -> &'static str {
    if summary.cancelled {
        "Cancelled; re-run to resume from the first pending chunk"
    } else {
        "Output generated"
    }
}

fn run_forward(
    args: &Args,
    multi: &MultiProgress,
    config: EnrichConfig,
    file: &Path,
    column: &str,
    merge: Option<&Path>,
) -> Result<()> {
    let dataset = Dataset::load(file)?;
    let engine = EnrichEngine::new(config, build_geocoder(args)?);

    let bar = progress::pipeline_bar(multi, "Retrieving latitude and longitude");
    let summary = match engine.forward(&dataset, column, Some(progress::bar_callback(&bar))) {
        Ok(summary) => summary,
        Err(e) => {
            progress::fail(&bar, "Error retrieving latitude and longitude.");
            return Err(e);
        }
    };
    let message = forward_completion_message(&summary);
    if summary.cancelled {
        bar.abandon_with_message(message);
    } else {
        bar.finish_with_message(message);
    }

    log::info!(
        "{} chunks processed, {} skipped, {} lookups",
        summary.processed_chunks(),
        summary.skipped_chunks(),
        summary.lookups
    );
    if !summary.failures.is_empty() {
        log::warn!(
            "{} rows could not be geocoded and were set to (0, 0)",
            summary.failures.len()
        );
    }

    if let Some(output) = merge {
        if summary.cancelled {
            log::warn!("Run was cancelled; not merging checkpoints");
        } else {
            let merged = engine.merge_checkpoints(output)?;
            println!(
                "Merged {} rows into {}",
                merged.rows,
                merged.output.display()
            );
        }
    }

    println!("{}", message);
    Ok(())
}

fn run_reverse(args: &Args, multi: &MultiProgress, config: EnrichConfig, file: &Path) -> Result<()> {
    let engine = EnrichEngine::new(config, build_geocoder(args)?);

    let bar = progress::pipeline_bar(multi, "Retrieving road names");
    let summary = match engine.reverse_file(file, Some(progress::bar_callback(&bar))) {
        Ok(summary) => summary,
        Err(e) => {
            progress::fail(&bar, "Error retrieving road names.");
            return Err(e.context("Error processing the file"));
        }
    };
    bar.finish_with_message("Done");

    if !summary.failures.is_empty() {
        log::warn!(
            "{} rows could not be reverse geocoded and were set to Unknown",
            summary.failures.len()
        );
    }

    println!("Road names retrieved successfully from {}!", file.display());
    Ok(())
}
