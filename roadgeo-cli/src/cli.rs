use clap::{Parser, Subcommand};
use roadgeo_core::{DEFAULT_BASE_URL, DEFAULT_CHUNK_SIZE, DEFAULT_LOCALITY_SUFFIX, DEFAULT_REVERSE_OUTPUT};
use std::path::PathBuf;

/// Add coordinates to road names, or road names to coordinates, in CSV files
#[derive(Parser, Debug)]
#[command(name = "roadgeo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Geocodes road names in CSV files via Nominatim, with resumable checkpoints", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Nominatim server to query
    #[arg(long = "nominatim-url", global = true, default_value = DEFAULT_BASE_URL)]
    pub nominatim_url: String,

    /// User-Agent sent to Nominatim (defaults to roadgeo/<version>)
    #[arg(long = "user-agent", global = true)]
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout-secs", global = true, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Minimum delay between two requests, in milliseconds
    #[arg(long = "min-interval-ms", global = true, default_value_t = 1000)]
    pub min_interval_ms: u64,

    /// Reuse results for repeated road names / coordinates within a run
    #[arg(long = "cache", global = true)]
    pub cache: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the columns of a CSV file
    Columns {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Look up latitude/longitude for a road-name column, one checkpoint file per chunk
    Forward {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Column holding the road names
        #[arg(short = 'c', long = "column")]
        column: String,

        /// Directory for roads_lat_long_<start>.csv checkpoints
        #[arg(short = 'd', long = "checkpoint-dir", default_value = ".")]
        checkpoint_dir: PathBuf,

        /// Rows per chunk
        #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Text appended to every road name before lookup
        #[arg(long = "suffix", default_value = DEFAULT_LOCALITY_SUFFIX)]
        suffix: String,

        /// Stop at the first failed lookup instead of writing (0, 0)
        #[arg(long = "abort-on-failure")]
        abort_on_failure: bool,

        /// After a complete run, merge all checkpoints into this file
        #[arg(long = "merge", value_name = "OUTPUT")]
        merge: Option<PathBuf>,
    },

    /// Look up the road name for latitude/longitude columns
    Reverse {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output file
        #[arg(short = 'o', long = "output", default_value = DEFAULT_REVERSE_OUTPUT)]
        output: PathBuf,

        /// Write "Unknown" for failed lookups instead of stopping
        #[arg(long = "tolerate-failures")]
        tolerate_failures: bool,
    },

    /// Show which chunks of FILE already have a checkpoint
    Status {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short = 'd', long = "checkpoint-dir", default_value = ".")]
        checkpoint_dir: PathBuf,

        #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Merge roads_lat_long_<start>.csv checkpoints into one file
    Merge {
        #[arg(short = 'd', long = "checkpoint-dir", default_value = ".")]
        checkpoint_dir: PathBuf,

        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },
}

/// Parses command-line arguments
pub fn parse_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_defaults() {
        let args = Args::try_parse_from(["roadgeo", "forward", "roads.csv", "--column", "road"]).unwrap();
        match args.command {
            Command::Forward {
                column,
                chunk_size,
                suffix,
                abort_on_failure,
                merge,
                ..
            } => {
                assert_eq!(column, "road");
                assert_eq!(chunk_size, 100);
                assert_eq!(suffix, ", Singapore");
                assert!(!abort_on_failure);
                assert!(merge.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(args.min_interval_ms, 1000);
        assert!(!args.cache);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "roadgeo",
            "reverse",
            "points.csv",
            "--tolerate-failures",
            "--cache",
            "-v",
        ])
        .unwrap();
        assert!(args.verbose);
        assert!(args.cache);
        match args.command {
            Command::Reverse {
                output,
                tolerate_failures,
                ..
            } => {
                assert_eq!(output, PathBuf::from("output_with_road_names.csv"));
                assert!(tolerate_failures);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_forward_requires_column() {
        assert!(Args::try_parse_from(["roadgeo", "forward", "roads.csv"]).is_err());
    }
}
