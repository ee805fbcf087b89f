//! Terminal progress for the pipelines.
//!
//! Log output goes through `indicatif-log-bridge` so that `log::warn!` lines
//! from failed lookups print above the bar instead of tearing it.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use roadgeo_core::{Progress, ProgressCallback};

/// Initializes `env_logger` wrapped for progress-bar friendly output.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `verbose`.
pub fn init_logger(verbose: bool) -> MultiProgress {
    let multi = MultiProgress::new();

    let default_level = if verbose { "debug" } else { "info" };
    let logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Ignore error if a logger was already set

    log::set_max_level(level);

    multi
}

/// A bar whose length follows the totals reported by the pipeline
pub fn pipeline_bar(multi: &MultiProgress, message: &str) -> ProgressBar {
    let bar = multi.add(ProgressBar::new(0));
    bar.set_style(
        ProgressStyle::with_template("{msg} {wide_bar:.cyan/dim} {pos}/{len} {percent}% [{eta}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    bar.set_message(message.to_string());
    bar
}

/// Drives `bar` from pipeline progress events
pub fn bar_callback(bar: &ProgressBar) -> ProgressCallback {
    let bar = bar.clone();
    Box::new(move |p: &Progress| {
        bar.set_length(p.total as u64);
        bar.set_position(p.completed as u64);
    })
}

/// Reset the bar to zero and leave the error message in place
pub fn fail(bar: &ProgressBar, message: &str) {
    bar.set_position(0);
    bar.abandon_with_message(message.to_string());
}
