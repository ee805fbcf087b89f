use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What a progress event counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUnit {
    /// Forward pipeline: one event per chunk, processed or skipped
    Chunk,
    /// Reverse pipeline: one event per row
    Row,
}

/// A progress event emitted after each unit of work
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub unit: ProgressUnit,
    /// Units finished so far, including this one
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// `completed * 100 / total`, in 0..=100
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64) * 100.0 / (self.total as f64)
    }
}

/// Progress callback type. Receives one [`Progress`] per finished unit.
pub type ProgressCallback = Box<dyn Fn(&Progress) + Send>;

/// Wraps an optional callback so the pipelines don't care whether one was given
pub(crate) struct ProgressReporter<'a> {
    callback: &'a Option<ProgressCallback>,
    unit: ProgressUnit,
    total: usize,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(callback: &'a Option<ProgressCallback>, unit: ProgressUnit, total: usize) -> Self {
        Self {
            callback,
            unit,
            total,
        }
    }

    pub(crate) fn report(&self, completed: usize) {
        if let Some(ref cb) = self.callback {
            cb(&Progress {
                unit: self.unit,
                completed,
                total: self.total,
            });
        }
    }
}

/// Cooperative cancellation flag.
///
/// Clone it, hand a copy to another thread, call [`CancellationToken::cancel`].
/// The forward pipeline checks it between chunks, the reverse pipeline
/// between rows.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag so the engine can be reused for another run
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
