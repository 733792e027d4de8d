pub mod driver;
pub mod sampler;

pub use driver::SegmentAnalysisDriver;
pub use sampler::SegmentSampler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ledger::Ledger;

/// Shared stop flag, polled by the driver between windows.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Half-open slice `[start, end)` of the recording, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub start: u64,
    pub end: f64,
}

impl Window {
    /// Window of `length` seconds at `start`, cut short at the recording end.
    pub fn new(start: u64, length: u32, total_duration: f64) -> Self {
        let end = ((start + u64::from(length)) as f64).min(total_duration);
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start as f64
    }
}

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Every window was analysed in this run.
    Completed,
    /// The ledger was already complete; nothing was sampled.
    AlreadyComplete,
    /// Stopped on request; a later run continues at `resume_at`.
    Interrupted { resume_at: u64 },
    /// The recognizer could not answer for the window at `resume_at`.
    Incomplete { resume_at: u64 },
}

impl AnalysisOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            AnalysisOutcome::Completed | AnalysisOutcome::AlreadyComplete
        )
    }

    pub fn resume_at(&self) -> Option<u64> {
        match self {
            AnalysisOutcome::Interrupted { resume_at }
            | AnalysisOutcome::Incomplete { resume_at } => Some(*resume_at),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub outcome: AnalysisOutcome,
    /// Probed duration of the input, in seconds.
    pub total_duration: f64,
    /// The ledger as it stands on disk after the run.
    pub ledger: Ledger,
}
