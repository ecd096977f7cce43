//! Batch progress derivation.
//!
//! Progress is never stored as a source of truth: it is recomputed from the
//! batch's recorded experiments whenever the batch is read, and completion
//! is detected at that moment.

use serde::Serialize;

use crate::status::EXPERIMENT_SUCCESS;

/// Derived progress of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchProgress {
    /// Experiments counted as finished (capped at `declared`).
    pub finished: usize,
    /// Number of experiments the batch was created with.
    pub declared: usize,
    /// `finished / declared` as a percentage in `0.0..=100.0`.
    pub percent: f64,
}

impl BatchProgress {
    pub fn is_complete(&self) -> bool {
        self.finished >= self.declared
    }
}

/// Whether an experiment counts toward its batch's progress.
///
/// It must have succeeded *and* carry a best fitness score.
pub fn counts_as_finished(status: &str, best_fitness_score: Option<f64>) -> bool {
    status == EXPERIMENT_SUCCESS && best_fitness_score.is_some()
}

/// Compute batch progress from the declared total and the finished count.
///
/// A batch declared with zero experiments is complete.
pub fn compute_progress(declared: usize, finished: usize) -> BatchProgress {
    let finished = finished.min(declared);
    let percent = if declared == 0 {
        100.0
    } else {
        (finished as f64 / declared as f64 * 100.0).clamp(0.0, 100.0)
    };
    BatchProgress {
        finished,
        declared,
        percent,
    }
}
