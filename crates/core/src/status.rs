//! Status values shared by experiments and batches.
//!
//! Experiment statuses are strings because workers may report terminal
//! states of their own; only the values below carry meaning here.

/// Experiment accepted by a worker and not yet reported finished.
pub const EXPERIMENT_RUNNING: &str = "running";

/// Experiment finished successfully (counts toward batch progress once a
/// fitness score is recorded).
pub const EXPERIMENT_SUCCESS: &str = "success";

/// Experiment finished with an error.
pub const EXPERIMENT_FAILURE: &str = "failure";

/// Batch created and still waiting on at least one experiment.
pub const BATCH_RUNNING: &str = "running";

/// Every declared experiment of the batch finished successfully.
pub const BATCH_SUCCESS: &str = "success";
