use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// No registered worker answered a capacity query affirmatively.
    #[error("No machine capacity available")]
    NoCapacityAvailable,

    /// The worker chosen by the prober refused the job submission.
    #[error("Experiment failed to run: {0}")]
    DispatchRejected(String),
}

impl CoreError {
    /// Whether a retry of the same request may succeed later.
    ///
    /// Capacity shortages and worker rejections depend on fleet state;
    /// validation and lookup failures do not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::NoCapacityAvailable | CoreError::DispatchRejected(_)
        )
    }
}
