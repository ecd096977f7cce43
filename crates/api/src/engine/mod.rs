//! Job dispatch engine.
//!
//! - [`dispatcher`]: single dispatch (validate, probe, persist, attach
//!   files, submit, compensate on failure).
//! - [`attachments`]: writing uploaded files under the replacement rule.
//! - [`retry`]: randomized retry loops for batch items.
//! - [`batch`]: batch fan-out and lazily derived batch progress.

pub mod attachments;
pub mod batch;
pub mod dispatcher;
pub mod retry;

pub use attachments::Upload;
pub use batch::{BatchCoordinator, BatchView};
pub use dispatcher::{JobDispatcher, JobHandle};
pub use retry::RetryOrchestrator;
