//! Pure domain logic for the experiment coordinator.
//!
//! Nothing in this crate performs I/O: option-schema validation, batch
//! progress derivation, the retry window policy, lifecycle topics and the
//! attachment replacement rule are all plain functions over plain data so
//! the store, fleet and API crates can share them.

pub mod attachments;
pub mod batch_progress;
pub mod error;
pub mod lifecycle;
pub mod options;
pub mod retry;
pub mod status;
pub mod types;
