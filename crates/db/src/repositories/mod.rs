//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod batch_repo;
pub mod blob_repo;
pub mod experiment_repo;
pub mod machine_repo;
pub mod project_repo;

pub use batch_repo::BatchRepo;
pub use blob_repo::BlobRepo;
pub use experiment_repo::ExperimentRepo;
pub use machine_repo::MachineRepo;
pub use project_repo::ProjectRepo;
