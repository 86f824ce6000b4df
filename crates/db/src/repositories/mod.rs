//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod dispatch_record_repo;
pub mod experiment_repo;
pub mod job_unit_repo;
pub mod token_repo;

pub use dispatch_record_repo::DispatchRecordRepo;
pub use experiment_repo::ExperimentRepo;
pub use job_unit_repo::JobUnitRepo;
pub use token_repo::TokenRepo;
