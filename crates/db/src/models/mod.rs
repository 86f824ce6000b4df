//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the table row
//! and, where rows are inserted directly, a create DTO.

pub mod dispatch_record;
pub mod experiment;
pub mod job_unit;
pub mod status;
pub mod token;
