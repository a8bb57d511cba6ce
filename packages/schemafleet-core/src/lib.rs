#![forbid(unsafe_code)]

//! # schemafleet core
//!
//! Fleet migration orchestration. Resolves a target set of tenants,
//! runs a single tenant synchronously or fans a batch out over a
//! worker pool, monitors progress, and compensates partial failures by
//! rolling back the tenants that had already succeeded.

pub mod batch;
pub mod compensate;
pub mod connector;
pub mod executor;
pub mod fleet;
pub mod monitor;
pub mod selector;
pub mod status;
