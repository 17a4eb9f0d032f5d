//! Store adapters for the registry.

pub mod memory;
pub mod postgres;
