//! In-memory adapter used by tests and store-less deployments.

mod store;

pub use store::InMemoryRegistryStore;
