//! Port contracts for registry persistence.

mod store;

#[cfg(test)]
pub use store::MockRegistryStore;
pub use store::{
    RegistrationCommit, RegistryStore, RegistryStoreError, RegistryStoreResult, StatusGuard,
    TransitionOutcome,
};
