//! `PostgreSQL` adapter for registry persistence.

mod models;
mod schema;
mod store;

pub use store::{PostgresRegistryStore, RegistryPgPool};
