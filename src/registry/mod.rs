//! Service registry for the mesh.
//!
//! Agents register the tools they expose together with the dependencies
//! those tools need. The registry matches every dependency against the
//! capabilities of healthy agents, keeps the bindings current as agents come
//! and go, and tells agents through heartbeats when their view of the mesh
//! is out of date. The module follows hexagonal architecture:
//!
//! - Domain types and matching rules in [`domain`]
//! - The storage contract in [`ports`]
//! - In-memory and `PostgreSQL` stores in [`adapters`]
//! - Registration, resolution and health services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
