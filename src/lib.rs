//! Mesh registry: service discovery and dependency resolution for MCP agents.
//!
//! Agents register the tools they expose together with the capabilities
//! those tools depend on. The registry binds each dependency to a healthy
//! provider, discovers tools for LLM-driven functions, and keeps bindings
//! current as agents come and go.
//!
//! # Architecture
//!
//! The registry follows hexagonal architecture principles:
//!
//! - **Domain**: Pure matching and lifecycle logic with no infrastructure
//!   dependencies
//! - **Ports**: The [`registry::ports::RegistryStore`] trait
//! - **Adapters**: In-memory and Postgres stores
//!
//! # Modules
//!
//! - [`registry`]: Domain, ports, adapters and services
//! - [`api`]: axum HTTP transport
//! - [`config`]: Flag and environment configuration
//! - [`telemetry`]: Logging setup

pub mod api;
pub mod config;
pub mod registry;
pub mod telemetry;
