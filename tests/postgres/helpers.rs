//! Shared test helpers for `PostgreSQL` integration tests.
//!
//! Each test runs in its own throwaway database created on the server named
//! by `MESH_REGISTRY_TEST_DATABASE_URL`. When the variable is unset the
//! fixture yields `None` and tests return early.

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use mesh_registry::registry::{
    adapters::postgres::PostgresRegistryStore,
    domain::{AgentId, DependencySpec, ResolutionStatus, SelectionPolicy, ToolDeclaration},
    ports::RegistryStore,
    services::{AgentMetadata, AgentRegistration, HealthMonitor, HealthSettings, RegistryService},
};
use mockable::Clock;
use rstest::fixture;
use std::sync::{Arc, Mutex};

/// Environment variable naming an admin connection URL.
pub const DATABASE_URL_ENV: &str = "MESH_REGISTRY_TEST_DATABASE_URL";

/// Clock advanced explicitly by tests.
#[derive(Debug)]
pub struct SteppedClock {
    now: Mutex<DateTime<Utc>>,
}

impl SteppedClock {
    fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid start instant");
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance_secs(&self, seconds: i64) {
        *self.now.lock().expect("clock lock") += Duration::seconds(seconds);
    }
}

impl Clock for SteppedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

/// Drops the throwaway database when the test ends.
struct TemporaryDatabase {
    admin_url: String,
    name: String,
}

impl TemporaryDatabase {
    fn create(admin_url: &str) -> Self {
        let name = format!("mesh_registry_test_{}", uuid::Uuid::new_v4().simple());
        let mut connection = PgConnection::establish(admin_url).expect("admin connection");
        connection
            .batch_execute(&format!("CREATE DATABASE {name}"))
            .expect("create test database");
        Self {
            admin_url: admin_url.to_owned(),
            name,
        }
    }

    fn url(&self) -> String {
        let (base, _) = self
            .admin_url
            .rsplit_once('/')
            .expect("database URL has a path");
        format!("{base}/{}", self.name)
    }
}

impl Drop for TemporaryDatabase {
    fn drop(&mut self) {
        if let Ok(mut connection) = PgConnection::establish(&self.admin_url) {
            let _outcome = connection.batch_execute(&format!(
                "DROP DATABASE IF EXISTS {} WITH (FORCE)",
                self.name
            ));
        }
    }
}

/// Registry service and health monitor over a fresh `PostgreSQL` database.
pub struct PgMesh {
    pub store: Arc<PostgresRegistryStore>,
    pub clock: Arc<SteppedClock>,
    pub registry: RegistryService<PostgresRegistryStore, SteppedClock>,
    pub health: HealthMonitor<PostgresRegistryStore, SteppedClock>,
    _database: TemporaryDatabase,
}

impl PgMesh {
    /// Registers an agent, panicking on failure.
    pub async fn register(&self, agent_id: &str, metadata: AgentMetadata) {
        self.registry
            .register(AgentRegistration::new(agent_id, metadata))
            .await
            .expect("registration should succeed");
    }

    /// Returns `(status, provider agent id)` of one dependency row.
    pub async fn dependency(
        &self,
        consumer: &str,
        function_name: &str,
        dep_index: u32,
    ) -> (ResolutionStatus, Option<String>) {
        let set = self
            .store
            .resolutions_of(&agent(consumer))
            .await
            .expect("resolutions load");
        let row = set
            .dependencies
            .iter()
            .find(|row| row.key() == (function_name, dep_index))
            .expect("dependency row exists");
        (
            row.outcome.status(),
            row.outcome
                .provider()
                .map(|provider| provider.agent_id.as_str().to_owned()),
        )
    }
}

/// Connects to a fresh database, or yields `None` without a server.
#[fixture]
pub async fn pg_mesh() -> Option<PgMesh> {
    let admin_url = std::env::var(DATABASE_URL_ENV).ok()?;
    let database = tokio::task::spawn_blocking(move || TemporaryDatabase::create(&admin_url))
        .await
        .expect("database setup task");
    let store = Arc::new(
        PostgresRegistryStore::connect(&database.url(), 4)
            .await
            .expect("store connects"),
    );
    store.apply_schema().await.expect("schema applies");

    let clock = Arc::new(SteppedClock::new());
    let policy = SelectionPolicy::default();
    Some(PgMesh {
        registry: RegistryService::new(Arc::clone(&store), Arc::clone(&clock), policy),
        health: HealthMonitor::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            policy,
            HealthSettings::default(),
        ),
        store,
        clock,
        _database: database,
    })
}

/// Parses a test agent identifier.
pub fn agent(raw: &str) -> AgentId {
    AgentId::new(raw).expect("valid agent id")
}

/// Metadata of an agent exposing one tool for `capability`.
pub fn provider(port: u16, capability: &str, tags: &[&str]) -> AgentMetadata {
    AgentMetadata::new().with_http("10.0.0.1", port).with_tool(
        ToolDeclaration::new(format!("{capability}_tool"))
            .with_capability(capability)
            .with_tags(tags.iter().copied()),
    )
}

/// Metadata of an agent with one function depending on `capability`.
pub fn consumer(port: u16, function_name: &str, capability: &str) -> AgentMetadata {
    AgentMetadata::new().with_http("10.0.0.2", port).with_tool(
        ToolDeclaration::new(function_name).with_dependency(DependencySpec::new(capability)),
    )
}
