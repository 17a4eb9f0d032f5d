//! Shared world state for registry BDD scenarios.

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mesh_registry::registry::{
    adapters::memory::InMemoryRegistryStore,
    domain::{AgentId, SelectionPolicy},
    services::{AgentMetadata, HealthMonitor, HealthSettings, RegistryService},
};
use mockable::Clock;
use rstest::fixture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Clock moved forward by `When N seconds pass` steps.
#[derive(Debug)]
pub struct ScenarioClock {
    now: Mutex<DateTime<Utc>>,
}

impl ScenarioClock {
    fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .unwrap_or_default();
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, seconds: u32) {
        if let Ok(mut now) = self.now.lock() {
            *now += Duration::seconds(i64::from(seconds));
        }
    }
}

impl Clock for ScenarioClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map_or_else(|poisoned| *poisoned.into_inner(), |now| *now)
    }
}

/// Registry service type used by the BDD world.
pub type ScenarioRegistry = RegistryService<InMemoryRegistryStore, ScenarioClock>;

/// Scenario world for registry behaviour tests.
pub struct RegistryWorld {
    /// Store shared by the services.
    pub store: Arc<InMemoryRegistryStore>,
    /// Clock shared by the services.
    pub clock: Arc<ScenarioClock>,
    /// Registry service under test.
    pub registry: ScenarioRegistry,
    /// Health monitor under test.
    pub health: HealthMonitor<InMemoryRegistryStore, ScenarioClock>,
    /// Metadata each agent registered with, for full heartbeats.
    pub declared: HashMap<String, AgentMetadata>,
}

impl RegistryWorld {
    /// Creates a world with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryRegistryStore::new());
        let clock = Arc::new(ScenarioClock::new());
        let policy = SelectionPolicy::default();
        Self {
            registry: RegistryService::new(Arc::clone(&store), Arc::clone(&clock), policy),
            health: HealthMonitor::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                policy,
                HealthSettings::default(),
            ),
            store,
            clock,
            declared: HashMap::new(),
        }
    }
}

impl Default for RegistryWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> RegistryWorld {
    RegistryWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Parses an agent identifier from step text.
pub fn agent_id(raw: &str) -> Result<AgentId, eyre::Report> {
    AgentId::new(raw).map_err(|err| eyre::eyre!("invalid agent id '{raw}': {err}"))
}

/// Splits a comma-separated tag list from step text.
pub fn tag_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}
