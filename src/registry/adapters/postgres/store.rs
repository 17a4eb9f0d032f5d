//! `PostgreSQL` registry store implementation.

use super::{
    models::{
        AgentRow, CapabilityRow, DependencyResolutionRow, EventRow, LlmProviderResolutionRow,
        LlmToolResolutionRow,
    },
    schema::{
        agents, capabilities, dependency_resolutions, llm_provider_resolutions,
        llm_tool_resolutions, registry_events,
    },
};
use crate::registry::{
    domain::{
        Agent, AgentId, AgentProfile, AgentStatus, AgentType, Capability, CapabilityId,
        DependencyResolution, DependencySpec, EventId, FilterMode, LlmProviderResolution,
        LlmToolResolution, Namespace, PersistedAgentData, PersistedCapabilityData,
        PersistedEventData, ProviderCandidate, RegistryEvent, RegistryEventType, ResolutionId,
        ResolutionOutcome, ResolutionSet, ResolutionStatus, Runtime, StoredProviderColumns,
        ToolDeclaration, VersionConstraint,
    },
    ports::{
        RegistrationCommit, RegistryStore, RegistryStoreError, RegistryStoreResult, StatusGuard,
        TransitionOutcome,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;
use std::collections::{BTreeSet, HashMap, HashSet};

/// `PostgreSQL` connection pool type used by the registry store.
pub type RegistryPgPool = Pool<ConnectionManager<PgConnection>>;

const SCHEMA_SQL: &str =
    include_str!("../../../../migrations/2026-10-01-000000_create_registry_tables/up.sql");

const AVAILABLE: &str = ResolutionStatus::Available.as_str();
const UNAVAILABLE: &str = ResolutionStatus::Unavailable.as_str();
const UNHEALTHY: &str = AgentStatus::Unhealthy.as_str();

/// `PostgreSQL`-backed registry store.
#[derive(Debug, Clone)]
pub struct PostgresRegistryStore {
    pool: RegistryPgPool,
}

impl PostgresRegistryStore {
    /// Creates a store from an existing connection pool.
    #[must_use]
    pub const fn new(pool: RegistryPgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool of at most `max_connections` connections to
    /// `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryStoreError::Persistence`] when the pool cannot be
    /// established.
    pub async fn connect(database_url: &str, max_connections: u32) -> RegistryStoreResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = tokio::task::spawn_blocking(move || {
            Pool::builder().max_size(max_connections).build(manager)
        })
        .await
        .map_err(RegistryStoreError::persistence)?
        .map_err(RegistryStoreError::persistence)?;
        Ok(Self::new(pool))
    }

    /// Returns the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &RegistryPgPool {
        &self.pool
    }

    /// Creates the registry tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryStoreError::Persistence`] when the DDL fails.
    pub async fn apply_schema(&self) -> RegistryStoreResult<()> {
        self.run_blocking(|connection| {
            connection.batch_execute(SCHEMA_SQL)?;
            Ok(())
        })
        .await
    }

    async fn run_blocking<F, T>(&self, f: F) -> RegistryStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> RegistryStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(RegistryStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(RegistryStoreError::persistence)?
    }

    async fn run_transaction<F, T>(&self, f: F) -> RegistryStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> RegistryStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run_blocking(move |connection| {
            connection.transaction::<T, RegistryStoreError, _>(f)
        })
        .await
    }
}

impl From<DieselError> for RegistryStoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation | DatabaseErrorKind::ForeignKeyViolation,
                _,
            ) => Self::conflict(err),
            _ => Self::persistence(err),
        }
    }
}

#[async_trait]
impl RegistryStore for PostgresRegistryStore {
    async fn ping(&self) -> RegistryStoreResult<()> {
        self.run_blocking(|connection| {
            diesel::sql_query("SELECT 1").execute(connection)?;
            Ok(())
        })
        .await
    }

    async fn find_agent(&self, agent_id: &AgentId) -> RegistryStoreResult<Option<Agent>> {
        let key = agent_id.as_str().to_owned();
        self.run_blocking(move |connection| load_agent(connection, &key))
            .await
    }

    async fn list_agents(&self) -> RegistryStoreResult<Vec<Agent>> {
        self.run_blocking(|connection| {
            let rows = agents::table
                .select(AgentRow::as_select())
                .order(agents::agent_id.asc())
                .load::<AgentRow>(connection)?;
            rows.into_iter().map(row_to_agent).collect()
        })
        .await
    }

    async fn stale_agents(
        &self,
        cutoff: DateTime<Utc>,
        statuses: &[AgentStatus],
    ) -> RegistryStoreResult<Vec<Agent>> {
        let status_values: Vec<&'static str> =
            statuses.iter().map(|status| status.as_str()).collect();
        self.run_blocking(move |connection| {
            let rows = agents::table
                .filter(agents::updated_at.lt(cutoff))
                .filter(agents::status.eq_any(status_values))
                .select(AgentRow::as_select())
                .order(agents::agent_id.asc())
                .load::<AgentRow>(connection)?;
            rows.into_iter().map(row_to_agent).collect()
        })
        .await
    }

    async fn capabilities_of(&self, agent_id: &AgentId) -> RegistryStoreResult<Vec<Capability>> {
        let key = agent_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = capabilities::table
                .filter(capabilities::agent_id.eq(&key))
                .select(CapabilityRow::as_select())
                .order(capabilities::position.asc())
                .load::<CapabilityRow>(connection)?;
            rows.into_iter().map(row_to_capability).collect()
        })
        .await
    }

    async fn provider_candidates(&self) -> RegistryStoreResult<Vec<ProviderCandidate>> {
        self.run_blocking(|connection| {
            let agent_rows = agents::table
                .select(AgentRow::as_select())
                .order(agents::agent_id.asc())
                .load::<AgentRow>(connection)?;
            let capability_rows = capabilities::table
                .select(CapabilityRow::as_select())
                .order((capabilities::agent_id.asc(), capabilities::position.asc()))
                .load::<CapabilityRow>(connection)?;
            let loads = bound_consumer_counts(connection)?;

            let mut agents_by_id = HashMap::new();
            let mut ordered_ids = Vec::new();
            for row in agent_rows {
                let key = row.agent_id.clone();
                agents_by_id.insert(key.clone(), row_to_agent(row)?);
                ordered_ids.push(key);
            }

            let mut by_agent: HashMap<String, Vec<CapabilityRow>> = HashMap::new();
            for row in capability_rows {
                by_agent.entry(row.agent_id.clone()).or_default().push(row);
            }

            let mut candidates = Vec::new();
            for key in ordered_ids {
                let (Some(agent), Some(rows)) = (agents_by_id.get(&key), by_agent.remove(&key))
                else {
                    continue;
                };
                for row in rows {
                    let load = loads
                        .get(&(key.clone(), row.function_name.clone()))
                        .copied()
                        .unwrap_or_default();
                    candidates.push(ProviderCandidate::from_agent(
                        agent,
                        row_to_capability(row)?,
                        load,
                    ));
                }
            }
            Ok(candidates)
        })
        .await
    }

    async fn resolutions_of(&self, agent_id: &AgentId) -> RegistryStoreResult<ResolutionSet> {
        let key = agent_id.as_str().to_owned();
        self.run_blocking(move |connection| load_resolutions(connection, &key))
            .await
    }

    async fn commit_registration(
        &self,
        commit: &RegistrationCommit,
    ) -> RegistryStoreResult<Vec<AgentId>> {
        let agent_row = agent_to_row(&commit.agent)?;
        let agent_key = agent_row.agent_id.clone();
        let capability_rows = commit
            .capabilities
            .desired
            .iter()
            .enumerate()
            .map(|(position, capability)| capability_to_row(&agent_key, position, capability))
            .collect::<RegistryStoreResult<Vec<_>>>()?;
        let deleted: Vec<uuid::Uuid> = commit
            .capabilities
            .deleted
            .iter()
            .map(|id| id.into_inner())
            .collect();
        let updated_functions: Vec<String> = commit
            .capabilities
            .updated_functions()
            .map(str::to_owned)
            .collect();
        let resolution_rows = ResolutionRows::from_set(&commit.resolutions)?;
        let event_rows: Vec<EventRow> = commit.events.iter().map(event_to_row).collect();

        self.run_transaction(move |connection| {
            upsert_agent(connection, &agent_row)?;

            let mut removed_functions: Vec<String> = if deleted.is_empty() {
                Vec::new()
            } else {
                let names = capabilities::table
                    .filter(capabilities::agent_id.eq(&agent_key))
                    .filter(capabilities::id.eq_any(&deleted))
                    .select(capabilities::function_name)
                    .load::<String>(connection)?;
                diesel::delete(
                    capabilities::table
                        .filter(capabilities::agent_id.eq(&agent_key))
                        .filter(capabilities::id.eq_any(&deleted)),
                )
                .execute(connection)?;
                names
            };
            removed_functions.extend(updated_functions);
            // Detach before writing the agent's own rows, which may bind to
            // its updated tools.
            let detached = if removed_functions.is_empty() {
                Vec::new()
            } else {
                detach_provider(connection, &agent_key, Some(&removed_functions))?
            };
            upsert_capabilities(connection, &capability_rows)?;
            write_resolutions(connection, &agent_key, &resolution_rows)?;
            insert_events(connection, &event_rows)?;
            Ok(detached)
        })
        .await
    }

    async fn replace_resolutions(
        &self,
        agent_id: &AgentId,
        resolutions: &ResolutionSet,
    ) -> RegistryStoreResult<()> {
        let owner = agent_id.clone();
        let rows = ResolutionRows::from_set(resolutions)?;
        self.run_transaction(move |connection| {
            let exists = agents::table
                .filter(agents::agent_id.eq(owner.as_str()))
                .count()
                .get_result::<i64>(connection)?;
            if exists == 0 {
                return Err(RegistryStoreError::AgentNotFound(owner));
            }
            write_resolutions(connection, owner.as_str(), &rows)?;
            refresh_counts(connection, owner.as_str())
        })
        .await
    }

    async fn update_agent(
        &self,
        agent: &Agent,
        events: &[RegistryEvent],
    ) -> RegistryStoreResult<()> {
        let owner = agent.id().clone();
        let status = agent.status().as_str();
        let updated_at = agent.updated_at();
        let event_rows: Vec<EventRow> = events.iter().map(event_to_row).collect();
        self.run_transaction(move |connection| {
            let updated = diesel::update(agents::table.filter(agents::agent_id.eq(owner.as_str())))
                .set((agents::status.eq(status), agents::updated_at.eq(updated_at)))
                .execute(connection)?;
            if updated == 0 {
                return Err(RegistryStoreError::AgentNotFound(owner));
            }
            insert_events(connection, &event_rows)
        })
        .await
    }

    async fn mark_unhealthy(
        &self,
        agent_id: &AgentId,
        guard: Option<StatusGuard>,
        event: Option<RegistryEvent>,
    ) -> RegistryStoreResult<TransitionOutcome> {
        let key = agent_id.as_str().to_owned();
        let event_rows: Vec<EventRow> = event.iter().map(event_to_row).collect();
        self.run_transaction(move |connection| {
            let target = agents::table
                .filter(agents::agent_id.eq(&key))
                .filter(agents::status.ne(UNHEALTHY));
            let updated = match guard {
                Some(expected) => diesel::update(
                    target
                        .filter(agents::updated_at.eq(expected.updated_at))
                        .filter(agents::status.eq(expected.status.as_str())),
                )
                .set(agents::status.eq(UNHEALTHY))
                .execute(connection)?,
                None => diesel::update(target)
                    .set(agents::status.eq(UNHEALTHY))
                    .execute(connection)?,
            };
            if updated == 0 {
                return Ok(TransitionOutcome::Skipped);
            }

            insert_events(connection, &event_rows)?;
            let affected_consumers = detach_provider(connection, &key, None)?;
            Ok(TransitionOutcome::Applied { affected_consumers })
        })
        .await
    }

    async fn remove_agent(
        &self,
        agent_id: &AgentId,
        guard: Option<StatusGuard>,
    ) -> RegistryStoreResult<TransitionOutcome> {
        let key = agent_id.as_str().to_owned();
        self.run_transaction(move |connection| {
            let current = agents::table
                .filter(agents::agent_id.eq(&key))
                .select(AgentRow::as_select())
                .for_update()
                .first::<AgentRow>(connection)
                .optional()?;
            let Some(row) = current else {
                return Ok(TransitionOutcome::Skipped);
            };
            let guard_holds = guard.is_none_or(|expected| {
                row.updated_at == expected.updated_at && row.status == expected.status.as_str()
            });
            if !guard_holds {
                return Ok(TransitionOutcome::Skipped);
            }

            let affected_consumers = detach_provider(connection, &key, None)?;
            diesel::delete(agents::table.filter(agents::agent_id.eq(&key))).execute(connection)?;
            Ok(TransitionOutcome::Applied { affected_consumers })
        })
        .await
    }

    async fn consumers_awaiting(
        &self,
        capabilities: &[String],
        exclude: &AgentId,
    ) -> RegistryStoreResult<Vec<AgentId>> {
        let names = capabilities.to_vec();
        let excluded_key = exclude.as_str().to_owned();
        self.run_blocking(move |connection| {
            let mut consumers: BTreeSet<String> = dependency_resolutions::table
                .filter(dependency_resolutions::capability_required.eq_any(&names))
                .filter(dependency_resolutions::status.ne(AVAILABLE))
                .filter(dependency_resolutions::consumer_agent_id.ne(&excluded_key))
                .select(dependency_resolutions::consumer_agent_id)
                .distinct()
                .load::<String>(connection)?
                .into_iter()
                .collect();
            consumers.extend(
                llm_provider_resolutions::table
                    .filter(llm_provider_resolutions::required_capability.eq_any(&names))
                    .filter(llm_provider_resolutions::status.ne(AVAILABLE))
                    .filter(llm_provider_resolutions::consumer_agent_id.ne(&excluded_key))
                    .select(llm_provider_resolutions::consumer_agent_id)
                    .distinct()
                    .load::<String>(connection)?,
            );
            consumers.into_iter().map(parse_agent_id).collect()
        })
        .await
    }

    async fn has_topology_events_since(
        &self,
        since: DateTime<Utc>,
        exclude: &AgentId,
    ) -> RegistryStoreResult<bool> {
        let excluded_key = exclude.as_str().to_owned();
        let topology_types: Vec<&'static str> = RegistryEventType::TOPOLOGY_CHANGES
            .iter()
            .map(|event_type| event_type.as_str())
            .collect();
        self.run_blocking(move |connection| {
            let count = registry_events::table
                .filter(registry_events::timestamp.gt(since))
                .filter(registry_events::agent_id.ne(&excluded_key))
                .filter(registry_events::event_type.eq_any(topology_types))
                .count()
                .get_result::<i64>(connection)?;
            Ok(count > 0)
        })
        .await
    }

    async fn events_for(&self, agent_id: &AgentId) -> RegistryStoreResult<Vec<RegistryEvent>> {
        let key = agent_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = registry_events::table
                .filter(registry_events::agent_id.eq(&key))
                .select(EventRow::as_select())
                .order(registry_events::timestamp.asc())
                .load::<EventRow>(connection)?;
            rows.into_iter().map(row_to_event).collect()
        })
        .await
    }
}

/// Resolution rows of one consumer, encoded before entering a transaction.
struct ResolutionRows {
    dependencies: Vec<DependencyResolutionRow>,
    llm_tools: Vec<LlmToolResolutionRow>,
    llm_providers: Vec<LlmProviderResolutionRow>,
}

impl ResolutionRows {
    fn from_set(set: &ResolutionSet) -> RegistryStoreResult<Self> {
        Ok(Self {
            dependencies: set
                .dependencies
                .iter()
                .map(dependency_to_row)
                .collect::<RegistryStoreResult<_>>()?,
            llm_tools: set
                .llm_tools
                .iter()
                .enumerate()
                .map(|(position, row)| llm_tool_to_row(position, row))
                .collect::<RegistryStoreResult<_>>()?,
            llm_providers: set
                .llm_providers
                .iter()
                .map(llm_provider_to_row)
                .collect::<RegistryStoreResult<_>>()?,
        })
    }
}

fn load_agent(connection: &mut PgConnection, key: &str) -> RegistryStoreResult<Option<Agent>> {
    let row = agents::table
        .filter(agents::agent_id.eq(key))
        .select(AgentRow::as_select())
        .first::<AgentRow>(connection)
        .optional()?;
    row.map(row_to_agent).transpose()
}

fn upsert_agent(connection: &mut PgConnection, row: &AgentRow) -> RegistryStoreResult<()> {
    diesel::insert_into(agents::table)
        .values(row)
        .on_conflict(agents::agent_id)
        .do_update()
        .set((
            agents::name.eq(excluded(agents::name)),
            agents::version.eq(excluded(agents::version)),
            agents::namespace.eq(excluded(agents::namespace)),
            agents::agent_type.eq(excluded(agents::agent_type)),
            agents::runtime.eq(excluded(agents::runtime)),
            agents::http_host.eq(excluded(agents::http_host)),
            agents::http_port.eq(excluded(agents::http_port)),
            agents::status.eq(excluded(agents::status)),
            agents::total_dependencies.eq(excluded(agents::total_dependencies)),
            agents::dependencies_resolved.eq(excluded(agents::dependencies_resolved)),
            agents::updated_at.eq(excluded(agents::updated_at)),
            agents::last_full_refresh.eq(excluded(agents::last_full_refresh)),
        ))
        .execute(connection)?;
    Ok(())
}

fn upsert_capabilities(
    connection: &mut PgConnection,
    rows: &[CapabilityRow],
) -> RegistryStoreResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    diesel::insert_into(capabilities::table)
        .values(rows)
        .on_conflict(capabilities::id)
        .do_update()
        .set((
            capabilities::capability.eq(excluded(capabilities::capability)),
            capabilities::version.eq(excluded(capabilities::version)),
            capabilities::description.eq(excluded(capabilities::description)),
            capabilities::input_schema.eq(excluded(capabilities::input_schema)),
            capabilities::llm_filter.eq(excluded(capabilities::llm_filter)),
            capabilities::llm_provider.eq(excluded(capabilities::llm_provider)),
            capabilities::tags.eq(excluded(capabilities::tags)),
            capabilities::kwargs.eq(excluded(capabilities::kwargs)),
            capabilities::dependencies.eq(excluded(capabilities::dependencies)),
            capabilities::position.eq(excluded(capabilities::position)),
            capabilities::updated_at.eq(excluded(capabilities::updated_at)),
        ))
        .execute(connection)?;
    Ok(())
}

/// Upserts dependency and provider rows by key, deletes rows whose key
/// disappeared and replaces tool rows.
fn write_resolutions(
    connection: &mut PgConnection,
    consumer: &str,
    rows: &ResolutionRows,
) -> RegistryStoreResult<()> {
    let wanted_positions: HashSet<(&str, i32)> = rows
        .dependencies
        .iter()
        .map(|row| (row.consumer_function_name.as_str(), row.dep_index))
        .collect();
    let stale_dependencies: Vec<uuid::Uuid> = dependency_resolutions::table
        .filter(dependency_resolutions::consumer_agent_id.eq(consumer))
        .select((
            dependency_resolutions::id,
            dependency_resolutions::consumer_function_name,
            dependency_resolutions::dep_index,
        ))
        .load::<(uuid::Uuid, String, i32)>(connection)?
        .into_iter()
        .filter(|(_, function_name, index)| {
            !wanted_positions.contains(&(function_name.as_str(), *index))
        })
        .map(|(id, _, _)| id)
        .collect();
    if !stale_dependencies.is_empty() {
        diesel::delete(
            dependency_resolutions::table.filter(dependency_resolutions::id.eq_any(&stale_dependencies)),
        )
        .execute(connection)?;
    }
    if !rows.dependencies.is_empty() {
        diesel::insert_into(dependency_resolutions::table)
            .values(&rows.dependencies)
            .on_conflict((
                dependency_resolutions::consumer_agent_id,
                dependency_resolutions::consumer_function_name,
                dependency_resolutions::dep_index,
            ))
            .do_update()
            .set((
                dependency_resolutions::capability_required
                    .eq(excluded(dependency_resolutions::capability_required)),
                dependency_resolutions::tags_required
                    .eq(excluded(dependency_resolutions::tags_required)),
                dependency_resolutions::version_required
                    .eq(excluded(dependency_resolutions::version_required)),
                dependency_resolutions::namespace_required
                    .eq(excluded(dependency_resolutions::namespace_required)),
                dependency_resolutions::provider_agent_id
                    .eq(excluded(dependency_resolutions::provider_agent_id)),
                dependency_resolutions::provider_function_name
                    .eq(excluded(dependency_resolutions::provider_function_name)),
                dependency_resolutions::provider_capability
                    .eq(excluded(dependency_resolutions::provider_capability)),
                dependency_resolutions::endpoint.eq(excluded(dependency_resolutions::endpoint)),
                dependency_resolutions::status.eq(excluded(dependency_resolutions::status)),
                dependency_resolutions::resolved_at
                    .eq(excluded(dependency_resolutions::resolved_at)),
            ))
            .execute(connection)?;
    }

    let wanted_functions: HashSet<&str> = rows
        .llm_providers
        .iter()
        .map(|row| row.consumer_function_name.as_str())
        .collect();
    let stale_providers: Vec<uuid::Uuid> = llm_provider_resolutions::table
        .filter(llm_provider_resolutions::consumer_agent_id.eq(consumer))
        .select((
            llm_provider_resolutions::id,
            llm_provider_resolutions::consumer_function_name,
        ))
        .load::<(uuid::Uuid, String)>(connection)?
        .into_iter()
        .filter(|(_, function_name)| !wanted_functions.contains(function_name.as_str()))
        .map(|(id, _)| id)
        .collect();
    if !stale_providers.is_empty() {
        diesel::delete(
            llm_provider_resolutions::table
                .filter(llm_provider_resolutions::id.eq_any(&stale_providers)),
        )
        .execute(connection)?;
    }
    if !rows.llm_providers.is_empty() {
        diesel::insert_into(llm_provider_resolutions::table)
            .values(&rows.llm_providers)
            .on_conflict((
                llm_provider_resolutions::consumer_agent_id,
                llm_provider_resolutions::consumer_function_name,
            ))
            .do_update()
            .set((
                llm_provider_resolutions::required_capability
                    .eq(excluded(llm_provider_resolutions::required_capability)),
                llm_provider_resolutions::required_tags
                    .eq(excluded(llm_provider_resolutions::required_tags)),
                llm_provider_resolutions::required_version
                    .eq(excluded(llm_provider_resolutions::required_version)),
                llm_provider_resolutions::required_namespace
                    .eq(excluded(llm_provider_resolutions::required_namespace)),
                llm_provider_resolutions::provider_agent_id
                    .eq(excluded(llm_provider_resolutions::provider_agent_id)),
                llm_provider_resolutions::provider_function_name
                    .eq(excluded(llm_provider_resolutions::provider_function_name)),
                llm_provider_resolutions::provider_capability
                    .eq(excluded(llm_provider_resolutions::provider_capability)),
                llm_provider_resolutions::endpoint.eq(excluded(llm_provider_resolutions::endpoint)),
                llm_provider_resolutions::status.eq(excluded(llm_provider_resolutions::status)),
                llm_provider_resolutions::resolved_at
                    .eq(excluded(llm_provider_resolutions::resolved_at)),
            ))
            .execute(connection)?;
    }

    diesel::delete(
        llm_tool_resolutions::table.filter(llm_tool_resolutions::consumer_agent_id.eq(consumer)),
    )
    .execute(connection)?;
    if !rows.llm_tools.is_empty() {
        diesel::insert_into(llm_tool_resolutions::table)
            .values(&rows.llm_tools)
            .execute(connection)?;
    }
    Ok(())
}

fn insert_events(connection: &mut PgConnection, rows: &[EventRow]) -> RegistryStoreResult<()> {
    if !rows.is_empty() {
        diesel::insert_into(registry_events::table)
            .values(rows)
            .execute(connection)?;
    }
    Ok(())
}

fn refresh_counts(connection: &mut PgConnection, consumer: &str) -> RegistryStoreResult<()> {
    let total = dependency_resolutions::table
        .filter(dependency_resolutions::consumer_agent_id.eq(consumer))
        .count()
        .get_result::<i64>(connection)?;
    let resolved = dependency_resolutions::table
        .filter(dependency_resolutions::consumer_agent_id.eq(consumer))
        .filter(dependency_resolutions::status.eq(AVAILABLE))
        .count()
        .get_result::<i64>(connection)?;
    diesel::update(agents::table.filter(agents::agent_id.eq(consumer)))
        .set((
            agents::total_dependencies.eq(count_to_i32(total)?),
            agents::dependencies_resolved.eq(count_to_i32(resolved)?),
        ))
        .execute(connection)?;
    Ok(())
}

/// Clears provider columns of rows bound to `provider`, optionally only to
/// `functions`, refreshes counters of affected consumers and returns them.
fn detach_provider(
    connection: &mut PgConnection,
    provider: &str,
    functions: Option<&[String]>,
) -> RegistryStoreResult<Vec<AgentId>> {
    let mut affected = BTreeSet::new();

    let bound_dependencies: Vec<(uuid::Uuid, String)> = match functions {
        Some(names) => dependency_resolutions::table
            .filter(dependency_resolutions::provider_agent_id.eq(provider))
            .filter(dependency_resolutions::provider_function_name.eq_any(names))
            .select((dependency_resolutions::id, dependency_resolutions::consumer_agent_id))
            .load(connection)?,
        None => dependency_resolutions::table
            .filter(dependency_resolutions::provider_agent_id.eq(provider))
            .select((dependency_resolutions::id, dependency_resolutions::consumer_agent_id))
            .load(connection)?,
    };
    if !bound_dependencies.is_empty() {
        let ids: Vec<uuid::Uuid> = bound_dependencies.iter().map(|(id, _)| *id).collect();
        diesel::update(dependency_resolutions::table.filter(dependency_resolutions::id.eq_any(&ids)))
            .set((
                dependency_resolutions::provider_agent_id.eq(None::<String>),
                dependency_resolutions::provider_function_name.eq(None::<String>),
                dependency_resolutions::provider_capability.eq(None::<String>),
                dependency_resolutions::endpoint.eq(None::<String>),
                dependency_resolutions::status.eq(UNAVAILABLE),
                dependency_resolutions::resolved_at.eq(None::<DateTime<Utc>>),
            ))
            .execute(connection)?;
        affected.extend(bound_dependencies.into_iter().map(|(_, consumer)| consumer));
    }

    let bound_tools: Vec<(uuid::Uuid, String)> = match functions {
        Some(names) => llm_tool_resolutions::table
            .filter(llm_tool_resolutions::provider_agent_id.eq(provider))
            .filter(llm_tool_resolutions::provider_function_name.eq_any(names))
            .select((llm_tool_resolutions::id, llm_tool_resolutions::consumer_agent_id))
            .load(connection)?,
        None => llm_tool_resolutions::table
            .filter(llm_tool_resolutions::provider_agent_id.eq(provider))
            .select((llm_tool_resolutions::id, llm_tool_resolutions::consumer_agent_id))
            .load(connection)?,
    };
    if !bound_tools.is_empty() {
        let ids: Vec<uuid::Uuid> = bound_tools.iter().map(|(id, _)| *id).collect();
        diesel::update(llm_tool_resolutions::table.filter(llm_tool_resolutions::id.eq_any(&ids)))
            .set((
                llm_tool_resolutions::provider_agent_id.eq(None::<String>),
                llm_tool_resolutions::provider_function_name.eq(None::<String>),
                llm_tool_resolutions::provider_capability.eq(None::<String>),
                llm_tool_resolutions::endpoint.eq(None::<String>),
                llm_tool_resolutions::status.eq(UNAVAILABLE),
            ))
            .execute(connection)?;
        affected.extend(bound_tools.into_iter().map(|(_, consumer)| consumer));
    }

    let bound_providers: Vec<(uuid::Uuid, String)> = match functions {
        Some(names) => llm_provider_resolutions::table
            .filter(llm_provider_resolutions::provider_agent_id.eq(provider))
            .filter(llm_provider_resolutions::provider_function_name.eq_any(names))
            .select((llm_provider_resolutions::id, llm_provider_resolutions::consumer_agent_id))
            .load(connection)?,
        None => llm_provider_resolutions::table
            .filter(llm_provider_resolutions::provider_agent_id.eq(provider))
            .select((llm_provider_resolutions::id, llm_provider_resolutions::consumer_agent_id))
            .load(connection)?,
    };
    if !bound_providers.is_empty() {
        let ids: Vec<uuid::Uuid> = bound_providers.iter().map(|(id, _)| *id).collect();
        diesel::update(
            llm_provider_resolutions::table.filter(llm_provider_resolutions::id.eq_any(&ids)),
        )
        .set((
            llm_provider_resolutions::provider_agent_id.eq(None::<String>),
            llm_provider_resolutions::provider_function_name.eq(None::<String>),
            llm_provider_resolutions::provider_capability.eq(None::<String>),
            llm_provider_resolutions::endpoint.eq(None::<String>),
            llm_provider_resolutions::status.eq(UNAVAILABLE),
            llm_provider_resolutions::resolved_at.eq(None::<DateTime<Utc>>),
        ))
        .execute(connection)?;
        affected.extend(bound_providers.into_iter().map(|(_, consumer)| consumer));
    }

    affected.remove(provider);
    for consumer in &affected {
        refresh_counts(connection, consumer)?;
    }
    affected.into_iter().map(parse_agent_id).collect()
}

fn bound_consumer_counts(
    connection: &mut PgConnection,
) -> RegistryStoreResult<HashMap<(String, String), u32>> {
    let mut bindings = dependency_resolutions::table
        .filter(dependency_resolutions::status.eq(AVAILABLE))
        .select((
            dependency_resolutions::provider_agent_id,
            dependency_resolutions::provider_function_name,
        ))
        .load::<(Option<String>, Option<String>)>(connection)?;
    bindings.extend(
        llm_provider_resolutions::table
            .filter(llm_provider_resolutions::status.eq(AVAILABLE))
            .select((
                llm_provider_resolutions::provider_agent_id,
                llm_provider_resolutions::provider_function_name,
            ))
            .load::<(Option<String>, Option<String>)>(connection)?,
    );

    let mut counts = HashMap::new();
    for binding in bindings {
        if let (Some(agent_id), Some(function_name)) = binding {
            let count: &mut u32 = counts.entry((agent_id, function_name)).or_default();
            *count = count.saturating_add(1);
        }
    }
    Ok(counts)
}

fn load_resolutions(connection: &mut PgConnection, consumer: &str) -> RegistryStoreResult<ResolutionSet> {
    let dependency_rows = dependency_resolutions::table
        .filter(dependency_resolutions::consumer_agent_id.eq(consumer))
        .select(DependencyResolutionRow::as_select())
        .order((
            dependency_resolutions::consumer_function_name.asc(),
            dependency_resolutions::dep_index.asc(),
        ))
        .load::<DependencyResolutionRow>(connection)?;
    let tool_rows = llm_tool_resolutions::table
        .filter(llm_tool_resolutions::consumer_agent_id.eq(consumer))
        .select(LlmToolResolutionRow::as_select())
        .order(llm_tool_resolutions::position.asc())
        .load::<LlmToolResolutionRow>(connection)?;
    let provider_rows = llm_provider_resolutions::table
        .filter(llm_provider_resolutions::consumer_agent_id.eq(consumer))
        .select(LlmProviderResolutionRow::as_select())
        .order(llm_provider_resolutions::consumer_function_name.asc())
        .load::<LlmProviderResolutionRow>(connection)?;

    Ok(ResolutionSet {
        dependencies: dependency_rows
            .into_iter()
            .map(row_to_dependency)
            .collect::<RegistryStoreResult<_>>()?,
        llm_tools: tool_rows
            .into_iter()
            .map(row_to_llm_tool)
            .collect::<RegistryStoreResult<_>>()?,
        llm_providers: provider_rows
            .into_iter()
            .map(row_to_llm_provider)
            .collect::<RegistryStoreResult<_>>()?,
    })
}

fn agent_to_row(agent: &Agent) -> RegistryStoreResult<AgentRow> {
    let profile = agent.profile();
    Ok(AgentRow {
        agent_id: agent.id().as_str().to_owned(),
        name: profile.name.clone(),
        version: profile.version.clone(),
        namespace: profile.namespace.as_str().to_owned(),
        agent_type: profile.agent_type.as_str().to_owned(),
        runtime: profile.runtime.map(|runtime| runtime.as_str().to_owned()),
        http_host: profile.http_host.clone(),
        http_port: i32::from(profile.http_port),
        status: agent.status().as_str().to_owned(),
        total_dependencies: to_i32(agent.total_dependencies())?,
        dependencies_resolved: to_i32(agent.dependencies_resolved())?,
        created_at: agent.created_at(),
        updated_at: agent.updated_at(),
        last_full_refresh: agent.last_full_refresh(),
    })
}

fn row_to_agent(row: AgentRow) -> RegistryStoreResult<Agent> {
    let AgentRow {
        agent_id,
        name,
        version,
        namespace,
        agent_type,
        runtime,
        http_host,
        http_port,
        status,
        total_dependencies,
        dependencies_resolved,
        created_at,
        updated_at,
        last_full_refresh,
    } = row;

    let profile = AgentProfile {
        name,
        version,
        namespace: Namespace::new(namespace).map_err(RegistryStoreError::invalid_persisted_data)?,
        agent_type: AgentType::try_from(agent_type.as_str())
            .map_err(RegistryStoreError::invalid_persisted_data)?,
        runtime: runtime
            .as_deref()
            .map(Runtime::try_from)
            .transpose()
            .map_err(RegistryStoreError::invalid_persisted_data)?,
        http_host,
        http_port: u16::try_from(http_port).map_err(RegistryStoreError::invalid_persisted_data)?,
    };
    let data = PersistedAgentData {
        id: parse_agent_id(agent_id)?,
        profile,
        status: AgentStatus::try_from(status.as_str())
            .map_err(RegistryStoreError::invalid_persisted_data)?,
        total_dependencies: u32::try_from(total_dependencies)
            .map_err(RegistryStoreError::invalid_persisted_data)?,
        dependencies_resolved: u32::try_from(dependencies_resolved)
            .map_err(RegistryStoreError::invalid_persisted_data)?,
        created_at,
        updated_at,
        last_full_refresh,
    };
    Agent::from_persisted(data).map_err(RegistryStoreError::invalid_persisted_data)
}

fn capability_to_row(
    agent_id: &str,
    position: usize,
    capability: &Capability,
) -> RegistryStoreResult<CapabilityRow> {
    Ok(CapabilityRow {
        id: capability.id().into_inner(),
        agent_id: agent_id.to_owned(),
        function_name: capability.function_name().to_owned(),
        capability: capability.capability().to_owned(),
        version: capability.version().to_owned(),
        description: capability.description().map(str::to_owned),
        input_schema: capability.input_schema().cloned(),
        llm_filter: capability.llm_filter().map(encode).transpose()?,
        llm_provider: capability.llm_provider().map(encode).transpose()?,
        tags: encode(capability.tags())?,
        kwargs: capability.kwargs().cloned(),
        dependencies: encode(capability.dependencies())?,
        position: i32::try_from(position).map_err(RegistryStoreError::persistence)?,
        created_at: capability.created_at(),
        updated_at: capability.updated_at(),
    })
}

fn row_to_capability(row: CapabilityRow) -> RegistryStoreResult<Capability> {
    let CapabilityRow {
        id,
        function_name,
        capability,
        version,
        description,
        input_schema,
        llm_filter,
        llm_provider,
        tags,
        kwargs,
        dependencies,
        created_at,
        updated_at,
        ..
    } = row;

    let declaration = ToolDeclaration {
        function_name,
        capability: Some(capability),
        version: Some(version),
        description,
        input_schema,
        llm_filter: llm_filter.map(decode).transpose()?,
        llm_provider: llm_provider.map(decode).transpose()?,
        tags: decode(tags)?,
        kwargs,
        dependencies: decode(dependencies)?,
    };
    Ok(Capability::from_persisted(PersistedCapabilityData {
        id: CapabilityId::from_uuid(id),
        declaration,
        created_at,
        updated_at,
    }))
}

fn dependency_to_row(row: &DependencyResolution) -> RegistryStoreResult<DependencyResolutionRow> {
    let columns = row.outcome.to_columns();
    Ok(DependencyResolutionRow {
        id: row.id.into_inner(),
        consumer_agent_id: row.consumer_agent_id.as_str().to_owned(),
        consumer_function_name: row.consumer_function_name.clone(),
        dep_index: to_i32(row.dep_index)?,
        capability_required: row.spec.capability.clone(),
        tags_required: encode(&row.spec.tags)?,
        version_required: row.spec.version.as_str().to_owned(),
        namespace_required: row.namespace.as_str().to_owned(),
        provider_agent_id: columns.agent_id,
        provider_function_name: columns.function_name,
        provider_capability: columns.capability,
        endpoint: columns.endpoint,
        status: row.outcome.status().as_str().to_owned(),
        resolved_at: row.resolved_at,
    })
}

fn row_to_dependency(row: DependencyResolutionRow) -> RegistryStoreResult<DependencyResolution> {
    let DependencyResolutionRow {
        id,
        consumer_agent_id,
        consumer_function_name,
        dep_index,
        capability_required,
        tags_required,
        version_required,
        namespace_required,
        provider_agent_id,
        provider_function_name,
        provider_capability,
        endpoint,
        status,
        resolved_at,
    } = row;

    let index = u32::try_from(dep_index).map_err(RegistryStoreError::invalid_persisted_data)?;
    let outcome = ResolutionOutcome::from_columns(
        parse_status(&status)?,
        StoredProviderColumns {
            agent_id: provider_agent_id,
            function_name: provider_function_name,
            capability: provider_capability,
            endpoint,
        },
        &capability_required,
        &consumer_function_name,
        usize::try_from(index).unwrap_or(usize::MAX),
    )
    .map_err(RegistryStoreError::invalid_persisted_data)?;
    let namespace =
        Namespace::new(namespace_required).map_err(RegistryStoreError::invalid_persisted_data)?;
    let spec = DependencySpec::new(capability_required)
        .with_tags(decode(tags_required)?)
        .with_version(VersionConstraint::parse(&version_required))
        .with_namespace(namespace.clone());

    Ok(DependencyResolution {
        id: ResolutionId::from_uuid(id),
        consumer_agent_id: parse_agent_id(consumer_agent_id)?,
        consumer_function_name,
        dep_index: index,
        spec,
        namespace,
        outcome,
        resolved_at,
    })
}

fn llm_tool_to_row(
    position: usize,
    row: &LlmToolResolution,
) -> RegistryStoreResult<LlmToolResolutionRow> {
    let columns = row.outcome.to_columns();
    Ok(LlmToolResolutionRow {
        id: row.id.into_inner(),
        consumer_agent_id: row.consumer_agent_id.as_str().to_owned(),
        consumer_function_name: row.consumer_function_name.clone(),
        filter_capability: row.filter_capability.clone(),
        filter_tags: encode(&row.filter_tags)?,
        filter_mode: row.filter_mode.as_str().to_owned(),
        provider_agent_id: columns.agent_id,
        provider_function_name: columns.function_name,
        provider_capability: columns.capability,
        endpoint: columns.endpoint,
        status: row.outcome.status().as_str().to_owned(),
        position: i32::try_from(position).map_err(RegistryStoreError::persistence)?,
        resolved_at: row.resolved_at,
    })
}

fn row_to_llm_tool(row: LlmToolResolutionRow) -> RegistryStoreResult<LlmToolResolution> {
    let LlmToolResolutionRow {
        id,
        consumer_agent_id,
        consumer_function_name,
        filter_capability,
        filter_tags,
        filter_mode,
        provider_agent_id,
        provider_function_name,
        provider_capability,
        endpoint,
        status,
        position,
        resolved_at,
    } = row;

    let outcome = ResolutionOutcome::from_columns(
        parse_status(&status)?,
        StoredProviderColumns {
            agent_id: provider_agent_id,
            function_name: provider_function_name,
            capability: provider_capability,
            endpoint,
        },
        filter_capability.as_deref().unwrap_or_default(),
        &consumer_function_name,
        usize::try_from(position).unwrap_or_default(),
    )
    .map_err(RegistryStoreError::invalid_persisted_data)?;

    Ok(LlmToolResolution {
        id: ResolutionId::from_uuid(id),
        consumer_agent_id: parse_agent_id(consumer_agent_id)?,
        consumer_function_name,
        filter_capability,
        filter_tags: decode(filter_tags)?,
        filter_mode: FilterMode::try_from(filter_mode.as_str())
            .map_err(RegistryStoreError::invalid_persisted_data)?,
        outcome,
        resolved_at,
    })
}

fn llm_provider_to_row(row: &LlmProviderResolution) -> RegistryStoreResult<LlmProviderResolutionRow> {
    let columns = row.outcome.to_columns();
    Ok(LlmProviderResolutionRow {
        id: row.id.into_inner(),
        consumer_agent_id: row.consumer_agent_id.as_str().to_owned(),
        consumer_function_name: row.consumer_function_name.clone(),
        required_capability: row.spec.capability.clone(),
        required_tags: encode(&row.spec.tags)?,
        required_version: row.spec.version.as_str().to_owned(),
        required_namespace: row.namespace.as_str().to_owned(),
        provider_agent_id: columns.agent_id,
        provider_function_name: columns.function_name,
        provider_capability: columns.capability,
        endpoint: columns.endpoint,
        status: row.outcome.status().as_str().to_owned(),
        resolved_at: row.resolved_at,
    })
}

fn row_to_llm_provider(row: LlmProviderResolutionRow) -> RegistryStoreResult<LlmProviderResolution> {
    let LlmProviderResolutionRow {
        id,
        consumer_agent_id,
        consumer_function_name,
        required_capability,
        required_tags,
        required_version,
        required_namespace,
        provider_agent_id,
        provider_function_name,
        provider_capability,
        endpoint,
        status,
        resolved_at,
    } = row;

    let outcome = ResolutionOutcome::from_columns(
        parse_status(&status)?,
        StoredProviderColumns {
            agent_id: provider_agent_id,
            function_name: provider_function_name,
            capability: provider_capability,
            endpoint,
        },
        &required_capability,
        &consumer_function_name,
        0,
    )
    .map_err(RegistryStoreError::invalid_persisted_data)?;
    let namespace =
        Namespace::new(required_namespace).map_err(RegistryStoreError::invalid_persisted_data)?;
    let spec = DependencySpec::new(required_capability)
        .with_tags(decode(required_tags)?)
        .with_version(VersionConstraint::parse(&required_version))
        .with_namespace(namespace.clone());

    Ok(LlmProviderResolution {
        id: ResolutionId::from_uuid(id),
        consumer_agent_id: parse_agent_id(consumer_agent_id)?,
        consumer_function_name,
        spec,
        namespace,
        outcome,
        resolved_at,
    })
}

fn event_to_row(event: &RegistryEvent) -> EventRow {
    EventRow {
        id: event.id().into_inner(),
        agent_id: event.agent_id().as_str().to_owned(),
        event_type: event.event_type().as_str().to_owned(),
        function_name: event.function_name().map(str::to_owned),
        timestamp: event.timestamp(),
        data: event.data().clone(),
    }
}

fn row_to_event(row: EventRow) -> RegistryStoreResult<RegistryEvent> {
    Ok(RegistryEvent::from_persisted(PersistedEventData {
        id: EventId::from_uuid(row.id),
        agent_id: parse_agent_id(row.agent_id)?,
        event_type: RegistryEventType::try_from(row.event_type.as_str())
            .map_err(RegistryStoreError::invalid_persisted_data)?,
        function_name: row.function_name,
        timestamp: row.timestamp,
        data: row.data,
    }))
}

fn parse_agent_id(value: String) -> RegistryStoreResult<AgentId> {
    AgentId::new(value).map_err(RegistryStoreError::invalid_persisted_data)
}

fn parse_status(value: &str) -> RegistryStoreResult<ResolutionStatus> {
    ResolutionStatus::try_from(value).map_err(RegistryStoreError::invalid_persisted_data)
}

fn to_i32(value: u32) -> RegistryStoreResult<i32> {
    i32::try_from(value).map_err(RegistryStoreError::persistence)
}

fn count_to_i32(value: i64) -> RegistryStoreResult<i32> {
    i32::try_from(value).map_err(RegistryStoreError::persistence)
}

fn encode<T: serde::Serialize + ?Sized>(value: &T) -> RegistryStoreResult<serde_json::Value> {
    serde_json::to_value(value).map_err(RegistryStoreError::persistence)
}

fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> RegistryStoreResult<T> {
    serde_json::from_value(value).map_err(RegistryStoreError::invalid_persisted_data)
}
