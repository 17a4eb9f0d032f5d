//! axum handlers for the registry endpoints.

use super::{
    ApiError, AppState, ErrorResponse,
    dto::{
        AgentInfo, AgentListParams, AgentsResponse, HealthResponse, HeartbeatBody,
        RegisterAgentBody, RegistryResponse, RootResponse, SERVICE_NAME, SERVICE_VERSION,
    },
};
use crate::registry::{
    ports::RegistryStore,
    services::{FastHeartbeatStatus, HeartbeatOutcome, ServiceHealth},
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};

type SharedState<S, C> = State<Arc<AppState<S, C>>>;

const ENDPOINTS: [&str; 7] = [
    "GET /health",
    "HEAD /health",
    "GET /agents",
    "POST /agents/register",
    "DELETE /agents/{agent_id}",
    "POST /heartbeat",
    "HEAD /heartbeat/{agent_id}",
];

const fn health_status_code(health: ServiceHealth) -> StatusCode {
    match health {
        ServiceHealth::Healthy | ServiceHealth::Degraded => StatusCode::OK,
        ServiceHealth::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// `GET /`
#[expect(clippy::unused_async, reason = "axum handlers are async")]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        service: SERVICE_NAME,
        version: SERVICE_VERSION,
        status: "running",
        endpoints: ENDPOINTS.to_vec(),
    })
}

/// `GET /health`
pub async fn health<S, C>(State(state): SharedState<S, C>) -> Response
where
    S: RegistryStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    let status = state.health().service_health().await;
    let body = HealthResponse {
        status: status.as_str(),
        version: SERVICE_VERSION,
        uptime_seconds: state.uptime_seconds(),
        timestamp: state.now(),
        service: SERVICE_NAME,
    };
    (health_status_code(status), Json(body)).into_response()
}

/// `HEAD /health`
pub async fn head_health<S, C>(State(state): SharedState<S, C>) -> Response
where
    S: RegistryStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    let status = state.health().service_health().await;
    (
        health_status_code(status),
        [
            ("x-health-status", status.as_str().to_owned()),
            ("x-service-version", SERVICE_VERSION.to_owned()),
            ("x-uptime-seconds", state.uptime_seconds().to_string()),
        ],
    )
        .into_response()
}

/// `POST /agents/register`
pub async fn register_agent<S, C>(
    State(state): SharedState<S, C>,
    payload: Result<Json<RegisterAgentBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RegistryResponse>), ErrorResponse>
where
    S: RegistryStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    let Json(body) = payload
        .map_err(|rejection| state.reject(ApiError::bad_request(rejection.body_text())))?;
    let registration = body.into_registration().map_err(|err| state.reject(err))?;
    let outcome = state
        .registry()
        .register(registration)
        .await
        .map_err(|err| state.reject(err))?;
    info!(
        agent_id = %outcome.agent.id(),
        event = %outcome.event_type,
        resolved = outcome.report.dependencies_resolved,
        total = outcome.report.total_dependencies,
        "agent registered"
    );
    let response =
        RegistryResponse::committed(outcome, "Agent registered successfully", state.now());
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /heartbeat`
pub async fn heartbeat<S, C>(
    State(state): SharedState<S, C>,
    payload: Result<Json<HeartbeatBody>, JsonRejection>,
) -> Result<Json<RegistryResponse>, ErrorResponse>
where
    S: RegistryStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    let Json(body) = payload
        .map_err(|rejection| state.reject(ApiError::bad_request(rejection.body_text())))?;
    let request = body.into_request().map_err(|err| state.reject(err))?;
    let outcome = state
        .registry()
        .heartbeat(request)
        .await
        .map_err(|err| state.reject(err))?;
    let response = match outcome {
        HeartbeatOutcome::Full(outcome) => {
            debug!(agent_id = %outcome.agent.id(), "heartbeat applied registration");
            RegistryResponse::committed(outcome, "Heartbeat received", state.now())
        }
        HeartbeatOutcome::Touched(agent) => {
            RegistryResponse::touched(agent.id().as_str(), state.now())
        }
    };
    Ok(Json(response))
}

/// `HEAD /heartbeat/{agent_id}`
pub async fn fast_heartbeat<S, C>(
    State(state): SharedState<S, C>,
    Path(agent_id): Path<String>,
) -> StatusCode
where
    S: RegistryStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    match state.registry().fast_heartbeat_check(&agent_id).await {
        Ok(FastHeartbeatStatus::Gone) => StatusCode::GONE,
        Ok(FastHeartbeatStatus::TopologyChanged) => StatusCode::ACCEPTED,
        Ok(FastHeartbeatStatus::Unchanged) => StatusCode::OK,
        Err(err) => {
            warn!(agent_id = %agent_id, error = %err, "fast heartbeat failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// `DELETE /agents/{agent_id}`
pub async fn unregister_agent<S, C>(
    State(state): SharedState<S, C>,
    Path(agent_id): Path<String>,
) -> Result<StatusCode, ErrorResponse>
where
    S: RegistryStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    state
        .registry()
        .unregister(&agent_id)
        .await
        .map_err(|err| state.reject(err))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /agents`
pub async fn list_agents<S, C>(
    State(state): SharedState<S, C>,
    params: Result<Query<AgentListParams>, QueryRejection>,
) -> Result<Json<AgentsResponse>, ErrorResponse>
where
    S: RegistryStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    let Query(raw) = params
        .map_err(|rejection| state.reject(ApiError::bad_request(rejection.body_text())))?;
    let query = raw.into_query().map_err(|err| state.reject(err))?;
    let views = state
        .registry()
        .list_agents(&query)
        .await
        .map_err(|err| state.reject(err))?;
    let agents: Vec<AgentInfo> = views.into_iter().map(AgentInfo::from).collect();
    Ok(Json(AgentsResponse {
        count: agents.len(),
        agents,
        timestamp: state.now(),
    }))
}
