//! Heartbeat timeout, eviction and recovery.

use super::helpers::{Mesh, agent, consumer, mesh, needs, provider};
use mesh_registry::registry::{
    domain::{AgentStatus, AgentType, RegistryEventType, ResolutionStatus},
    ports::RegistryStore,
    services::{AgentMetadata, HeartbeatRequest, SweepReport},
};
use rstest::rstest;

async fn status_of(mesh: &Mesh, agent_id: &str) -> Option<AgentStatus> {
    mesh.store
        .find_agent(&agent(agent_id))
        .await
        .expect("lookup succeeds")
        .map(|stored| stored.status())
}

async fn provider_and_consumer(mesh: &Mesh) {
    mesh.register("weather-a", provider(9001, "weather", "1.0.0", &[]))
        .await;
    mesh.register("planner", consumer(9100, "plan_trip", vec![needs("weather", &[])]))
        .await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn silent_agents_expire_and_consumers_lose_their_provider(mesh: Mesh) {
    provider_and_consumer(&mesh).await;

    mesh.clock.advance_secs(45);
    mesh.registry
        .heartbeat(HeartbeatRequest::new("planner"))
        .await
        .expect("planner heartbeat");
    mesh.clock.advance_secs(20);

    let report = mesh.health.sweep().await.expect("sweep succeeds");
    assert_eq!(report.expired, 1);
    assert_eq!(report.evicted, 0);
    assert_eq!(status_of(&mesh, "weather-a").await, Some(AgentStatus::Unhealthy));
    assert_eq!(status_of(&mesh, "planner").await, Some(AgentStatus::Healthy));
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await,
        (ResolutionStatus::Unavailable, None)
    );

    let planner = mesh
        .store
        .find_agent(&agent("planner"))
        .await
        .expect("lookup succeeds")
        .expect("planner exists");
    assert_eq!(planner.dependencies_resolved(), 0);

    let events = mesh
        .registry
        .agent_events("weather-a")
        .await
        .expect("events load");
    let expire = events
        .iter()
        .find(|event| event.event_type() == RegistryEventType::Expire)
        .expect("expire event written");
    assert_eq!(expire.data()["reason"], "heartbeat_timeout");
    assert_eq!(expire.data()["previous_status"], "healthy");
    assert_eq!(expire.data()["threshold_seconds"], 60);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn agents_within_the_timeout_are_untouched(mesh: Mesh) {
    provider_and_consumer(&mesh).await;
    mesh.clock.advance_secs(59);

    let report = mesh.health.sweep().await.expect("sweep succeeds");
    assert_eq!(report, SweepReport::default());
    assert_eq!(status_of(&mesh, "weather-a").await, Some(AgentStatus::Healthy));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn long_dead_agents_are_evicted(mesh: Mesh) {
    provider_and_consumer(&mesh).await;

    mesh.clock.advance_secs(61);
    mesh.health.sweep().await.expect("first sweep succeeds");
    assert_eq!(status_of(&mesh, "weather-a").await, Some(AgentStatus::Unhealthy));

    mesh.clock.advance_secs(60);
    let report = mesh.health.sweep().await.expect("second sweep succeeds");
    assert_eq!(report.evicted, 2);
    assert_eq!(status_of(&mesh, "weather-a").await, None);
    assert_eq!(status_of(&mesh, "planner").await, None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn evicted_providers_leave_consumers_unresolved_after_refresh(mesh: Mesh) {
    provider_and_consumer(&mesh).await;

    mesh.clock.advance_secs(61);
    mesh.health.sweep().await.expect("first sweep succeeds");
    mesh.registry
        .heartbeat(HeartbeatRequest::new("planner"))
        .await
        .expect("planner recovers");

    mesh.clock.advance_secs(60);
    mesh.registry
        .heartbeat(HeartbeatRequest::new("planner"))
        .await
        .expect("planner heartbeat");
    let report = mesh.health.sweep().await.expect("second sweep succeeds");
    assert_eq!(report.evicted, 1);
    assert_eq!(status_of(&mesh, "weather-a").await, None);
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await,
        (ResolutionStatus::Unavailable, None)
    );

    mesh.register("planner", consumer(9100, "plan_trip", vec![needs("weather", &[])]))
        .await;
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await,
        (ResolutionStatus::Unresolved, None)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn heartbeat_recovers_and_rebinds_waiting_consumers(mesh: Mesh) {
    provider_and_consumer(&mesh).await;
    mesh.clock.advance_secs(30);
    mesh.registry
        .heartbeat(HeartbeatRequest::new("planner"))
        .await
        .expect("planner heartbeat");
    mesh.clock.advance_secs(31);
    mesh.health.sweep().await.expect("sweep succeeds");
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await.0,
        ResolutionStatus::Unavailable
    );

    mesh.clock.advance_secs(5);
    mesh.registry
        .heartbeat(HeartbeatRequest::new("weather-a"))
        .await
        .expect("provider heartbeat");

    assert_eq!(status_of(&mesh, "weather-a").await, Some(AgentStatus::Healthy));
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await,
        (ResolutionStatus::Available, Some("weather-a".to_owned()))
    );
    let events = mesh
        .registry
        .agent_events("weather-a")
        .await
        .expect("events load");
    let last = events.last().expect("events exist");
    assert_eq!(last.event_type(), RegistryEventType::Register);
    assert_eq!(last.data()["reason"], "heartbeat_recovered");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn startup_cleanup_marks_stale_agents(mesh: Mesh) {
    provider_and_consumer(&mesh).await;
    mesh.clock.advance_secs(20);
    mesh.registry
        .heartbeat(HeartbeatRequest::new("planner"))
        .await
        .expect("planner heartbeat");
    mesh.clock.advance_secs(15);

    let marked = mesh
        .health
        .cleanup_stale_on_startup()
        .await
        .expect("cleanup succeeds");
    assert_eq!(marked, 1);
    assert_eq!(status_of(&mesh, "weather-a").await, Some(AgentStatus::Unhealthy));

    let events = mesh
        .registry
        .agent_events("weather-a")
        .await
        .expect("events load");
    assert!(
        events
            .iter()
            .any(|event| event.data()["reason"] == "stale_on_startup")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn api_agents_expire_without_status_events(mesh: Mesh) {
    mesh.register(
        "gateway",
        AgentMetadata::new().with_agent_type(AgentType::Api),
    )
    .await;
    mesh.clock.advance_secs(61);

    let report = mesh.health.sweep().await.expect("sweep succeeds");
    assert_eq!(report.expired, 1);
    let events = mesh
        .registry
        .agent_events("gateway")
        .await
        .expect("events load");
    assert!(
        events
            .iter()
            .all(|event| event.event_type() != RegistryEventType::Expire)
    );
}
