//! Registry flows persisted through the `PostgreSQL` store.

use crate::postgres::helpers::{PgMesh, agent, consumer, pg_mesh, provider};
use mesh_registry::registry::{
    domain::{AgentStatus, RegistryEventType, ResolutionStatus, ToolDeclaration},
    ports::RegistryStore,
    services::{AgentMetadata, HeartbeatRequest},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn store_answers_ping(#[future(awt)] pg_mesh: Option<PgMesh>) {
    let Some(mesh) = pg_mesh else { return };
    mesh.store.ping().await.expect("ping succeeds");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn registration_persists_agent_capabilities_and_bindings(
    #[future(awt)] pg_mesh: Option<PgMesh>,
) {
    let Some(mesh) = pg_mesh else { return };
    mesh.register("weather-a", provider(9001, "weather", &["fast"]))
        .await;
    mesh.register("planner", consumer(9100, "plan_trip", "weather"))
        .await;

    let stored = mesh
        .store
        .find_agent(&agent("planner"))
        .await
        .expect("lookup succeeds")
        .expect("planner stored");
    assert_eq!(stored.status(), AgentStatus::Healthy);
    assert_eq!(stored.total_dependencies(), 1);
    assert_eq!(stored.dependencies_resolved(), 1);

    let capabilities = mesh
        .store
        .capabilities_of(&agent("weather-a"))
        .await
        .expect("capabilities load");
    let names: Vec<&str> = capabilities
        .iter()
        .map(|capability| capability.function_name())
        .collect();
    assert_eq!(names, vec!["weather_tool"]);
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await,
        (ResolutionStatus::Available, Some("weather-a".to_owned()))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reregistration_keeps_row_identifiers(#[future(awt)] pg_mesh: Option<PgMesh>) {
    let Some(mesh) = pg_mesh else { return };
    mesh.register("planner", consumer(9100, "plan_trip", "weather"))
        .await;
    let before = mesh
        .store
        .resolutions_of(&agent("planner"))
        .await
        .expect("resolutions load");

    mesh.clock.advance_secs(2);
    mesh.register("planner", consumer(9100, "plan_trip", "weather"))
        .await;
    let after = mesh
        .store
        .resolutions_of(&agent("planner"))
        .await
        .expect("resolutions load");

    let ids = |set: &mesh_registry::registry::domain::ResolutionSet| {
        set.dependencies.iter().map(|row| row.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&before), ids(&after));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn retargeted_tool_detaches_its_consumers(#[future(awt)] pg_mesh: Option<PgMesh>) {
    let Some(mesh) = pg_mesh else { return };
    mesh.register("weather-a", provider(9001, "weather", &[]))
        .await;
    mesh.register("planner", consumer(9100, "plan_trip", "weather"))
        .await;

    mesh.clock.advance_secs(2);
    mesh.register(
        "weather-a",
        AgentMetadata::new()
            .with_http("10.0.0.1", 9001)
            .with_tool(ToolDeclaration::new("weather_tool").with_capability("forecast")),
    )
    .await;

    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await,
        (ResolutionStatus::Unresolved, None)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn expiry_and_recovery_round_trip_through_the_database(
    #[future(awt)] pg_mesh: Option<PgMesh>,
) {
    let Some(mesh) = pg_mesh else { return };
    mesh.register("weather-a", provider(9001, "weather", &[]))
        .await;
    mesh.register("planner", consumer(9100, "plan_trip", "weather"))
        .await;

    mesh.clock.advance_secs(40);
    mesh.registry
        .heartbeat(HeartbeatRequest::new("planner"))
        .await
        .expect("planner heartbeat");
    mesh.clock.advance_secs(25);
    let report = mesh.health.sweep().await.expect("sweep succeeds");
    assert_eq!(report.expired, 1);
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await,
        (ResolutionStatus::Unavailable, None)
    );

    mesh.registry
        .heartbeat(HeartbeatRequest::new("weather-a"))
        .await
        .expect("provider heartbeat");
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await,
        (ResolutionStatus::Available, Some("weather-a".to_owned()))
    );

    let kinds: Vec<RegistryEventType> = mesh
        .store
        .events_for(&agent("weather-a"))
        .await
        .expect("events load")
        .iter()
        .map(|event| event.event_type())
        .collect();
    assert_eq!(
        kinds,
        vec![
            RegistryEventType::Register,
            RegistryEventType::Expire,
            RegistryEventType::Register,
        ]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn eviction_deletes_owned_rows(#[future(awt)] pg_mesh: Option<PgMesh>) {
    let Some(mesh) = pg_mesh else { return };
    mesh.register("weather-a", provider(9001, "weather", &[]))
        .await;

    mesh.clock.advance_secs(61);
    mesh.health.sweep().await.expect("first sweep");
    mesh.clock.advance_secs(121);
    let report = mesh.health.sweep().await.expect("second sweep");

    assert_eq!(report.evicted, 1);
    assert!(
        mesh.store
            .find_agent(&agent("weather-a"))
            .await
            .expect("lookup succeeds")
            .is_none()
    );
    assert!(
        mesh.store
            .capabilities_of(&agent("weather-a"))
            .await
            .expect("capabilities load")
            .is_empty()
    );
    assert!(
        mesh.store
            .events_for(&agent("weather-a"))
            .await
            .expect("events load")
            .is_empty()
    );
}
