//! Registration, heartbeat and unregister flows against the in-memory store.

use super::helpers::{Mesh, agent, consumer, mesh, needs, provider};
use mesh_registry::registry::{
    domain::{AgentStatus, RegistryDomainError, RegistryEventType, ResolutionStatus, ToolDeclaration},
    ports::RegistryStore,
    services::{
        AgentMetadata, AgentRegistration, FastHeartbeatStatus, HeartbeatOutcome,
        HeartbeatRequest, RegistryServiceError,
    },
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn registration_reports_bound_dependencies(mesh: Mesh) {
    mesh.register("weather-a", provider(9001, "weather", "1.0.0", &["fast"]))
        .await;

    let outcome = mesh
        .registry
        .register(AgentRegistration::new(
            "planner",
            consumer(9100, "plan_trip", vec![needs("weather", &[]), needs("geo", &[])]),
        ))
        .await
        .expect("registration should succeed");

    assert_eq!(outcome.event_type, RegistryEventType::Register);
    assert_eq!(outcome.report.total_dependencies, 2);
    assert_eq!(outcome.report.dependencies_resolved, 1);
    let bound = outcome
        .report
        .dependencies
        .get("plan_trip")
        .expect("plan_trip has bindings");
    assert_eq!(bound.len(), 2);
    let first = bound.first().expect("first position");
    assert_eq!(first.dep_index, 0);
    assert_eq!(first.agent_id, "weather-a");
    assert_eq!(first.endpoint, "http://10.0.0.1:9001");
    let second = bound.get(1).expect("second position");
    assert_eq!(second.dep_index, 1);
    assert_eq!(second.capability, "geo");
    assert_eq!(second.status, ResolutionStatus::Unresolved);
    assert!(second.agent_id.is_empty());
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 1).await,
        (ResolutionStatus::Unresolved, None)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unbound_positions_keep_their_slot_in_the_report(mesh: Mesh) {
    mesh.register("weather-a", provider(9001, "weather", "1.0.0", &[]))
        .await;
    let outcome = mesh
        .registry
        .register(AgentRegistration::new(
            "analyst",
            consumer(9100, "analyze", vec![needs("missing", &[]), needs("weather", &[])]),
        ))
        .await
        .expect("registration should succeed");

    let positions = outcome
        .report
        .dependencies
        .get("analyze")
        .expect("analyze has positions");
    assert_eq!(positions.len(), 2);
    let unbound = positions.first().expect("first position");
    assert_eq!(unbound.dep_index, 0);
    assert_eq!(unbound.capability, "missing");
    assert_eq!(unbound.status, ResolutionStatus::Unresolved);
    assert!(unbound.endpoint.is_empty());
    let bound = positions.get(1).expect("second position");
    assert_eq!(bound.dep_index, 1);
    assert_eq!(bound.capability, "weather");
    assert_eq!(bound.status, ResolutionStatus::Available);
    assert_eq!(bound.agent_id, "weather-a");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_registration_is_idempotent(mesh: Mesh) {
    mesh.register("weather-a", provider(9001, "weather", "1.0.0", &[]))
        .await;
    let metadata = consumer(9100, "plan_trip", vec![needs("weather", &[])]);
    mesh.register("planner", metadata.clone()).await;
    let first = mesh.resolutions("planner").await;

    mesh.clock.advance_secs(5);
    mesh.register("planner", metadata).await;
    let second = mesh.resolutions("planner").await;

    assert_eq!(first.dependencies.len(), second.dependencies.len());
    let capabilities = mesh
        .store
        .capabilities_of(&agent("planner"))
        .await
        .expect("capabilities load");
    assert_eq!(capabilities.len(), 1);
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await,
        (ResolutionStatus::Available, Some("weather-a".to_owned()))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reregistration_replaces_the_tool_set(mesh: Mesh) {
    let original = AgentMetadata::new()
        .with_http("10.0.0.1", 9001)
        .with_tool(ToolDeclaration::new("get_weather").with_capability("weather"))
        .with_tool(ToolDeclaration::new("get_tides").with_capability("tides"));
    mesh.register("ocean", original).await;
    mesh.register("surfer", consumer(9100, "plan_surf", vec![needs("tides", &[])]))
        .await;
    assert_eq!(
        mesh.dependency("surfer", "plan_surf", 0).await.0,
        ResolutionStatus::Available
    );

    mesh.clock.advance_secs(5);
    mesh.register(
        "ocean",
        AgentMetadata::new()
            .with_http("10.0.0.1", 9001)
            .with_tool(ToolDeclaration::new("get_weather").with_capability("weather")),
    )
    .await;

    let names: Vec<String> = mesh
        .store
        .capabilities_of(&agent("ocean"))
        .await
        .expect("capabilities load")
        .iter()
        .map(|capability| capability.function_name().to_owned())
        .collect();
    assert_eq!(names, vec!["get_weather".to_owned()]);
    assert_ne!(
        mesh.dependency("surfer", "plan_surf", 0).await.0,
        ResolutionStatus::Available
    );
}

#[rstest]
#[case::capability_renamed(
    ToolDeclaration::new("get_weather").with_capability("forecast").with_tags(["data"]),
    ResolutionStatus::Unresolved
)]
#[case::required_tag_dropped(
    ToolDeclaration::new("get_weather").with_capability("weather"),
    ResolutionStatus::Unavailable
)]
#[case::still_matching(
    ToolDeclaration::new("get_weather")
        .with_capability("weather")
        .with_version("2.0.0")
        .with_tags(["data", "fresh"]),
    ResolutionStatus::Available
)]
#[tokio::test(flavor = "multi_thread")]
async fn tools_changed_in_place_rebind_their_consumers(
    mesh: Mesh,
    #[case] replacement: ToolDeclaration,
    #[case] expected: ResolutionStatus,
) {
    let tool = ToolDeclaration::new("get_weather")
        .with_capability("weather")
        .with_tags(["data"]);
    mesh.register(
        "weather-b",
        AgentMetadata::new().with_http("10.0.0.1", 9001).with_tool(tool),
    )
    .await;
    mesh.register("analyst", consumer(9100, "analyze", vec![needs("weather", &["data"])]))
        .await;
    assert_eq!(
        mesh.dependency("analyst", "analyze", 0).await,
        (ResolutionStatus::Available, Some("weather-b".to_owned()))
    );

    mesh.clock.advance_secs(5);
    mesh.register(
        "weather-b",
        AgentMetadata::new()
            .with_http("10.0.0.1", 9001)
            .with_tool(replacement),
    )
    .await;

    assert_eq!(mesh.dependency("analyst", "analyze", 0).await.0, expected);
    let stored = mesh
        .store
        .find_agent(&agent("analyst"))
        .await
        .expect("lookup succeeds")
        .expect("analyst stored");
    let resolved = u32::from(expected == ResolutionStatus::Available);
    assert_eq!(stored.dependencies_resolved(), resolved);
}

#[rstest]
#[case(
    AgentMetadata::new()
        .with_tool(ToolDeclaration::new("dup"))
        .with_tool(ToolDeclaration::new("dup")),
    "duplicate"
)]
#[case(AgentMetadata::new().with_tool(ToolDeclaration::new("  ")), "function_name")]
#[case(AgentMetadata::new().with_namespace("Not Valid"), "namespace")]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_registrations_are_rejected(
    mesh: Mesh,
    #[case] metadata: AgentMetadata,
    #[case] fragment: &str,
) {
    let metadata_with_tool = if metadata.has_tools() {
        metadata
    } else {
        metadata.with_tool(ToolDeclaration::new("ok"))
    };
    let result = mesh
        .registry
        .register(AgentRegistration::new("broken", metadata_with_tool))
        .await;

    let Err(RegistryServiceError::Domain(err)) = result else {
        panic!("expected a validation error, got {result:?}");
    };
    assert!(err.to_string().contains(fragment), "unexpected message: {err}");
    assert!(
        mesh.store
            .find_agent(&agent("broken"))
            .await
            .expect("lookup succeeds")
            .is_none()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn blank_dependency_capability_is_rejected(mesh: Mesh) {
    let result = mesh
        .registry
        .register(AgentRegistration::new(
            "planner",
            consumer(9100, "plan_trip", vec![needs(" ", &[])]),
        ))
        .await;
    assert!(matches!(
        result,
        Err(RegistryServiceError::Domain(
            RegistryDomainError::MissingDependencyCapability { .. }
        ))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn heartbeat_with_metadata_registers_unknown_agent(mesh: Mesh) {
    let outcome = mesh
        .registry
        .heartbeat(
            HeartbeatRequest::new("weather-a")
                .with_metadata(provider(9001, "weather", "1.0.0", &[])),
        )
        .await
        .expect("heartbeat should succeed");

    let HeartbeatOutcome::Full(full) = outcome else {
        panic!("expected a full heartbeat");
    };
    assert_eq!(full.event_type, RegistryEventType::Register);
    assert_eq!(full.agent.status(), AgentStatus::Healthy);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bare_heartbeat_only_refreshes_the_timestamp(mesh: Mesh) {
    mesh.register("weather-a", provider(9001, "weather", "1.0.0", &[]))
        .await;
    mesh.clock.advance_secs(10);

    let outcome = mesh
        .registry
        .heartbeat(HeartbeatRequest::new("weather-a"))
        .await
        .expect("heartbeat should succeed");
    let HeartbeatOutcome::Touched(touched) = outcome else {
        panic!("expected a lightweight heartbeat");
    };
    assert!(touched.updated_at() > touched.last_full_refresh());

    let capabilities = mesh
        .store
        .capabilities_of(&agent("weather-a"))
        .await
        .expect("capabilities load");
    assert_eq!(capabilities.len(), 1);
    let events = mesh
        .registry
        .agent_events("weather-a")
        .await
        .expect("events load");
    assert_eq!(events.len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fast_heartbeat_signals_topology_changes(mesh: Mesh) {
    mesh.register("planner", consumer(9100, "plan_trip", vec![needs("weather", &[])]))
        .await;
    mesh.clock.advance_secs(1);
    assert_eq!(
        mesh.registry
            .fast_heartbeat_check("planner")
            .await
            .expect("check runs"),
        FastHeartbeatStatus::Unchanged
    );

    mesh.clock.advance_secs(1);
    mesh.register("weather-a", provider(9001, "weather", "1.0.0", &[]))
        .await;
    mesh.clock.advance_secs(1);
    assert_eq!(
        mesh.registry
            .fast_heartbeat_check("planner")
            .await
            .expect("check runs"),
        FastHeartbeatStatus::TopologyChanged
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fast_heartbeat_ignores_the_callers_own_events(mesh: Mesh) {
    mesh.register("weather-a", provider(9001, "weather", "1.0.0", &[]))
        .await;
    mesh.clock.advance_secs(1);
    assert_eq!(
        mesh.registry
            .fast_heartbeat_check("weather-a")
            .await
            .expect("check runs"),
        FastHeartbeatStatus::Unchanged
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unregister_detaches_consumers(mesh: Mesh) {
    mesh.register("weather-a", provider(9001, "weather", "1.0.0", &[]))
        .await;
    mesh.register("planner", consumer(9100, "plan_trip", vec![needs("weather", &[])]))
        .await;

    mesh.clock.advance_secs(3);
    mesh.registry
        .unregister("weather-a")
        .await
        .expect("unregister succeeds");

    let stored = mesh
        .store
        .find_agent(&agent("weather-a"))
        .await
        .expect("lookup succeeds")
        .expect("agent is kept");
    assert_eq!(stored.status(), AgentStatus::Unhealthy);
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await,
        (ResolutionStatus::Unavailable, None)
    );

    let events = mesh
        .registry
        .agent_events("weather-a")
        .await
        .expect("events load");
    let unregister = events
        .iter()
        .find(|event| event.event_type() == RegistryEventType::Unregister)
        .expect("unregister event written");
    assert_eq!(unregister.data()["reason"], "graceful_shutdown");
    assert_eq!(unregister.data()["previous_status"], "healthy");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unregister_rejects_malformed_ids(mesh: Mesh) {
    let result = mesh.registry.unregister("not valid!").await;
    assert!(matches!(result, Err(RegistryServiceError::Domain(_))));
}
