//! End-to-end mesh behaviour across registration, heartbeats and sweeps.

use super::helpers::{Mesh, agent, consumer, mesh, needs, needs_version, provider};
use mesh_registry::registry::{
    domain::{
        AgentStatus, FilterEntry, FilterMode, LlmToolFilter, ResolutionStatus, TagRequirements,
        ToolDeclaration,
    },
    ports::RegistryStore,
    services::{AgentMetadata, HeartbeatRequest},
};
use rstest::rstest;
use serde_json::json;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn analyze_binds_weather_provider_on_next_heartbeat(mesh: Mesh) {
    let analyzer = consumer(9100, "analyze", vec![needs("weather", &["data"])]);
    mesh.register("agent-a", analyzer.clone()).await;
    assert_eq!(
        mesh.dependency("agent-a", "analyze", 0).await.0,
        ResolutionStatus::Unresolved
    );

    mesh.clock.advance_secs(5);
    mesh.register(
        "agent-b",
        AgentMetadata::new().with_http("10.0.0.9", 9200).with_tool(
            ToolDeclaration::new("get_weather")
                .with_capability("weather")
                .with_tags(["data", "tools"]),
        ),
    )
    .await;

    mesh.clock.advance_secs(5);
    mesh.registry
        .heartbeat(HeartbeatRequest::new("agent-a").with_metadata(analyzer))
        .await
        .expect("heartbeat succeeds");

    let set = mesh.resolutions("agent-a").await;
    let row = set
        .dependencies
        .iter()
        .find(|row| row.key() == ("analyze", 0))
        .expect("analyze/0 row");
    assert_eq!(row.outcome.status(), ResolutionStatus::Available);
    let bound = row.outcome.provider().expect("provider bound");
    assert_eq!(bound.agent_id.as_str(), "agent-b");
    assert_eq!(bound.function_name, "get_weather");
    assert_eq!(bound.endpoint, "http://10.0.0.9:9200");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn version_floor_skips_older_provider(mesh: Mesh) {
    mesh.register("x-old", provider(9001, "x", "0.9.0", &[])).await;
    mesh.register("x-new", provider(9002, "x", "1.2.0", &[])).await;
    mesh.register("user", consumer(9100, "use_x", vec![needs_version("x", ">=1.0.0")]))
        .await;

    assert_eq!(
        mesh.dependency("user", "use_x", 0).await,
        (ResolutionStatus::Available, Some("x-new".to_owned()))
    );
}

#[rstest]
#[case(&["a", "b"], &["a"], true)]
#[case(&["a"], &["a", "b"], false)]
#[tokio::test(flavor = "multi_thread")]
async fn tags_use_and_semantics(
    mesh: Mesh,
    #[case] provided: &[&str],
    #[case] required: &[&str],
    #[case] matches: bool,
) {
    mesh.register("p", provider(9001, "cap", "1.0.0", provided)).await;
    mesh.register("c", consumer(9100, "use_cap", vec![needs("cap", required)]))
        .await;

    let (status, _) = mesh.dependency("c", "use_cap", 0).await;
    assert_eq!(status == ResolutionStatus::Available, matches);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reregistration_keeps_resolution_rows_stable(mesh: Mesh) {
    mesh.register("p", provider(9001, "cap", "1.0.0", &[])).await;
    let metadata = consumer(9100, "use_cap", vec![needs("cap", &[]), needs("missing", &[])]);
    mesh.register("c", metadata.clone()).await;
    let before = mesh.resolutions("c").await;

    mesh.clock.advance_secs(1);
    mesh.register("c", metadata).await;
    let after = mesh.resolutions("c").await;

    let summary = |set: &mesh_registry::registry::domain::ResolutionSet| {
        set.dependencies
            .iter()
            .map(|row| (row.id, row.dep_index, row.outcome.status()))
            .collect::<Vec<_>>()
    };
    assert_eq!(summary(&before), summary(&after));
    assert_eq!(after.dependencies.len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn removing_a_provider_keeps_consumer_rows(mesh: Mesh) {
    mesh.register("p", provider(9001, "cap", "1.0.0", &[])).await;
    mesh.clock.advance_secs(30);
    mesh.register("c", consumer(9100, "use_cap", vec![needs("cap", &[])]))
        .await;

    mesh.clock.advance_secs(31);
    mesh.health.sweep().await.expect("expiry sweep");
    mesh.clock.advance_secs(120);
    mesh.registry
        .heartbeat(HeartbeatRequest::new("c"))
        .await
        .expect("consumer heartbeat");
    mesh.health.sweep().await.expect("eviction sweep");

    assert!(
        mesh.store
            .find_agent(&agent("p"))
            .await
            .expect("lookup succeeds")
            .is_none()
    );
    let (status, bound) = mesh.dependency("c", "use_cap", 0).await;
    assert_ne!(status, ResolutionStatus::Available);
    assert_eq!(bound, None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn expired_agents_are_not_selectable(mesh: Mesh) {
    mesh.register("p", provider(9001, "cap", "1.0.0", &[])).await;
    mesh.clock.advance_secs(61);
    mesh.health.sweep().await.expect("sweep succeeds");

    let stored = mesh
        .store
        .find_agent(&agent("p"))
        .await
        .expect("lookup succeeds")
        .expect("agent kept");
    assert_eq!(stored.status(), AgentStatus::Unhealthy);

    mesh.register("c", consumer(9100, "use_cap", vec![needs("cap", &[])]))
        .await;
    assert_eq!(
        mesh.dependency("c", "use_cap", 0).await,
        (ResolutionStatus::Unavailable, None)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn best_match_keeps_the_highest_tag_overlap(mesh: Mesh) {
    let schema = json!({"type": "object"});
    mesh.register(
        "tools",
        AgentMetadata::new()
            .with_http("10.0.0.3", 9003)
            .with_tool(
                ToolDeclaration::new("summarize_fast")
                    .with_capability("summarize")
                    .with_tags(["fast"])
                    .with_input_schema(schema.clone()),
            )
            .with_tool(
                ToolDeclaration::new("summarize_fast_cheap")
                    .with_capability("summarize")
                    .with_tags(["fast", "cheap"])
                    .with_input_schema(schema),
            ),
    )
    .await;

    let entry = FilterEntry {
        capability: Some("summarize".to_owned()),
        tags: TagRequirements::from_tags(["+fast", "+cheap"]),
        ..FilterEntry::default()
    };
    mesh.register(
        "chat",
        AgentMetadata::new().with_http("10.0.0.5", 9005).with_tool(
            ToolDeclaration::new("chat")
                .with_llm_filter(LlmToolFilter::new(vec![entry], FilterMode::BestMatch)),
        ),
    )
    .await;

    let rows = mesh.resolutions("chat").await.llm_tools;
    assert_eq!(rows.len(), 1);
    let chosen = rows
        .first()
        .and_then(|row| row.outcome.provider())
        .expect("one tool bound");
    assert_eq!(chosen.function_name, "summarize_fast_cheap");
}
