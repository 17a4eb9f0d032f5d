//! Provider selection: versions, tags, namespaces, alternatives and
//! selection policies.

use super::helpers::{Mesh, consumer, mesh, needs, needs_version, provider};
use mesh_registry::registry::{
    domain::{DependencySlot, DependencySpec, Namespace, ResolutionStatus, SelectionPolicy, ToolDeclaration},
    services::{AgentMetadata, HeartbeatRequest},
};
use rstest::rstest;

async fn versioned_mesh(mesh: &Mesh) {
    mesh.register("calc-v1", provider(9001, "calc", "1.4.2", &[]))
        .await;
    mesh.register("calc-v2", provider(9002, "calc", "2.1.0", &[]))
        .await;
}

#[rstest]
#[case(">=2.0.0", Some("calc-v2"))]
#[case("<2.0.0", Some("calc-v1"))]
#[case("~1.4", Some("calc-v1"))]
#[case("^2", Some("calc-v2"))]
#[case("1.4.2", Some("calc-v1"))]
#[case(">=3.0.0", None)]
#[case("not-a-version", None)]
#[tokio::test(flavor = "multi_thread")]
async fn version_constraints_filter_providers(
    mesh: Mesh,
    #[case] constraint: &str,
    #[case] expected: Option<&str>,
) {
    versioned_mesh(&mesh).await;
    mesh.register(
        "consumer",
        consumer(9100, "compute", vec![needs_version("calc", constraint)]),
    )
    .await;

    let (status, bound) = mesh.dependency("consumer", "compute", 0).await;
    assert_eq!(bound.as_deref(), expected);
    let expected_status = if expected.is_some() {
        ResolutionStatus::Available
    } else {
        ResolutionStatus::Unavailable
    };
    assert_eq!(status, expected_status);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn required_tags_must_all_be_present(mesh: Mesh) {
    mesh.register("llm-claude", provider(9001, "llm", "1.0.0", &["claude"]))
        .await;
    mesh.register(
        "llm-claude-opus",
        provider(9002, "llm", "1.0.0", &["claude", "opus"]),
    )
    .await;
    mesh.register("chat", consumer(9100, "chat", vec![needs("llm", &["claude", "opus"])]))
        .await;

    assert_eq!(
        mesh.dependency("chat", "chat", 0).await,
        (ResolutionStatus::Available, Some("llm-claude-opus".to_owned()))
    );
}

#[rstest]
#[case(&["+fast"], "llm-fast")]
#[case(&["-fast"], "llm-slow")]
#[case(&["+slow", "-fast"], "llm-slow")]
#[tokio::test(flavor = "multi_thread")]
async fn tag_operators_rank_and_exclude(
    mesh: Mesh,
    #[case] tags: &[&str],
    #[case] expected: &str,
) {
    mesh.register("llm-fast", provider(9001, "llm", "1.0.0", &["fast"]))
        .await;
    mesh.register("llm-slow", provider(9002, "llm", "1.0.0", &["slow"]))
        .await;
    mesh.register("chat", consumer(9100, "chat", vec![needs("llm", tags)]))
        .await;

    assert_eq!(
        mesh.dependency("chat", "chat", 0).await.1.as_deref(),
        Some(expected)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn or_alternatives_fall_back_in_order(mesh: Mesh) {
    mesh.register("geo-backup", provider(9002, "geo_backup", "1.0.0", &[]))
        .await;
    let tool = ToolDeclaration::new("locate").with_dependency(DependencySlot::Alternatives(vec![
        DependencySpec::new("geo_primary"),
        DependencySpec::new("geo_backup"),
    ]));
    mesh.register(
        "mapper",
        AgentMetadata::new().with_http("10.0.0.2", 9100).with_tool(tool),
    )
    .await;

    assert_eq!(
        mesh.dependency("mapper", "locate", 0).await,
        (ResolutionStatus::Available, Some("geo-backup".to_owned()))
    );
    let set = mesh.resolutions("mapper").await;
    let row = set.dependencies.first().expect("one row");
    assert_eq!(row.spec.capability, "geo_backup");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dependencies_resolve_within_the_consumer_namespace(mesh: Mesh) {
    mesh.register(
        "weather-prod",
        provider(9001, "weather", "1.0.0", &[]).with_namespace("prod"),
    )
    .await;
    mesh.register(
        "planner-dev",
        consumer(9100, "plan_trip", vec![needs("weather", &[])]).with_namespace("dev"),
    )
    .await;
    mesh.register(
        "planner-cross",
        consumer(
            9101,
            "plan_trip",
            vec![needs("weather", &[]).with_namespace(Namespace::new("prod").expect("valid namespace"))],
        )
        .with_namespace("dev"),
    )
    .await;

    assert_eq!(
        mesh.dependency("planner-dev", "plan_trip", 0).await,
        (ResolutionStatus::Unavailable, None)
    );
    assert_eq!(
        mesh.dependency("planner-cross", "plan_trip", 0).await,
        (ResolutionStatus::Available, Some("weather-prod".to_owned()))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn most_recent_heartbeat_wins_ties(mesh: Mesh) {
    mesh.register("weather-a", provider(9001, "weather", "1.0.0", &[]))
        .await;
    mesh.clock.advance_secs(1);
    mesh.register("weather-b", provider(9002, "weather", "1.0.0", &[]))
        .await;
    mesh.clock.advance_secs(1);
    mesh.registry
        .heartbeat(HeartbeatRequest::new("weather-a"))
        .await
        .expect("heartbeat succeeds");

    mesh.register("planner", consumer(9100, "plan_trip", vec![needs("weather", &[])]))
        .await;
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await.1.as_deref(),
        Some("weather-a")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn first_healthy_prefers_the_earliest_capability() {
    let mesh = Mesh::with_policy(SelectionPolicy::FirstHealthy);
    mesh.register("weather-b", provider(9002, "weather", "1.0.0", &[]))
        .await;
    mesh.clock.advance_secs(1);
    mesh.register("weather-a", provider(9001, "weather", "1.0.0", &[]))
        .await;

    mesh.register("planner", consumer(9100, "plan_trip", vec![needs("weather", &[])]))
        .await;
    assert_eq!(
        mesh.dependency("planner", "plan_trip", 0).await.1.as_deref(),
        Some("weather-b")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn least_loaded_spreads_consumers() {
    let mesh = Mesh::with_policy(SelectionPolicy::LeastLoaded);
    mesh.register("weather-a", provider(9001, "weather", "1.0.0", &[]))
        .await;
    mesh.register("weather-b", provider(9002, "weather", "1.0.0", &[]))
        .await;

    mesh.register("planner-1", consumer(9100, "plan_trip", vec![needs("weather", &[])]))
        .await;
    mesh.register("planner-2", consumer(9101, "plan_trip", vec![needs("weather", &[])]))
        .await;

    let first = mesh.dependency("planner-1", "plan_trip", 0).await.1;
    let second = mesh.dependency("planner-2", "plan_trip", 0).await.1;
    assert_eq!(first.as_deref(), Some("weather-a"));
    assert_eq!(second.as_deref(), Some("weather-b"));
}
