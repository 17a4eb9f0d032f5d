//! LLM tool discovery and provider selection.

use super::helpers::{Mesh, mesh};
use mesh_registry::registry::{
    domain::{
        DependencySpec, FilterEntry, FilterMode, LlmToolFilter, ResolutionStatus, TagRequirements,
        ToolDeclaration,
    },
    services::{AgentMetadata, AgentRegistration, RegistrationOutcome},
};
use rstest::rstest;
use serde_json::json;

fn schema_tool(function_name: &str, capability: &str, version: &str, tags: &[&str]) -> ToolDeclaration {
    ToolDeclaration::new(function_name)
        .with_capability(capability)
        .with_version(version)
        .with_tags(tags.iter().copied())
        .with_input_schema(json!({"type": "object", "properties": {"query": {"type": "string"}}}))
}

async fn tool_mesh(mesh: &Mesh) {
    mesh.register(
        "search-agent",
        AgentMetadata::new()
            .with_http("10.0.0.3", 9003)
            .with_tool(schema_tool("web_search", "search", "1.0.0", &["web"]))
            .with_tool(schema_tool("web_search_v2", "search", "2.0.0", &["web"]))
            .with_tool(ToolDeclaration::new("raw_search").with_capability("search")),
    )
    .await;
    mesh.register(
        "docs-agent",
        AgentMetadata::new()
            .with_http("10.0.0.4", 9004)
            .with_tool(schema_tool("read_pdf", "pdf", "1.0.0", &["ocr"])),
    )
    .await;
}

async fn register_chat(mesh: &Mesh, filter: LlmToolFilter) -> RegistrationOutcome {
    mesh.registry
        .register(AgentRegistration::new(
            "chat-agent",
            AgentMetadata::new()
                .with_http("10.0.0.5", 9005)
                .with_tool(ToolDeclaration::new("chat").with_llm_filter(filter)),
        ))
        .await
        .expect("chat registration succeeds")
}

fn tool_names(outcome: &RegistrationOutcome) -> Vec<String> {
    let mut names: Vec<String> = outcome
        .report
        .llm_tools
        .get("chat")
        .expect("chat has a tool list")
        .iter()
        .map(|tool| tool.name.clone())
        .collect();
    names.sort();
    names
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn filter_returns_schema_bearing_tools_only(mesh: Mesh) {
    tool_mesh(&mesh).await;
    let outcome = register_chat(
        &mesh,
        LlmToolFilter::new(vec![FilterEntry::capability("search")], FilterMode::All),
    )
    .await;

    assert_eq!(
        tool_names(&outcome),
        vec!["web_search".to_owned(), "web_search_v2".to_owned()]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn best_match_keeps_the_highest_version_per_capability(mesh: Mesh) {
    tool_mesh(&mesh).await;
    let outcome = register_chat(
        &mesh,
        LlmToolFilter::new(
            vec![FilterEntry::capability("search"), FilterEntry::capability("pdf")],
            FilterMode::BestMatch,
        ),
    )
    .await;

    assert_eq!(
        tool_names(&outcome),
        vec!["read_pdf".to_owned(), "web_search_v2".to_owned()]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tag_entries_narrow_the_selection(mesh: Mesh) {
    tool_mesh(&mesh).await;
    let entry = FilterEntry {
        tags: TagRequirements::from_tags(["ocr"]),
        ..FilterEntry::default()
    };
    let outcome = register_chat(&mesh, LlmToolFilter::new(vec![entry], FilterMode::All)).await;

    assert_eq!(tool_names(&outcome), vec!["read_pdf".to_owned()]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn wildcard_selects_every_other_agents_tools(mesh: Mesh) {
    tool_mesh(&mesh).await;
    let outcome = register_chat(
        &mesh,
        LlmToolFilter::new(vec![FilterEntry::capability("*")], FilterMode::All),
    )
    .await;

    assert_eq!(
        tool_names(&outcome),
        vec![
            "read_pdf".to_owned(),
            "web_search".to_owned(),
            "web_search_v2".to_owned()
        ]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unmatched_filters_still_report_an_empty_list(mesh: Mesh) {
    let outcome = register_chat(
        &mesh,
        LlmToolFilter::new(vec![FilterEntry::capability("translate")], FilterMode::All),
    )
    .await;

    assert!(tool_names(&outcome).is_empty());
    let rows = mesh.resolutions("chat-agent").await.llm_tools;
    assert_eq!(rows.len(), 1);
    assert!(
        rows.iter()
            .all(|row| row.outcome.status() == ResolutionStatus::Unresolved)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn provider_selector_binds_a_schema_bearing_provider(mesh: Mesh) {
    mesh.register(
        "claude-provider",
        AgentMetadata::new().with_http("10.0.0.6", 9006).with_tool(
            schema_tool("claude_chat", "llm", "1.0.0", &["claude"])
                .with_kwargs(json!({"vendor": "anthropic"})),
        ),
    )
    .await;
    mesh.register(
        "schemaless-provider",
        AgentMetadata::new().with_http("10.0.0.7", 9007).with_tool(
            ToolDeclaration::new("other_chat")
                .with_capability("llm")
                .with_tags(["claude"]),
        ),
    )
    .await;

    let outcome = mesh
        .registry
        .register(AgentRegistration::new(
            "assistant",
            AgentMetadata::new().with_http("10.0.0.8", 9008).with_tool(
                ToolDeclaration::new("answer").with_llm_provider(
                    DependencySpec::new("llm").with_tags(TagRequirements::from_tags(["claude"])),
                ),
            ),
        ))
        .await
        .expect("assistant registration succeeds");

    let chosen = outcome
        .report
        .llm_providers
        .get("answer")
        .expect("provider resolved");
    assert_eq!(chosen.agent_id, "claude-provider");
    assert_eq!(chosen.name, "claude_chat");
    assert_eq!(chosen.vendor, "anthropic");
    assert_eq!(chosen.endpoint, "http://10.0.0.6:9006");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn provider_selector_waits_for_a_provider(mesh: Mesh) {
    let outcome = mesh
        .registry
        .register(AgentRegistration::new(
            "assistant",
            AgentMetadata::new()
                .with_http("10.0.0.8", 9008)
                .with_tool(ToolDeclaration::new("answer").with_llm_provider(DependencySpec::new("llm"))),
        ))
        .await
        .expect("assistant registration succeeds");
    assert!(outcome.report.llm_providers.is_empty());

    mesh.register(
        "claude-provider",
        AgentMetadata::new()
            .with_http("10.0.0.6", 9006)
            .with_tool(schema_tool("claude_chat", "llm", "1.0.0", &[])),
    )
    .await;

    let rows = mesh.resolutions("assistant").await.llm_providers;
    let row = rows.first().expect("provider row exists");
    assert_eq!(row.outcome.status(), ResolutionStatus::Available);
    assert_eq!(
        row.outcome
            .provider()
            .map(|provider| provider.agent_id.as_str()),
        Some("claude-provider")
    );
}
