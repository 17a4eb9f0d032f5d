//! Given steps for registry BDD scenarios.

use super::world::{RegistryWorld, run_async, tag_list};
use eyre::WrapErr;
use mesh_registry::registry::{
    domain::{DependencySpec, TagRequirements, ToolDeclaration},
    services::{AgentMetadata, AgentRegistration},
};
use rstest_bdd_macros::given;

fn register(
    world: &mut RegistryWorld,
    agent: String,
    metadata: AgentMetadata,
) -> Result<(), eyre::Report> {
    run_async(
        world
            .registry
            .register(AgentRegistration::new(agent.clone(), metadata.clone())),
    )
    .wrap_err_with(|| format!("register {agent}"))?;
    world.declared.insert(agent, metadata);
    Ok(())
}

#[given(r#"agent "{agent}" declares function "{function}" needing "{capability}" tagged "{tags}""#)]
fn consumer_declares_dependency(
    world: &mut RegistryWorld,
    agent: String,
    function: String,
    capability: String,
    tags: String,
) -> Result<(), eyre::Report> {
    let dependency =
        DependencySpec::new(capability).with_tags(TagRequirements::from_tags(tag_list(&tags)));
    let metadata = AgentMetadata::new()
        .with_http("10.0.0.2", 9100)
        .with_tool(ToolDeclaration::new(function).with_dependency(dependency));
    register(world, agent, metadata)
}

#[given(r#"agent "{agent}" offers "{function}" as "{capability}" tagged "{tags}""#)]
fn provider_offers_capability(
    world: &mut RegistryWorld,
    agent: String,
    function: String,
    capability: String,
    tags: String,
) -> Result<(), eyre::Report> {
    let metadata = AgentMetadata::new().with_http("10.0.0.9", 9200).with_tool(
        ToolDeclaration::new(function)
            .with_capability(capability)
            .with_tags(tag_list(&tags)),
    );
    register(world, agent, metadata)
}
