//! Then steps for registry BDD scenarios.

use super::world::{RegistryWorld, agent_id, run_async};
use mesh_registry::registry::{
    domain::{AgentStatus, DependencyResolution},
    ports::RegistryStore,
};
use rstest_bdd_macros::then;

fn dependency_row(
    world: &RegistryWorld,
    consumer: &str,
    function: &str,
    index: u32,
) -> Result<DependencyResolution, eyre::Report> {
    let set = run_async(world.store.resolutions_of(&agent_id(consumer)?))
        .map_err(|err| eyre::eyre!("resolutions_of failed: {err}"))?;
    set.dependencies
        .into_iter()
        .find(|row| row.key() == (function, index))
        .ok_or_else(|| eyre::eyre!("no row for {consumer}/{function}/{index}"))
}

#[then(r#""{consumer}" function "{function}" dependency {index:u32} is bound to "{provider}" function "{provider_function}""#)]
fn dependency_is_bound(
    world: &RegistryWorld,
    consumer: String,
    function: String,
    index: u32,
    provider: String,
    provider_function: String,
) -> Result<(), eyre::Report> {
    let row = dependency_row(world, &consumer, &function, index)?;
    let bound = row
        .outcome
        .provider()
        .ok_or_else(|| eyre::eyre!("expected a bound provider, got {:?}", row.outcome))?;
    if bound.agent_id.as_str() != provider || bound.function_name != provider_function {
        return Err(eyre::eyre!(
            "expected {provider}/{provider_function}, bound to {}/{}",
            bound.agent_id,
            bound.function_name
        ));
    }
    Ok(())
}

#[then(r#""{consumer}" function "{function}" dependency {index:u32} is "{status}""#)]
fn dependency_has_status(
    world: &RegistryWorld,
    consumer: String,
    function: String,
    index: u32,
    status: String,
) -> Result<(), eyre::Report> {
    let row = dependency_row(world, &consumer, &function, index)?;
    let actual = row.outcome.status();
    if actual.as_str() != status {
        return Err(eyre::eyre!("expected status {status}, found {actual:?}"));
    }
    Ok(())
}

#[then(r#"agent "{agent}" is unhealthy"#)]
fn agent_is_unhealthy(world: &RegistryWorld, agent: String) -> Result<(), eyre::Report> {
    let stored = run_async(world.store.find_agent(&agent_id(&agent)?))
        .map_err(|err| eyre::eyre!("find_agent failed: {err}"))?
        .ok_or_else(|| eyre::eyre!("agent '{agent}' is not registered"))?;
    if stored.status() != AgentStatus::Unhealthy {
        return Err(eyre::eyre!("expected '{agent}' unhealthy, found {:?}", stored.status()));
    }
    Ok(())
}

#[then(r#"agent "{agent}" has {count:usize} events"#)]
fn agent_has_events(world: &RegistryWorld, agent: String, count: usize) -> Result<(), eyre::Report> {
    let events = run_async(world.registry.agent_events(&agent))
        .map_err(|err| eyre::eyre!("agent_events failed: {err}"))?;
    if events.len() != count {
        return Err(eyre::eyre!("expected {count} events, found {}", events.len()));
    }
    Ok(())
}
