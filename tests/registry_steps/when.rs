//! When steps for registry BDD scenarios.

use super::world::{RegistryWorld, run_async};
use eyre::WrapErr;
use mesh_registry::registry::services::HeartbeatRequest;
use rstest_bdd_macros::when;

#[when(r#""{agent}" sends a heartbeat with its metadata"#)]
fn full_heartbeat(world: &mut RegistryWorld, agent: String) -> Result<(), eyre::Report> {
    let metadata = world
        .declared
        .get(&agent)
        .cloned()
        .ok_or_else(|| eyre::eyre!("agent '{agent}' never registered in this scenario"))?;
    run_async(
        world
            .registry
            .heartbeat(HeartbeatRequest::new(agent.clone()).with_metadata(metadata)),
    )
    .wrap_err_with(|| format!("full heartbeat from {agent}"))?;
    Ok(())
}

#[when(r#""{agent}" sends a bare heartbeat"#)]
fn bare_heartbeat(world: &mut RegistryWorld, agent: String) -> Result<(), eyre::Report> {
    run_async(world.registry.heartbeat(HeartbeatRequest::new(agent.clone())))
        .wrap_err_with(|| format!("bare heartbeat from {agent}"))?;
    Ok(())
}

#[when("{seconds:u32} seconds pass")]
fn seconds_pass(world: &mut RegistryWorld, seconds: u32) {
    world.clock.advance(seconds);
}

#[when("the health sweep runs")]
fn sweep_runs(world: &mut RegistryWorld) -> Result<(), eyre::Report> {
    run_async(world.health.sweep()).wrap_err("health sweep")?;
    Ok(())
}

#[when(r#""{agent}" unregisters"#)]
fn agent_unregisters(world: &mut RegistryWorld, agent: String) -> Result<(), eyre::Report> {
    run_async(world.registry.unregister(&agent))
        .wrap_err_with(|| format!("unregister {agent}"))?;
    Ok(())
}
