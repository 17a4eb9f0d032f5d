//! Application services for registration, resolution and health.

mod health;
mod llm;
mod registration;
mod resolution;

pub use health::{HealthMonitor, HealthSettings, ServiceHealth, SweepReport};
pub use llm::{
    LlmProviderInfo, LlmResolutionEngine, LlmToolInfo, ResolvedProviderSelector,
    ResolvedToolFilter,
};
pub use registration::{
    AgentMetadata, AgentQuery, AgentRegistration, AgentView, FastHeartbeatStatus,
    HeartbeatOutcome, HeartbeatRequest, RegistrationOutcome, RegistryService,
    RegistryServiceError, RegistryServiceResult,
};
pub use resolution::{
    ComputedResolutions, ResolutionEngine, ResolutionReport, ResolutionService,
    ResolutionServiceError, ResolvedDependency, overlay_candidates,
};
