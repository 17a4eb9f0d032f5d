//! Diesel schema for registry persistence.

diesel::table! {
    /// Registered agents.
    agents (agent_id) {
        /// Agent identifier.
        #[max_length = 253]
        agent_id -> Varchar,
        /// Human-readable name.
        #[max_length = 255]
        name -> Varchar,
        /// Agent build version.
        #[max_length = 64]
        version -> Varchar,
        /// Dependency scoping namespace.
        #[max_length = 63]
        namespace -> Varchar,
        /// Agent kind.
        #[max_length = 32]
        agent_type -> Varchar,
        /// SDK runtime.
        #[max_length = 32]
        runtime -> Nullable<Varchar>,
        /// MCP host.
        #[max_length = 255]
        http_host -> Varchar,
        /// MCP port; zero for stdio.
        http_port -> Int4,
        /// Health status.
        #[max_length = 16]
        status -> Varchar,
        /// Declared dependency positions.
        total_dependencies -> Int4,
        /// Bound dependency positions.
        dependencies_resolved -> Int4,
        /// First registration time.
        created_at -> Timestamptz,
        /// Last heartbeat time.
        updated_at -> Timestamptz,
        /// Last full registration or heartbeat time.
        last_full_refresh -> Timestamptz,
    }
}

diesel::table! {
    /// Tools exposed by agents.
    capabilities (id) {
        /// Row identifier.
        id -> Uuid,
        /// Owning agent.
        #[max_length = 253]
        agent_id -> Varchar,
        /// Tool function name.
        #[max_length = 255]
        function_name -> Varchar,
        /// Capability name.
        #[max_length = 255]
        capability -> Varchar,
        /// Capability version.
        #[max_length = 64]
        version -> Varchar,
        /// Tool description.
        description -> Nullable<Text>,
        /// Tool input JSON schema.
        input_schema -> Nullable<Jsonb>,
        /// LLM tool filter.
        llm_filter -> Nullable<Jsonb>,
        /// LLM provider selector.
        llm_provider -> Nullable<Jsonb>,
        /// Advertised tags.
        tags -> Jsonb,
        /// Opaque SDK keyword arguments.
        kwargs -> Nullable<Jsonb>,
        /// Positional dependency list.
        dependencies -> Jsonb,
        /// Declaration order within the agent.
        position -> Int4,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last content change.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Bindings of positional dependencies.
    dependency_resolutions (id) {
        /// Row identifier.
        id -> Uuid,
        /// Consumer agent.
        #[max_length = 253]
        consumer_agent_id -> Varchar,
        /// Consumer function.
        #[max_length = 255]
        consumer_function_name -> Varchar,
        /// Dependency position.
        dep_index -> Int4,
        /// Required capability.
        #[max_length = 255]
        capability_required -> Varchar,
        /// Required tags.
        tags_required -> Jsonb,
        /// Version constraint.
        #[max_length = 255]
        version_required -> Varchar,
        /// Namespace the requirement was matched in.
        #[max_length = 63]
        namespace_required -> Varchar,
        /// Bound provider agent.
        #[max_length = 253]
        provider_agent_id -> Nullable<Varchar>,
        /// Bound provider function.
        #[max_length = 255]
        provider_function_name -> Nullable<Varchar>,
        /// Bound provider capability.
        #[max_length = 255]
        provider_capability -> Nullable<Varchar>,
        /// Provider endpoint.
        #[max_length = 512]
        endpoint -> Nullable<Varchar>,
        /// Resolution status.
        #[max_length = 16]
        status -> Varchar,
        /// When the binding was made.
        resolved_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Tools discovered for LLM filters.
    llm_tool_resolutions (id) {
        /// Row identifier.
        id -> Uuid,
        /// Consumer agent.
        #[max_length = 253]
        consumer_agent_id -> Varchar,
        /// Consumer function.
        #[max_length = 255]
        consumer_function_name -> Varchar,
        /// Filter entry capability.
        #[max_length = 255]
        filter_capability -> Nullable<Varchar>,
        /// Filter entry tags.
        filter_tags -> Jsonb,
        /// Filter mode.
        #[max_length = 16]
        filter_mode -> Varchar,
        /// Discovered provider agent.
        #[max_length = 253]
        provider_agent_id -> Nullable<Varchar>,
        /// Discovered provider function.
        #[max_length = 255]
        provider_function_name -> Nullable<Varchar>,
        /// Discovered provider capability.
        #[max_length = 255]
        provider_capability -> Nullable<Varchar>,
        /// Provider endpoint.
        #[max_length = 512]
        endpoint -> Nullable<Varchar>,
        /// Resolution status.
        #[max_length = 16]
        status -> Varchar,
        /// Order within the consumer.
        position -> Int4,
        /// When the row was written.
        resolved_at -> Timestamptz,
    }
}

diesel::table! {
    /// Providers chosen for LLM provider selectors.
    llm_provider_resolutions (id) {
        /// Row identifier.
        id -> Uuid,
        /// Consumer agent.
        #[max_length = 253]
        consumer_agent_id -> Varchar,
        /// Consumer function.
        #[max_length = 255]
        consumer_function_name -> Varchar,
        /// Required capability.
        #[max_length = 255]
        required_capability -> Varchar,
        /// Required tags.
        required_tags -> Jsonb,
        /// Version constraint.
        #[max_length = 255]
        required_version -> Varchar,
        /// Namespace the selector was matched in.
        #[max_length = 63]
        required_namespace -> Varchar,
        /// Bound provider agent.
        #[max_length = 253]
        provider_agent_id -> Nullable<Varchar>,
        /// Bound provider function.
        #[max_length = 255]
        provider_function_name -> Nullable<Varchar>,
        /// Bound provider capability.
        #[max_length = 255]
        provider_capability -> Nullable<Varchar>,
        /// Provider endpoint.
        #[max_length = 512]
        endpoint -> Nullable<Varchar>,
        /// Resolution status.
        #[max_length = 16]
        status -> Varchar,
        /// When the binding was made.
        resolved_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Append-only registry events.
    registry_events (id) {
        /// Event identifier.
        id -> Uuid,
        /// Agent the event concerns.
        #[max_length = 253]
        agent_id -> Varchar,
        /// Event type.
        #[max_length = 16]
        event_type -> Varchar,
        /// Function the event concerns.
        #[max_length = 255]
        function_name -> Nullable<Varchar>,
        /// Event time.
        timestamp -> Timestamptz,
        /// Event payload.
        data -> Jsonb,
    }
}

diesel::joinable!(capabilities -> agents (agent_id));
diesel::joinable!(registry_events -> agents (agent_id));

diesel::allow_tables_to_appear_in_same_query!(
    agents,
    capabilities,
    dependency_resolutions,
    llm_tool_resolutions,
    llm_provider_resolutions,
    registry_events,
);
