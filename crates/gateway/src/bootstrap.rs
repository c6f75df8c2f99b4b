//! AppState construction extracted from `main.rs`, shared by the `serve`
//! and `config validate`/`config show` CLI commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ro_domain::config::{Config, ConfigSeverity};
use ro_domain::model::ToolDefinition;
use ro_providers::HttpProviderClient;
use ro_store::MemoryStoreGateway;

use crate::auth::AuthBinding;
use crate::runtime::{HttpToolRegistry, ToolRegistry};
use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`]. This is the shared boot path for `serve` and the
/// diagnostic `config` subcommands.
pub fn build_app_state(config: Arc<Config>, state_dir: PathBuf) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let store: Arc<dyn ro_store::StoreGateway> =
        Arc::new(MemoryStoreGateway::new(&state_dir).context("initializing store gateway")?);
    tracing::info!(path = %state_dir.display(), "store gateway ready");

    let provider_timeout = Duration::from_secs(config.provider.default_timeout_secs);
    let api_key = std::env::var("RO_PROVIDER_API_KEY").ok();
    let provider: Arc<dyn ro_providers::LlmProvider> = Arc::new(
        HttpProviderClient::new(config.provider.llm_base_url.clone(), api_key, provider_timeout)
            .context("initializing LLM provider client")?,
    );
    tracing::info!(base_url = %config.provider.llm_base_url, "provider client ready");

    let tools = Arc::new(HttpToolRegistry::new(config.provider.llm_base_url.clone(), default_tool_catalogue()));
    tracing::info!(tools = tools.list().len(), "tool registry ready");

    let auth = Arc::new(AuthBinding::new(config.auth.clone()));
    if config.auth.auth_enabled {
        tracing::info!(issuer = %config.auth.issuer, "auth binding ready (JWT + API key)");
    } else {
        tracing::warn!("auth DISABLED — all requests resolve to the anonymous principal");
    }

    Ok(AppState::new(config, store, provider, tools, auth))
}

/// Placeholder catalogue until a real tool-definition source (config file
/// or discovery endpoint) is wired in; the registry's contract is what
/// matters to the orchestrator; this crate supplies no tools of its own.
fn default_tool_catalogue() -> Vec<ToolDefinition> {
    Vec::new()
}
