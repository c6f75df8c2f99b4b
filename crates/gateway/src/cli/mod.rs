pub mod config;

use clap::{Parser, Subcommand};

/// response-orchestrator — asynchronous LLM response orchestration core.
#[derive(Debug, Parser)]
#[command(name = "response-orchestrator", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP gateway (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load the configuration from the path named by `RO_CONFIG` (default
/// `config.toml`). Returns the parsed [`Config`] and the path used.
pub fn load_config() -> anyhow::Result<(ro_domain::config::Config, String)> {
    let config_path = std::env::var("RO_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path).map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        ro_domain::config::Config::default()
    };

    Ok((config, config_path))
}
