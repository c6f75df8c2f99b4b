use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ro_gateway::cli::{Cli, Command, ConfigCommand};
use ro_gateway::{api, bootstrap};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = ro_gateway::cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = ro_gateway::cli::load_config()?;
            let valid = ro_gateway::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = ro_gateway::cli::load_config()?;
            ro_gateway::cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("response-orchestrator {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ro_gateway=debug")))
        .json()
        .init();
}

async fn run_server(config: Arc<ro_domain::config::Config>) -> anyhow::Result<()> {
    tracing::info!("response-orchestrator starting");

    let state_dir = std::env::var("RO_STATE_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("./data"));

    let state = bootstrap::build_app_state(config.clone(), state_dir)?;

    let shutdown = tokio::sync::watch::channel(false);
    let workers = ro_gateway::runtime::spawn_workers(Arc::new(state.clone()), shutdown.1);
    tracing::info!(worker_count = workers.len(), "background worker pool started");

    let app = api::router(state.clone()).with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "response-orchestrator listening");

    axum::serve(listener, app).await.context("axum server error")?;

    let _ = shutdown.0.send(true);
    Ok(())
}
