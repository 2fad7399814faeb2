//! ChatVault - Terminal AI chat client
//!
//! Main entry point: tracing setup, configuration load, command dispatch.

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatvault::cli::{Cli, Commands};
use chatvault::commands;
use chatvault::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse_args();

    // Mirror a CLI storage override into the env var so every storage
    // opener sees the same directory.
    if let Some(data_dir) = &cli.storage_path {
        std::env::set_var("CHATVAULT_DATA_DIR", data_dir);
        tracing::info!("Using storage directory override from CLI: {}", data_dir);
    }

    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;
    config.validate()?;

    match cli.command {
        Commands::Chat { resume, model } => {
            tracing::info!("Starting interactive chat session");
            if let Some(r) = &resume {
                tracing::debug!("Resuming conversation: {}", r);
            }
            if let Some(m) = &model {
                tracing::debug!("Using model override: {}", m);
            }
            commands::chat::run_chat(config, resume, model).await?;
            Ok(())
        }
        Commands::History { command } => {
            commands::history::handle_history(&config, command)?;
            Ok(())
        }
        Commands::Storage { command } => {
            commands::storage::handle_storage(&config, command)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatvault=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
