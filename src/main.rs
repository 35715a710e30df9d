use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use yo9gag_config::{Component, RuntimeConfig, ServerConfig};

/// Yo a random hot 9GAG link back to whoever Yos the account
#[derive(Parser)]
#[command(name = "yo9gag")]
#[command(version)]
#[command(about = "Yo webhook server and 9GAG hot link uploader", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// HTTP listen port for the webhook server (overrides config file)
    #[arg(short, long, value_name = "PORT", global = true)]
    port: Option<u16>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Yo webhook server
    Serve,
    /// Refresh the candidate links once and exit
    Upload,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = load_config(Component::Server, &cli)?;
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to build tokio runtime")?
                .block_on(yo9gag::run_server(config))
        }
        Commands::Upload => {
            let config = load_config(Component::Uploader, &cli)?;
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to build tokio runtime")?
                .block_on(yo9gag::run_uploader(config))
        }
    }
}

fn load_config(component: Component, cli: &Cli) -> Result<RuntimeConfig> {
    // Step 1: Load base configuration (files, env, defaults)
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(component, config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load(component).context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, component, cli);

    // Step 3: Validate again now that the CLI had its say
    config.validate(component)?;

    Ok(config)
}

fn apply_cli_overrides(config: &mut RuntimeConfig, component: Component, cli: &Cli) {
    if let (Some(port), Component::Server) = (cli.port, component) {
        let server = config.server.get_or_insert_with(ServerConfig::default);
        server.listen_addr = format!("0.0.0.0:{}", port);
    }

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
}
