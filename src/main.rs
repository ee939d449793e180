//! streams-cache - versioned asset-caching proxy
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use streams_cache::cli::{commands, Cli, Commands, Environment};
use streams_cache::config::{Config, ConfigManager, StatePaths};
use streams_cache::error::StreamsResult;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> StreamsResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Loaded config from {}", config_manager.path().display());

    // Config commands must work even when the state directory is unusable
    if let Commands::Config(args) = cli.command {
        return commands::config(args, &config, &config_manager).await;
    }

    let paths = StatePaths::resolve(cli.state_dir.as_deref(), &config);
    debug!("State directory: {}", paths.root().display());
    let env = Environment::new(config, &config_manager, paths);

    match cli.command {
        Commands::Config(_) => unreachable!("Config handled above"),
        Commands::Install => commands::install(&env).await,
        Commands::SkipWaiting => commands::skip_waiting(&env).await,
        Commands::Send(args) => commands::send(args, &env).await,
        Commands::Fetch(args) => commands::fetch(args, &env).await,
        Commands::Caches(args) => commands::caches(args, &env).await,
        Commands::Entries(args) => commands::entries(args, &env).await,
        Commands::Clients(args) => commands::clients(args, &env).await,
        Commands::Status => commands::status(&env).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; JSON lines when `general.log_format = "json"`
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("streams_cache=warn"),
        1 => EnvFilter::new("streams_cache=info"),
        _ => EnvFilter::new("streams_cache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
