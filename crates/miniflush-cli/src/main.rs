use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use miniflush_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "miniflush")]
#[command(author, version, about = "Mark stale unread Miniflux entries as read")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the YAML config file
    #[arg(short = 'c', long = "config", env = "MINIFLUSH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark unread entries older than their expiry as read (default)
    Sweep {
        /// Only report what would be marked
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate the config, every expiry, and the API credentials
    Check,
    /// List categories on the server with their ids
    Categories,
    /// Print the cutoff timestamp for a duration expression
    Expiry {
        /// Duration such as "30d", "2 weeks" or "1h30m"
        expr: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;

    match cli.command.unwrap_or(Commands::Sweep { dry_run: false }) {
        Commands::Sweep { dry_run } => {
            commands::sweep::run(&load_config(config_path)?, dry_run).await
        }
        Commands::Check => commands::check::run(&load_config(config_path)?).await,
        Commands::Categories => commands::categories::run(&load_config(config_path)?).await,
        Commands::Expiry { expr } => commands::expiry::run(&expr),
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<AppConfig> {
    let path = AppConfig::resolve_path(explicit.as_deref());
    AppConfig::load(&path).with_context(|| format!("Failed to load config from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sweep_is_default_and_flags_are_global() {
        let cli = Cli::try_parse_from(["miniflush", "-c", "/tmp/mf.yml"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/mf.yml")));

        let cli = Cli::try_parse_from(["miniflush", "sweep", "--dry-run", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Sweep { dry_run: true })));
    }

    #[tokio::test]
    async fn test_missing_config_fails_run() {
        let path = std::env::temp_dir()
            .join("miniflush-cli-missing")
            .join("config.yml");

        for command in [Commands::Sweep { dry_run: true }, Commands::Check, Commands::Categories] {
            let cli = Cli {
                command: Some(command),
                config: Some(path.clone()),
                verbose: false,
            };
            let err = run(cli).await.unwrap_err();
            assert!(format!("{:#}", err).contains("Failed to load config"));
        }
    }

    #[tokio::test]
    async fn test_expiry_needs_no_config() {
        let cli = Cli {
            command: Some(Commands::Expiry {
                expr: "1 day".to_string(),
            }),
            config: Some(std::env::temp_dir().join("miniflush-cli-missing").join("config.yml")),
            verbose: false,
        };
        assert!(run(cli).await.is_ok());
    }

    #[test]
    fn test_expiry_takes_expression() {
        let cli = Cli::try_parse_from(["miniflush", "expiry", "2 weeks"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Expiry { ref expr }) if expr == "2 weeks"));
    }
}
