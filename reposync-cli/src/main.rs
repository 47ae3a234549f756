//! Reposync CLI - Command line interface for reposync
//!
//! Publishes generated project workspaces as hosted git repositories.

mod commands;

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reposync_core::{CancellationToken, Config, Secrets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{FindArgs, PushArgs, SecretsArgs};

/// Reposync: publish generated projects to GitLab
#[derive(Parser, Debug)]
#[command(name = "reposync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Provider API base URL (overrides config and env)
    #[arg(long, global = true, env = "REPOSYNC_API_URL")]
    api_url: Option<String>,

    /// Timeout for each git invocation, e.g. "90s" or "5m"
    #[arg(long, global = true, value_parser = parse_duration)]
    git_timeout: Option<Duration>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Publish a workspace as a new repository
    #[command(visible_alias = "p")]
    Push(PushArgs),

    /// Look up an existing repository by name
    Find(FindArgs),

    /// Manage provider tokens
    Secrets(SecretsArgs),

    /// Show current configuration
    Config,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Cancel `token` on the first Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping after the current git step");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays parseable
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    // Load configuration with overrides
    let config = Config::load_with_overrides(cli.api_url.clone(), cli.git_timeout)?;

    if cli.verbose {
        tracing::info!(
            api_url = %config.provider.api_url,
            git = %config.git.program,
            branch = %config.git.branch,
            "Configuration loaded"
        );
    }

    let succeeded = match cli.command {
        Some(Commands::Version) => {
            println!("reposync {}", env!("CARGO_PKG_VERSION"));
            true
        }
        Some(Commands::Push(args)) => {
            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());
            args.execute(&config, &cancel).await?
        }
        Some(Commands::Find(args)) => args.execute(&config).await?,
        Some(Commands::Secrets(args)) => {
            args.execute()?;
            true
        }
        Some(Commands::Config) => {
            print_config(&config);
            true
        }
        None => {
            println!("Reposync - publish generated projects as hosted git repositories");
            println!();
            println!("Use --help for usage information");
            true
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_config(config: &Config) {
    println!("Reposync Configuration");
    println!("======================");
    println!();
    println!("Git Settings:");
    println!("  program: {}", config.git.program);
    println!("  timeout: {:?}", config.git.timeout);
    println!("  remote: {}", config.git.remote);
    println!("  branch: {}", config.git.branch);
    println!("  author: {} <{}>", config.git.author_name, config.git.author_email);
    println!("  commit_message: {}", config.git.commit_message);
    println!("  placeholder: {}", config.git.placeholder);
    if !config.git.extra_config.is_empty() {
        println!("  extra_config: {}", config.git.extra_config.join(", "));
    }
    println!();
    println!("Provider Settings:");
    println!("  api_url: {}", config.provider.api_url);
    println!("  timeout: {:?}", config.provider.timeout);
    println!("  max_attempts: {}", config.provider.max_attempts);
    println!("  retry_backoff: {:?}", config.provider.retry_backoff);
    println!();
    for (label, path) in [
        ("Config file", Config::default_config_path()),
        ("Secrets file", Secrets::default_secrets_path()),
    ] {
        if let Some(path) = path {
            println!("{}: {}", label, path.display());
            if path.exists() {
                println!("  (exists)");
            } else {
                println!("  (not found - using defaults)");
            }
        }
    }
}
