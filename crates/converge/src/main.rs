mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use converge_core::PollSettings;
use converge_remote::{ClientConfig, ControlPlaneClient, RepositoryOnboarding};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "converge")]
#[command(about = "Reconcile remote resources and wait for them to settle", long_about = None)]
struct Cli {
    /// Settings file; without it CONVERGE_CONFIG_PATH, ./converge.yaml and
    /// ~/.config/converge/config.yaml are tried in that order
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the delta between two JSON label files
    Diff {
        /// Desired labels (JSON object of key -> value)
        #[arg(long)]
        desired: PathBuf,
        /// Observed labels (JSON object of key -> value)
        #[arg(long)]
        observed: PathBuf,
    },
    /// Validate an "all items" flag against its item list
    Normalize {
        /// Name of the boolean field, e.g. all_spaces
        #[arg(long)]
        flag_field: String,
        /// Name of the list field, e.g. spaces
        #[arg(long)]
        list_field: String,
        /// Explicit flag value (left unset when omitted)
        #[arg(long)]
        all: Option<bool>,
        /// Comma-separated items
        #[arg(long, value_delimiter = ',')]
        items: Option<Vec<String>>,
    },
    /// Converge the labels of a remote resource
    Labels {
        /// Resource ID
        resource_id: String,
        /// Desired labels (JSON object of key -> value)
        #[arg(long)]
        desired: PathBuf,
        /// Print the delta without applying it
        #[arg(long)]
        dry_run: bool,
    },
    /// Onboard a repository and wait until it is connected
    Onboard {
        /// Repository name
        repository: String,
        /// Default branch to track
        #[arg(long)]
        default_branch: Option<String>,
        /// Give up after this many seconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,
        /// Seconds between status checks
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries command output, logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Version => {
            println!("converge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Diff { desired, observed } => commands::diff::handle(&desired, &observed),
        Commands::Normalize {
            flag_field,
            list_field,
            all,
            items,
        } => commands::normalize::handle(flag_field, list_field, all, items),
        Commands::Labels {
            resource_id,
            desired,
            dry_run,
        } => {
            let settings = converge_config::load(cli.config.as_deref())?;
            let client = connect(&settings)?;
            commands::labels::handle(&client, &resource_id, &desired, dry_run).await
        }
        Commands::Onboard {
            repository,
            default_branch,
            timeout,
            interval,
        } => {
            let settings = converge_config::load(cli.config.as_deref())?;
            let client = connect(&settings)?;

            let poll = PollSettings::default()
                .with_interval(
                    interval
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| settings.poll.interval()),
                )
                .with_timeout(
                    timeout
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| settings.poll.timeout()),
                )
                .with_max_probe_errors(settings.poll.max_probe_errors);

            let mut spec = RepositoryOnboarding::new(repository);
            if let Some(branch) = default_branch {
                spec = spec.with_default_branch(branch);
            }
            commands::onboard::handle(&client, spec, poll).await
        }
    }
}

fn connect(settings: &converge_config::Settings) -> anyhow::Result<ControlPlaneClient> {
    let base_url = settings.api.base_url.clone().with_context(|| {
        format!(
            "api.base_url is not configured (set it in converge.yaml or {})",
            converge_config::API_URL_ENV
        )
    })?;

    let mut config = ClientConfig::new(base_url);
    match settings.api.token() {
        Some(token) => config = config.with_token(token),
        None => tracing::warn!(
            "{} is not set, sending requests without a bearer token",
            settings.api.token_env
        ),
    }

    Ok(ControlPlaneClient::new(config)?)
}
