//! Package Sync - push shared packages into dependent repositories
//!
//! Run with `package-sync` or `package-sync --help` for usage.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use package_sync::{
    APP_NAME, Config, SyncRun, TargetOutcome, VERSION,
    git::GitCli,
    mirror::FsMirror,
    review::GitHubClient,
    sync::{Conventions, plan},
};

#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(version = VERSION)]
#[command(about = "Propagate shared package directories to dependent repositories")]
#[command(long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Checkout of the source repository (overrides config)
    #[arg(long)]
    source_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync every dependent repository (default)
    Run,

    /// Show the resolved targets without cloning anything
    Plan,

    /// Show the effective configuration
    Config,
}

fn setup_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
            .add_directive("gix=warn".parse()?)
            .add_directive("reqwest=warn".parse()?)
            .add_directive("hyper=warn".parse()?)
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    Ok(())
}

async fn run_sync(config: Config) -> Result<()> {
    config.validate_for_run()?;

    let vcs = GitCli::new();
    vcs.check_installed().await?;

    let token = config.token.clone().unwrap_or_default();
    let review = GitHubClient::new(&config.api_url, token)?;

    let run = SyncRun::new(config, Arc::new(vcs), Arc::new(review), Arc::new(FsMirror));
    let summary = run.execute().await?;

    for report in &summary.reports {
        match &report.outcome {
            TargetOutcome::Synced { pr } => info!("{}: synced ({:?})", report.short_id, pr),
            TargetOutcome::Clean => info!("{}: up to date", report.short_id),
            TargetOutcome::Failed { state, error } => {
                warn!("{}: failed during {}: {}", report.short_id, state, error)
            }
        }
    }

    Ok(())
}

fn print_plan(config: &Config) -> Result<()> {
    let (_, source_name) = config.source_identity()?;
    let conventions = Conventions::new(source_name);
    let targets = plan(config)?;

    if targets.is_empty() {
        println!("No dependent repositories declared.");
        return Ok(());
    }

    println!("Targets (branch {}):", conventions.sync_branch());
    println!();
    for target in targets {
        println!("  {}/{} ({})", target.owner, target.short_id, target.url);
        for path in &target.package_paths {
            println!("    - {}", path);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.debug)?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.source_dir {
        config.source_dir = dir;
    }

    match cli.command {
        None | Some(Commands::Run) => {
            info!("Starting {} v{}", APP_NAME, VERSION);
            run_sync(config).await?;
        }

        Some(Commands::Plan) => print_plan(&config)?,

        Some(Commands::Config) => {
            let mut shown = config.clone();
            if shown.token.is_some() {
                shown.token = Some("***".to_string());
            }
            println!("{}", toml::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}
