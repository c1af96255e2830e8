use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repomirror::run::{execute, load_work};
use repomirror::{notify, Config, GitClient};

#[derive(Parser)]
#[command(name = "repomirror")]
#[command(about = "Branch-for-branch git repository mirroring")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror every repository pair (default)
    Run,

    /// Load and pair the manifests without touching any repository
    Check,
}

const BANNER: &str = r"
 ____                    __  __ _
|  _ \ ___ _ __   ___   |  \/  (_)_ __ _ __ ___  _ __
| |_) / _ \ '_ \ / _ \  | |\/| | | '__| '__/ _ \| '__|
|  _ <  __/ |_) | (_) | | |  | | | |  | | | (_) | |
|_| \_\___| .__/ \___/  |_|  |_|_|_|  |_|  \___/|_|
          |_|
";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config)?;
    init_logging(cli.verbose, &config.logging.level)?;
    info!("Starting repomirror v{}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(&config).await,
        Commands::Check => cmd_check(&config),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let default_level = if verbose { "debug" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

/// Mirror all configured pairs and print the summary
async fn cmd_run(config: &Config) -> Result<()> {
    println!("{}", BANNER);
    println!("{:^56}\n", config.report.title);

    let notifier = notify::from_config(config)?;
    let vcs = Arc::new(GitClient::new(config.git.timeout));

    let report = execute(config, vcs, notifier).await?;

    println!("\n{}", report.render_table());
    Ok(())
}

/// Show what a run would do
fn cmd_check(config: &Config) -> Result<()> {
    let pairs = load_work(config)?;

    println!("📋 {} repository pairs", pairs.len());
    for pair in &pairs {
        println!(
            "  [{}] {} → {}",
            pair.index, pair.source, pair.destination
        );
    }

    Ok(())
}
