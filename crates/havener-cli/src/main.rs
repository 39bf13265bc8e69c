//! Havener CLI - deploy and purge Helm releases from one configuration file

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;

use error::Result;

#[derive(Parser)]
#[command(name = "havener")]
#[command(author = "Havener Contributors")]
#[command(version)]
#[command(about = "Deploy and purge Helm releases from a single configuration file", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy all releases of a configuration file
    Deploy {
        /// Configuration file
        #[arg(short, long, env = "DEPLOYMENT_CONFIG")]
        config: PathBuf,

        /// Helm timeout per release, in minutes
        #[arg(short, long, env = "DEPLOYMENT_TIMEOUT", default_value_t = 40)]
        timeout: u64,
    },

    /// Delete releases together with their namespaces
    Purge {
        /// Release names
        #[arg(required = true)]
        releases: Vec<String>,
    },

    /// Print a configuration with all shell operators evaluated
    Render {
        /// Configuration file
        #[arg(short, long, env = "DEPLOYMENT_CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.debug { "debug" } else { "info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Deploy { config, timeout } => commands::deploy::run(&config, timeout).await,
        Commands::Purge { releases } => commands::purge::run(&releases).await,
        Commands::Render { config } => commands::render::run(&config),
    }
}
