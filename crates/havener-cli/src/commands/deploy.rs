//! Deploy command - install or upgrade every release of a configuration

use console::style;
use havener_core::{Config, ShellRunner};
use havener_kube::{DeployPipeline, HelmCli};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::display::ConsoleReporter;
use crate::error::{CliError, Result};

/// Run the deploy command
pub async fn run(config_path: &Path, timeout_minutes: u64) -> Result<()> {
    let config = Config::from_file(config_path).map_err(CliError::config_load)?;

    println!(
        "{} Deploying {} release(s) from {}",
        style("→").blue().bold(),
        config.releases.len(),
        style(config_path.display()).cyan()
    );

    let pipeline = DeployPipeline::new(
        Arc::new(HelmCli::new()),
        Arc::new(ShellRunner::new()),
        Arc::new(ConsoleReporter),
    )
    .timeout(Duration::from_secs(timeout_minutes * 60));

    let report = pipeline.run(&config).await.map_err(CliError::cluster)?;

    if report.deployed.is_empty() {
        println!("{} No releases to deploy", style("✓").green().bold());
    } else {
        println!(
            "{} Deployed {}",
            style("✓").green().bold(),
            style(report.deployed.join(", ")).cyan()
        );
    }

    Ok(())
}
