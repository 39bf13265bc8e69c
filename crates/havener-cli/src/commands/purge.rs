//! Purge command - delete releases together with their namespaces

use console::style;
use havener_kube::{HelmCli, KubeResourceStore, Purger};
use std::sync::Arc;

use crate::display::{ConsoleReporter, StdinConfirmation};
use crate::error::{CliError, Result};

/// Run the purge command
pub async fn run(releases: &[String]) -> Result<()> {
    let helm = HelmCli::new();
    let version = helm.verify().await.map_err(|e| {
        CliError::cluster(e).with_help("make sure helm is installed and on the PATH")
    })?;
    tracing::debug!(version = %version, "using helm");

    let store = KubeResourceStore::new().await.map_err(CliError::cluster)?;
    let purger = Purger::new(Arc::new(helm), Arc::new(store), Arc::new(ConsoleReporter));

    let summary = purger
        .purge_releases(releases, &StdinConfirmation)
        .await
        .map_err(CliError::cluster)?;

    if summary.declined {
        println!("{} Purge cancelled", style("✗").yellow().bold());
    } else if !summary.releases.is_empty() {
        println!(
            "{} Purged {}",
            style("✓").green().bold(),
            style(summary.releases.join(", ")).cyan()
        );
    }

    Ok(())
}
