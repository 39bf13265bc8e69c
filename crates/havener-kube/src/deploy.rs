//! Release deploy pipeline
//!
//! ```text
//! Init -> PreHooks -> Release(0) -> ... -> Release(n-1) -> PostHooks -> Done
//!   \________\______________\____________________\____________\--> Failed
//! ```
//!
//! Releases are deployed strictly in declared order. The first failure aborts
//! the run, releases that were already deployed stay in place.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use havener_core::{CommandRunner, Config, ConfigNode, ReleaseSpec, Templater};

use crate::error::{Result, ResultExt};
use crate::helm::{DeployRequest, ReleaseService};
use crate::hooks::HookRunner;
use crate::reporter::Reporter;

/// How long Helm may wait for a release unless configured otherwise
pub const DEFAULT_DEPLOY_TIMEOUT: Duration = Duration::from_secs(40 * 60);

/// Position of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    Init,
    PreHooks,
    /// Deploying the release at this index
    Release(usize),
    PostHooks,
    Done,
    Failed,
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployStage::Init => write!(f, "init"),
            DeployStage::PreHooks => write!(f, "pre-hooks"),
            DeployStage::Release(index) => write!(f, "release #{}", index + 1),
            DeployStage::PostHooks => write!(f, "post-hooks"),
            DeployStage::Done => write!(f, "done"),
            DeployStage::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a successful pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    /// Release names in deployment order
    pub deployed: Vec<String>,
}

/// Deploys every release of a [`Config`]
pub struct DeployPipeline {
    releases: Arc<dyn ReleaseService>,
    runner: Arc<dyn CommandRunner>,
    reporter: Arc<dyn Reporter>,
    hooks: HookRunner,
    timeout: Duration,
}

impl DeployPipeline {
    pub fn new(
        releases: Arc<dyn ReleaseService>,
        runner: Arc<dyn CommandRunner>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let hooks = HookRunner::new(Arc::clone(&runner), Arc::clone(&reporter));
        Self {
            releases,
            runner,
            reporter,
            hooks,
            timeout: DEFAULT_DEPLOY_TIMEOUT,
        }
    }

    /// Set the per-release Helm timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the whole pipeline
    pub async fn run(&self, config: &Config) -> Result<DeployReport> {
        self.enter(DeployStage::Init);

        match self.run_stages(config).await {
            Ok(report) => {
                self.enter(DeployStage::Done);
                Ok(report)
            }
            Err(e) => {
                self.enter(DeployStage::Failed);
                Err(e)
            }
        }
    }

    async fn run_stages(&self, config: &Config) -> Result<DeployReport> {
        let mut report = DeployReport::default();

        self.enter(DeployStage::PreHooks);
        self.hooks
            .run_all("Predeployment Steps", &config.before)
            .await
            .context("failed to evaluate predeployment steps")?;

        for (index, release) in config.releases.iter().enumerate() {
            self.enter(DeployStage::Release(index));
            self.deploy_release(release).await?;
            report.deployed.push(release.chart_name.clone());
        }

        self.enter(DeployStage::PostHooks);
        self.hooks
            .run_all("Postdeployment Steps", &config.after)
            .await
            .context("failed to evaluate postdeployment steps")?;

        Ok(report)
    }

    async fn deploy_release(&self, release: &ReleaseSpec) -> Result<()> {
        let name = &release.chart_name;

        let overrides = self
            .render_overrides(&release.overrides)
            .await
            .context("failed to process overrides section")?;

        self.hooks
            .run_all(&format!("Before Chart {}", name), &release.before)
            .await
            .context("failed to evaluate before release steps")?;

        let overrides = overrides
            .to_yaml()
            .context("failed to marshal overrides structure into bytes")?;

        let request = DeployRequest {
            name: name.clone(),
            namespace: release.chart_namespace.clone(),
            chart_location: release.chart_location.clone(),
            timeout: self.timeout,
            overrides: overrides.into_bytes(),
        };

        self.reporter.info(&format!(
            "Deploying chart {} from {} into namespace {}",
            name, release.chart_location, release.chart_namespace
        ));
        self.releases
            .deploy(&request)
            .await
            .context("failed to deploy via havener configuration")?;

        self.reporter
            .status("Upgrade", &self.status_message(release).await);

        self.hooks
            .run_all(&format!("After Chart {}", name), &release.after)
            .await
            .context("failed to evaluate after release steps")?;

        Ok(())
    }

    /// Template an override tree on the blocking pool
    async fn render_overrides(&self, overrides: &ConfigNode) -> Result<ConfigNode> {
        let runner = Arc::clone(&self.runner);
        let overrides = overrides.clone();

        let rendered =
            tokio::task::spawn_blocking(move || Templater::new(runner.as_ref()).render(&overrides))
                .await?;
        Ok(rendered?)
    }

    /// Summary of a deployed release, followed by its notes if there are any
    async fn status_message(&self, release: &ReleaseSpec) -> String {
        let mut message = format!(
            "Successfully created new helm chart {} in namespace {}.",
            release.chart_name, release.chart_namespace
        );

        match self
            .releases
            .notes(&release.chart_name, &release.chart_namespace)
            .await
        {
            Ok(Some(notes)) => {
                message.push_str("\n\n");
                message.push_str(&notes);
            }
            Ok(None) => {}
            Err(e) => self.reporter.warn(&format!(
                "unable to fetch notes of release {}: {}",
                release.chart_name, e
            )),
        }

        message
    }

    fn enter(&self, stage: DeployStage) {
        self.reporter.debug(&format!("deploy stage: {}", stage));
    }
}
