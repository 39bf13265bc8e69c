//! Release materialization through Helm
//!
//! The deploy pipeline and the purger only depend on the [`ReleaseService`]
//! trait. [`HelmCli`] implements it by driving the `helm` binary, the same way
//! hooks elsewhere shell out to `kubectl`.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{KubeError, Result};

/// Status of an existing release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseStatus {
    pub name: String,
    pub namespace: String,
}

/// Everything needed to install or upgrade one release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Chart reference
    pub chart_location: String,

    /// How long Helm may wait for the release to become ready
    pub timeout: Duration,

    /// Templated overrides as a YAML document
    pub overrides: Vec<u8>,
}

/// Release materialization service
///
/// Implementations must be Send + Sync, purges run concurrently.
#[async_trait]
pub trait ReleaseService: Send + Sync {
    /// Look up an existing release by name
    async fn status(&self, name: &str) -> Result<ReleaseStatus>;

    /// Install the release, or upgrade it if it already exists
    async fn deploy(&self, request: &DeployRequest) -> Result<()>;

    /// Release notes, `None` if the chart has none
    async fn notes(&self, name: &str, namespace: &str) -> Result<Option<String>>;

    /// Delete the release and its history
    async fn purge(&self, name: &str, namespace: &str, timeout: Duration) -> Result<()>;
}

/// [`ReleaseService`] backed by the `helm` binary
#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: String,
}

impl HelmCli {
    pub fn new() -> Self {
        Self::with_binary("helm")
    }

    /// Use a specific helm executable
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Check that the helm binary can be executed, returns its version
    pub async fn verify(&self) -> Result<String> {
        let output = self.exec(&["version", "--short"], None).await?;
        Ok(output.trim().to_string())
    }

    /// Run helm and return its standard output
    async fn exec(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<String> {
        tracing::debug!(binary = %self.binary, ?args, "running helm");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(data).await?;
            // closing stdin lets helm see EOF
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KubeError::Materialization {
                release: String::new(),
                message: format!("{} ({})", stderr.trim(), output.status),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a helm command on behalf of a release, labelling failures with it
    async fn exec_for(&self, release: &str, args: &[&str], stdin: Option<&[u8]>) -> Result<String> {
        self.exec(args, stdin).await.map_err(|e| match e {
            KubeError::Materialization { message, .. } => KubeError::Materialization {
                release: release.to_string(),
                message,
            },
            other => KubeError::Materialization {
                release: release.to_string(),
                message: other.to_string(),
            },
        })
    }
}

impl Default for HelmCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Helm's timeout flag value
fn timeout_arg(timeout: Duration) -> String {
    format!("{}s", timeout.as_secs())
}

/// Pick the entry for `name` out of `helm list --output json`
fn find_release(list_json: &str, name: &str) -> Result<ReleaseStatus> {
    let releases: Vec<ReleaseStatus> = serde_json::from_str(list_json)?;
    releases
        .into_iter()
        .find(|r| r.name == name)
        .ok_or_else(|| KubeError::ReleaseNotFound {
            name: name.to_string(),
        })
}

#[async_trait]
impl ReleaseService for HelmCli {
    async fn status(&self, name: &str) -> Result<ReleaseStatus> {
        let filter = format!("^{}$", name);
        let output = self
            .exec_for(
                name,
                &["list", "--all", "--all-namespaces", "--filter", &filter, "--output", "json"],
                None,
            )
            .await?;
        find_release(&output, name)
    }

    async fn deploy(&self, request: &DeployRequest) -> Result<()> {
        let timeout = timeout_arg(request.timeout);
        self.exec_for(
            &request.name,
            &[
                "upgrade",
                &request.name,
                &request.chart_location,
                "--install",
                "--namespace",
                &request.namespace,
                "--create-namespace",
                "--wait",
                "--timeout",
                &timeout,
                "--values",
                "-",
            ],
            Some(request.overrides.as_slice()),
        )
        .await?;
        Ok(())
    }

    async fn notes(&self, name: &str, namespace: &str) -> Result<Option<String>> {
        let output = self
            .exec_for(name, &["get", "notes", name, "--namespace", namespace], None)
            .await?;
        let notes = output.trim();
        Ok((!notes.is_empty()).then(|| notes.to_string()))
    }

    async fn purge(&self, name: &str, namespace: &str, timeout: Duration) -> Result<()> {
        let timeout = timeout_arg(timeout);
        self.exec_for(
            name,
            &["uninstall", name, "--namespace", namespace, "--timeout", &timeout],
            None,
        )
        .await?;
        Ok(())
    }
}
