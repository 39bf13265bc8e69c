//! Havener configuration file
//!
//! ```yaml
//! before:
//!   - name: create namespace
//!     cmd: kubectl create namespace demo
//! releases:
//!   - chart_name: demo
//!     chart_namespace: demo
//!     chart_location: stable/nginx
//!     overrides:
//!       image:
//!         tag: ((shell git rev-parse --short HEAD))
//! after: []
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::node::ConfigNode;
use crate::shell::CommandRunner;
use crate::template::Templater;

/// Top-level configuration: global hooks around an ordered list of releases
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Steps executed before the first release
    #[serde(default)]
    pub before: Vec<Task>,

    /// Releases, deployed in declared order
    #[serde(default)]
    pub releases: Vec<ReleaseSpec>,

    /// Steps executed after the last release
    #[serde(default)]
    pub after: Vec<Task>,
}

/// One chart release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSpec {
    /// Release name (also used as chart display name)
    pub chart_name: String,

    /// Target namespace
    pub chart_namespace: String,

    /// Chart reference: repository chart, local path or URL
    pub chart_location: String,

    /// Values passed to the chart, may embed shell operators
    #[serde(default, skip_serializing_if = "ConfigNode::is_null")]
    pub overrides: ConfigNode,

    /// Steps executed before this release
    #[serde(default)]
    pub before: Vec<Task>,

    /// Steps executed after this release
    #[serde(default)]
    pub after: Vec<Task>,
}

/// A named shell command run as a lifecycle hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub cmd: String,
}

impl Config {
    /// Load a configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(CoreError::ConfigParse)
    }

    /// Serialize the configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(CoreError::Serialize)
    }

    /// Return a copy with the overrides of every release templated
    ///
    /// Releases without an overrides section are left as they are.
    pub fn render(&self, runner: &dyn CommandRunner) -> Result<Config> {
        let templater = Templater::new(runner);
        let mut rendered = self.clone();

        for release in &mut rendered.releases {
            if release.overrides.is_null() {
                continue;
            }
            release.overrides = templater.render(&release.overrides)?;
        }

        Ok(rendered)
    }
}

impl ReleaseSpec {
    pub fn new(
        chart_name: impl Into<String>,
        chart_namespace: impl Into<String>,
        chart_location: impl Into<String>,
    ) -> Self {
        Self {
            chart_name: chart_name.into(),
            chart_namespace: chart_namespace.into(),
            chart_location: chart_location.into(),
            overrides: ConfigNode::Null,
            before: Vec::new(),
            after: Vec::new(),
        }
    }
}

impl Task {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
        }
    }
}
