//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unable to read configuration file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[source] serde_yaml::Error),

    #[error(transparent)]
    Shell(#[from] ShellError),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

/// Failure of a single shell operator or hook command
#[derive(Error, Debug)]
pub enum ShellError {
    /// The shell could not be started at all
    #[error("failed to run command: {command}\nerror message: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited unsuccessfully
    #[error("failed to run command: {command}\nerror message: {status}{}", stderr_suffix(.stderr))]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

impl ShellError {
    /// The command that failed
    pub fn command(&self) -> &str {
        match self {
            ShellError::Spawn { command, .. } | ShellError::Failed { command, .. } => command,
        }
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{}", stderr)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
