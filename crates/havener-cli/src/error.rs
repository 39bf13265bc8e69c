//! CLI error types with exit code handling
//!
//! Library errors are mapped to a [`CliError`] once, at the command boundary,
//! which decides the process exit code.

use havener_core::CoreError;
use havener_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Configuration could not be read or parsed
    #[error("{message}")]
    #[diagnostic(code(havener::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A shell operator failed
    #[error("{message}")]
    #[diagnostic(code(havener::cli::template))]
    Template { message: String },

    /// Deploy or purge failed
    #[error("{message}")]
    #[diagnostic(code(havener::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (terminal, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(havener::cli::io))]
    Io { message: String },

    /// Internal error (unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(havener::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Template { .. } => exit_codes::TEMPLATE_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Error while loading the configuration file
    pub fn config_load(err: CoreError) -> Self {
        match err {
            CoreError::ConfigRead { .. } => CliError::Config {
                message: format!("unable to read havener configuration: {}", err),
                help: Some("pass the file with --config or DEPLOYMENT_CONFIG".to_string()),
            },
            CoreError::ConfigParse(_) => CliError::Config {
                message: format!("failed to unmarshal havener configuration: {}", err),
                help: None,
            },
            other => Self::from(other),
        }
    }

    /// Error from the deploy pipeline or the purger
    pub fn cluster(err: KubeError) -> Self {
        match err.root() {
            KubeError::Templating(_) => CliError::Template {
                message: err.to_string(),
            },
            KubeError::Api(_) => CliError::Cluster {
                message: err.to_string(),
                help: Some("check the current kubeconfig context".to_string()),
            },
            _ => CliError::Cluster {
                message: err.to_string(),
                help: None,
            },
        }
    }

    /// Attach help text to a configuration or cluster error
    pub fn with_help(self, text: impl Into<String>) -> Self {
        match self {
            CliError::Config { message, .. } => CliError::Config {
                message,
                help: Some(text.into()),
            },
            CliError::Cluster { message, .. } => CliError::Cluster {
                message,
                help: Some(text.into()),
            },
            other => other,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConfigRead { .. } | CoreError::ConfigParse(_) => CliError::config_load(err),
            CoreError::Shell(_) => CliError::Template {
                message: err.to_string(),
            },
            CoreError::Serialize(_) => CliError::Internal {
                message: err.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
