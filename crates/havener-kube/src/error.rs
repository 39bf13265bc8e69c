//! Error types for havener-kube

use havener_core::{CoreError, ShellError};
use thiserror::Error;

/// Result type for havener-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while deploying or purging releases
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Shell operator evaluation failed
    #[error(transparent)]
    Templating(#[from] ShellError),

    /// Configuration could not be loaded or serialized
    #[error("configuration error: {0}")]
    Config(String),

    /// A lifecycle hook failed
    #[error("task '{task}' failed: {message}")]
    Hook { task: String, message: String },

    /// Helm install/upgrade/delete failed or timed out
    #[error("helm operation on release '{release}' failed: {message}")]
    Materialization { release: String, message: String },

    /// Release does not exist
    #[error("release '{name}' not found")]
    ReleaseNotFound { name: String },

    /// Cluster resource does not exist
    #[error("{kind} '{name}' not found")]
    ResourceNotFound { kind: String, name: String },

    /// Deleting a cluster resource failed
    #[error("failed to delete {kind} '{name}' in namespace '{namespace}': {message}")]
    ResourceDeletion {
        kind: String,
        name: String,
        namespace: String,
        message: String,
    },

    /// The namespace watch reported an error or ended early
    #[error("failed to delete namespace {namespace}: {message}")]
    NamespaceWatch { namespace: String, message: String },

    /// A spawned task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error annotated with the phase it happened in
    #[error("{context}: {source}")]
    Context {
        context: &'static str,
        #[source]
        source: Box<KubeError>,
    },
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<CoreError> for KubeError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Shell(shell) => KubeError::Templating(shell),
            other => KubeError::Config(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for KubeError {
    fn from(e: tokio::task::JoinError) -> Self {
        KubeError::Task(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        match self {
            KubeError::Api(kube::Error::Api(resp)) => resp.code == 404,
            KubeError::ReleaseNotFound { .. } | KubeError::ResourceNotFound { .. } => true,
            KubeError::Context { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// The phase label, if the error was annotated with one
    pub fn context(&self) -> Option<&'static str> {
        match self {
            KubeError::Context { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The innermost error below any phase annotations
    pub fn root(&self) -> &KubeError {
        match self {
            KubeError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Attach a static phase label to an error
pub trait ResultExt<T> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T, E: Into<KubeError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|e| KubeError::Context {
            context,
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wraps_message() {
        let result: Result<()> = Err(KubeError::ReleaseNotFound {
            name: "web".to_string(),
        });
        let err = result.context("failed to purge helm release").unwrap_err();

        assert_eq!(err.context(), Some("failed to purge helm release"));
        assert_eq!(
            err.to_string(),
            "failed to purge helm release: release 'web' not found"
        );
        assert!(err.is_not_found());
        assert!(matches!(err.root(), KubeError::ReleaseNotFound { .. }));
    }

    #[test]
    fn test_shell_error_converts_to_templating() {
        let core = CoreError::Shell(ShellError::Failed {
            command: "false".to_string(),
            status: "exit status: 1".to_string(),
            stderr: String::new(),
        });
        assert!(matches!(KubeError::from(core), KubeError::Templating(_)));
    }

    #[test]
    fn test_namespace_watch_message() {
        let err = KubeError::NamespaceWatch {
            namespace: "demo".to_string(),
            message: "etcd unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "failed to delete namespace demo: etcd unavailable");
        assert!(!err.is_not_found());
    }
}
