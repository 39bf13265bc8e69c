//! Havener Kube - Helm and Kubernetes integration for Havener
//!
//! This crate provides:
//! - **Deploy Pipeline**: global and per-release hooks around ordered Helm upgrades
//! - **Purge**: concurrent teardown of releases, their controllers and namespaces
//! - **Namespace Termination**: deletion confirmed through a watch stream
//! - **Collaborators**: `ReleaseService` (Helm) and `ResourceStore` (Kubernetes API)
//!   traits with production and in-memory implementations

pub mod deploy;
pub mod error;
pub mod helm;
pub mod hooks;
pub mod mock;
pub mod namespace;
pub mod purge;
pub mod reporter;
pub mod resources;

pub use deploy::{DEFAULT_DEPLOY_TIMEOUT, DeployPipeline, DeployReport, DeployStage};
pub use error::{KubeError, Result, ResultExt};
pub use helm::{DeployRequest, HelmCli, ReleaseService, ReleaseStatus};
pub use hooks::HookRunner;
pub use mock::{
    MockReleaseService, MockResourceStore, RecordingReporter, RecordingRunner, ReleaseOperations,
    StoreCall,
};
pub use namespace::terminate_namespace;
pub use purge::{Confirmation, PurgeOutcome, PurgeSummary, Purger, RELEASE_PURGE_TIMEOUT};
pub use reporter::{Reporter, TracingReporter};
pub use resources::{
    ControllerKind, KubeResourceStore, NamespaceEvent, NamespaceRef, NamespaceWatch, ResourceStore,
};
