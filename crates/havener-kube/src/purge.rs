//! Release purging
//!
//! A purge removes a release together with everything in its namespace:
//!
//! 1. Deployments, then StatefulSets, with foreground propagation
//! 2. concurrently: the namespace (confirmed through a watch) and the Helm
//!    release record
//!
//! Several releases are purged in parallel, one task each. Every task runs to
//! completion even when another one fails; deletions are never rolled back.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::error::{KubeError, Result, ResultExt};
use crate::helm::ReleaseService;
use crate::namespace::terminate_namespace;
use crate::reporter::Reporter;
use crate::resources::{ControllerKind, ResourceStore};

/// Timeout passed to the release record deletion
pub const RELEASE_PURGE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Operator confirmation for a set of releases
pub trait Confirmation: Send + Sync {
    /// Return true to proceed with purging `releases`
    fn confirm(&self, releases: &[String]) -> bool;
}

impl<F> Confirmation for F
where
    F: Fn(&[String]) -> bool + Send + Sync,
{
    fn confirm(&self, releases: &[String]) -> bool {
        self(releases)
    }
}

/// Result of [`Purger::purge_releases`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    /// Releases that existed and were put up for deletion
    pub releases: Vec<String>,

    /// The operator declined, nothing was deleted
    pub declined: bool,
}

/// Result of purging one release
#[derive(Debug)]
pub struct PurgeOutcome {
    pub release: String,
    pub result: Result<()>,
}

/// Purges releases and their namespaces
#[derive(Clone)]
pub struct Purger {
    releases: Arc<dyn ReleaseService>,
    store: Arc<dyn ResourceStore>,
    reporter: Arc<dyn Reporter>,
}

impl Purger {
    pub fn new(
        releases: Arc<dyn ReleaseService>,
        store: Arc<dyn ResourceStore>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            releases,
            store,
            reporter,
        }
    }

    /// Purge every existing release among `names`
    ///
    /// Names that do not resolve to a release are skipped. The remaining set is
    /// confirmed once, as a whole. The first failure in completion order is
    /// returned after all purges have finished.
    pub async fn purge_releases(
        &self,
        names: &[String],
        confirmation: &dyn Confirmation,
    ) -> Result<PurgeSummary> {
        let mut existing = Vec::with_capacity(names.len());
        for name in names {
            match self.releases.status(name).await {
                Ok(status) => existing.push(status.name),
                Err(e) => self
                    .reporter
                    .debug(&format!("skipping release {}: {}", name, e)),
            }
        }

        if existing.is_empty() {
            self.reporter.info("No matching releases found, nothing to purge");
            return Ok(PurgeSummary::default());
        }

        if !confirmation.confirm(&existing) {
            return Ok(PurgeSummary {
                releases: existing,
                declined: true,
            });
        }

        let mut tasks = JoinSet::new();
        for name in &existing {
            let purger = self.clone();
            let release = name.clone();
            tasks.spawn(async move {
                let result = purger
                    .purge_release(&release)
                    .await
                    .context("failed to purge helm release");
                PurgeOutcome { release, result }
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok(PurgeOutcome { release, result }) => {
                    match &result {
                        Ok(()) => self.reporter.info(&format!("Purged release {}", release)),
                        Err(e) => self
                            .reporter
                            .warn(&format!("Failed to purge release {}: {}", release, e)),
                    }
                    result
                }
                Err(e) => Err(KubeError::from(e)),
            };

            if let Err(e) = result {
                first_error = first_error.or(Some(e));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(PurgeSummary {
                releases: existing,
                declined: false,
            }),
        }
    }

    /// Purge a single release and its namespace
    pub async fn purge_release(&self, name: &str) -> Result<()> {
        let status = self
            .releases
            .status(name)
            .await
            .context("failed to get release status")?;
        let namespace = status.namespace;

        for kind in ControllerKind::PURGE_ORDER {
            self.purge_controllers(kind, &namespace).await?;
        }

        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        let store = Arc::clone(&self.store);
        let ns = namespace.clone();
        tasks.spawn(async move {
            terminate_namespace(store.as_ref(), &ns)
                .await
                .context("failed to delete namespace")
        });

        let releases = Arc::clone(&self.releases);
        let release = name.to_string();
        tasks.spawn(async move {
            releases
                .purge(&release, &namespace, RELEASE_PURGE_TIMEOUT)
                .await
                .context("failed to delete helm release")
        });

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined.map_err(KubeError::from).and_then(|r| r) {
                first_error = first_error.or(Some(e));
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Delete every controller of `kind`; an unlistable kind counts as empty
    async fn purge_controllers(&self, kind: ControllerKind, namespace: &str) -> Result<()> {
        let names = match self.store.list_controllers(kind, namespace).await {
            Ok(names) => names,
            Err(e) => {
                self.reporter.debug(&format!(
                    "unable to list {} in namespace {}: {}",
                    kind, namespace, e
                ));
                return Ok(());
            }
        };

        for name in names {
            self.reporter
                .debug(&format!("deleting {} {}/{}", kind, namespace, name));
            self.store
                .delete_controller(kind, namespace, &name)
                .await
                .context(purge_label(kind))?;
        }

        Ok(())
    }
}

fn purge_label(kind: ControllerKind) -> &'static str {
    match kind {
        ControllerKind::Deployment => "failed to purge deployments",
        ControllerKind::StatefulSet => "failed to purge statefulsets",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockReleaseService, MockResourceStore, RecordingReporter, StoreCall};
    use crate::resources::NamespaceEvent;
    use std::sync::Mutex;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn purger(service: &MockReleaseService, store: &MockResourceStore) -> Purger {
        Purger::new(
            Arc::new(service.clone()),
            Arc::new(store.clone()),
            Arc::new(RecordingReporter::new()),
        )
    }

    fn accept(_: &[String]) -> bool {
        true
    }

    fn decline(_: &[String]) -> bool {
        false
    }

    #[tokio::test]
    async fn test_missing_releases_are_skipped() {
        let service = MockReleaseService::new()
            .with_release("a", "ns-a")
            .with_release("c", "ns-c");
        let store = MockResourceStore::new()
            .with_namespace("ns-a")
            .with_namespace("ns-c");

        let prompted = Mutex::new(Vec::new());
        let confirm = |releases: &[String]| {
            prompted.lock().unwrap().push(releases.to_vec());
            true
        };

        let summary = purger(&service, &store)
            .purge_releases(&names(&["a", "b", "c"]), &confirm)
            .await
            .unwrap();

        assert_eq!(summary.releases, vec!["a", "c"]);
        assert!(!summary.declined);
        assert_eq!(*prompted.lock().unwrap(), vec![names(&["a", "c"])]);
        assert_eq!(service.purged(), vec!["a", "c"]);
        assert!(!store.has_namespace("ns-a"));
        assert!(!store.has_namespace("ns-c"));
    }

    #[tokio::test]
    async fn test_declined_confirmation_deletes_nothing() {
        let service = MockReleaseService::new().with_release("a", "ns-a");
        let store = MockResourceStore::new()
            .with_namespace("ns-a")
            .with_controllers(ControllerKind::Deployment, "ns-a", &["api"]);

        let summary = purger(&service, &store)
            .purge_releases(&names(&["a"]), &decline)
            .await
            .unwrap();

        assert!(summary.declined);
        assert_eq!(store.delete_count(), 0);
        assert_eq!(service.operation_counts().purges, 0);
        assert!(store.has_namespace("ns-a"));
    }

    #[tokio::test]
    async fn test_no_existing_release_skips_prompt() {
        let service = MockReleaseService::new();
        let store = MockResourceStore::new();

        let prompted = Mutex::new(0);
        let confirm = |_: &[String]| {
            *prompted.lock().unwrap() += 1;
            true
        };

        let summary = purger(&service, &store)
            .purge_releases(&names(&["ghost"]), &confirm)
            .await
            .unwrap();

        assert_eq!(summary, PurgeSummary::default());
        assert_eq!(*prompted.lock().unwrap(), 0);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_controllers_deleted_in_order_before_namespace() {
        let service = MockReleaseService::new().with_release("a", "ns-a");
        let store = MockResourceStore::new()
            .with_namespace("ns-a")
            .with_controllers(ControllerKind::StatefulSet, "ns-a", &["db"])
            .with_controllers(ControllerKind::Deployment, "ns-a", &["api", "web"]);

        purger(&service, &store).purge_release("a").await.unwrap();

        let ns = "ns-a".to_string();
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::ListControllers(ControllerKind::Deployment, ns.clone()),
                StoreCall::DeleteController(ControllerKind::Deployment, ns.clone(), "api".into()),
                StoreCall::DeleteController(ControllerKind::Deployment, ns.clone(), "web".into()),
                StoreCall::ListControllers(ControllerKind::StatefulSet, ns.clone()),
                StoreCall::DeleteController(ControllerKind::StatefulSet, ns.clone(), "db".into()),
                StoreCall::GetNamespace(ns.clone()),
                StoreCall::WatchNamespace(ns.clone()),
                StoreCall::DeleteNamespace(ns),
            ]
        );
        assert_eq!(service.purge_timeouts(), vec![RELEASE_PURGE_TIMEOUT]);
    }

    #[tokio::test]
    async fn test_list_failure_is_swallowed() {
        let service = MockReleaseService::new().with_release("a", "ns-a");
        let store = MockResourceStore::new()
            .with_namespace("ns-a")
            .with_controllers(ControllerKind::StatefulSet, "ns-a", &["db"]);
        store.fail_list(ControllerKind::Deployment, "ns-a");

        purger(&service, &store).purge_release("a").await.unwrap();

        assert!(store.controllers(ControllerKind::StatefulSet, "ns-a").is_empty());
        assert!(!store.has_namespace("ns-a"));
        assert_eq!(service.purged(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_controller_delete_failure_aborts_release() {
        let service = MockReleaseService::new().with_release("a", "ns-a");
        let store = MockResourceStore::new()
            .with_namespace("ns-a")
            .with_controllers(ControllerKind::Deployment, "ns-a", &["api", "web"]);
        store.fail_delete("api");

        let err = purger(&service, &store).purge_release("a").await.unwrap_err();

        assert_eq!(err.context(), Some("failed to purge deployments"));
        assert!(matches!(err.root(), KubeError::ResourceDeletion { name, .. } if name == "api"));
        // nothing after the failing delete was attempted
        assert_eq!(store.delete_count(), 1);
        assert!(store.has_namespace("ns-a"));
        assert_eq!(service.operation_counts().purges, 0);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_other_releases() {
        let service = MockReleaseService::new()
            .with_release("a", "ns-a")
            .with_release("b", "ns-b")
            .with_release("c", "ns-c");
        let store = MockResourceStore::new()
            .with_namespace("ns-a")
            .with_namespace("ns-b")
            .with_namespace("ns-c")
            .with_controllers(ControllerKind::Deployment, "ns-b", &["broken"]);
        store.fail_delete("broken");

        let err = purger(&service, &store)
            .purge_releases(&names(&["a", "b", "c"]), &accept)
            .await
            .unwrap_err();

        assert_eq!(err.context(), Some("failed to purge helm release"));
        assert!(matches!(err.root(), KubeError::ResourceDeletion { name, .. } if name == "broken"));
        assert_eq!(service.purged(), vec!["a", "c"]);
        assert!(
            !store
                .calls_for("ns-b")
                .contains(&StoreCall::DeleteNamespace("ns-b".to_string()))
        );
        assert_eq!(
            store.calls_for("ns-a").last(),
            Some(&StoreCall::DeleteNamespace("ns-a".to_string()))
        );
        assert!(!store.has_namespace("ns-a"));
        assert!(store.has_namespace("ns-b"));
        assert!(!store.has_namespace("ns-c"));
    }

    #[tokio::test]
    async fn test_both_subtasks_run_when_one_fails() {
        let service = MockReleaseService::new().with_release("a", "ns-a");
        let store = MockResourceStore::new().with_namespace("ns-a");
        store.script_watch(
            "ns-a",
            vec![NamespaceEvent::Error("namespace is stuck".to_string())],
        );

        let err = purger(&service, &store).purge_release("a").await.unwrap_err();

        assert_eq!(err.context(), Some("failed to delete namespace"));
        assert!(matches!(err.root(), KubeError::NamespaceWatch { .. }));
        // the release record was still removed
        assert_eq!(service.purged(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_release_record_failure_is_labelled() {
        let service = MockReleaseService::new().with_release("a", "ns-a");
        service.fail_purge("a");
        let store = MockResourceStore::new().with_namespace("ns-a");

        let err = purger(&service, &store).purge_release("a").await.unwrap_err();

        assert_eq!(err.context(), Some("failed to delete helm release"));
        assert!(!store.has_namespace("ns-a"));
    }

    #[tokio::test]
    async fn test_unknown_release_fails_single_purge() {
        let service = MockReleaseService::new();
        let store = MockResourceStore::new();

        let err = purger(&service, &store).purge_release("ghost").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(store.calls().is_empty());
    }
}
