//! In-memory release service and resource store for testing
//!
//! Both mocks keep their state behind `Arc<RwLock<..>>` so clones share it,
//! which lets tests hand one clone to a workflow and inspect the other.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use havener_core::{CommandRunner, ShellError};

use crate::error::{KubeError, Result};
use crate::helm::{DeployRequest, ReleaseService, ReleaseStatus};
use crate::reporter::Reporter;
use crate::resources::{ControllerKind, NamespaceEvent, NamespaceRef, NamespaceWatch, ResourceStore};

/// Counts of release operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReleaseOperations {
    pub statuses: usize,
    pub deploys: usize,
    pub notes: usize,
    pub purges: usize,
}

#[derive(Default)]
struct ReleaseState {
    /// name -> namespace
    releases: HashMap<String, String>,
    notes: HashMap<String, String>,
    failing_deploys: HashSet<String>,
    failing_notes: HashSet<String>,
    failing_purges: HashSet<String>,
    deploy_requests: Vec<DeployRequest>,
    purged: Vec<(String, Duration)>,
    operations: ReleaseOperations,
}

/// In-memory [`ReleaseService`]
#[derive(Clone, Default)]
pub struct MockReleaseService {
    state: Arc<RwLock<ReleaseState>>,
}

impl MockReleaseService {
    /// Create a new mock without releases
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing release
    pub fn with_release(self, name: &str, namespace: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .releases
            .insert(name.to_string(), namespace.to_string());
        self
    }

    /// Release notes returned for `name`
    pub fn with_notes(self, name: &str, notes: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .notes
            .insert(name.to_string(), notes.to_string());
        self
    }

    /// Make deploying `name` fail
    pub fn fail_deploy(&self, name: &str) {
        self.state
            .write()
            .unwrap()
            .failing_deploys
            .insert(name.to_string());
    }

    /// Make fetching the notes of `name` fail
    pub fn fail_notes(&self, name: &str) {
        self.state
            .write()
            .unwrap()
            .failing_notes
            .insert(name.to_string());
    }

    /// Make purging `name` fail
    pub fn fail_purge(&self, name: &str) {
        self.state
            .write()
            .unwrap()
            .failing_purges
            .insert(name.to_string());
    }

    /// All deploy requests received, in order
    pub fn deploy_requests(&self) -> Vec<DeployRequest> {
        self.state.read().unwrap().deploy_requests.clone()
    }

    /// Names of the releases deployed, in order
    pub fn deployed(&self) -> Vec<String> {
        self.deploy_requests().into_iter().map(|r| r.name).collect()
    }

    /// Names of the releases purged, sorted
    pub fn purged(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .read()
            .unwrap()
            .purged
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Timeouts passed to purge calls
    pub fn purge_timeouts(&self) -> Vec<Duration> {
        self.state
            .read()
            .unwrap()
            .purged
            .iter()
            .map(|(_, timeout)| *timeout)
            .collect()
    }

    pub fn has_release(&self, name: &str) -> bool {
        self.state.read().unwrap().releases.contains_key(name)
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> ReleaseOperations {
        self.state.read().unwrap().operations.clone()
    }
}

#[async_trait]
impl ReleaseService for MockReleaseService {
    async fn status(&self, name: &str) -> Result<ReleaseStatus> {
        let mut state = self.state.write().unwrap();
        state.operations.statuses += 1;

        state
            .releases
            .get(name)
            .map(|namespace| ReleaseStatus {
                name: name.to_string(),
                namespace: namespace.clone(),
            })
            .ok_or_else(|| KubeError::ReleaseNotFound {
                name: name.to_string(),
            })
    }

    async fn deploy(&self, request: &DeployRequest) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.operations.deploys += 1;
        state.deploy_requests.push(request.clone());

        if state.failing_deploys.contains(&request.name) {
            return Err(KubeError::Materialization {
                release: request.name.clone(),
                message: "UPGRADE FAILED: timed out waiting for the condition".to_string(),
            });
        }

        state
            .releases
            .insert(request.name.clone(), request.namespace.clone());
        Ok(())
    }

    async fn notes(&self, name: &str, _namespace: &str) -> Result<Option<String>> {
        let mut state = self.state.write().unwrap();
        state.operations.notes += 1;

        if state.failing_notes.contains(name) {
            return Err(KubeError::Materialization {
                release: name.to_string(),
                message: "release: not found".to_string(),
            });
        }
        Ok(state.notes.get(name).cloned())
    }

    async fn purge(&self, name: &str, _namespace: &str, timeout: Duration) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.operations.purges += 1;

        if state.failing_purges.contains(name) {
            return Err(KubeError::Materialization {
                release: name.to_string(),
                message: "uninstallation completed with 1 error(s)".to_string(),
            });
        }

        state.releases.remove(name);
        state.purged.push((name.to_string(), timeout));
        Ok(())
    }
}

/// Store operations in the order they were received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ListControllers(ControllerKind, String),
    DeleteController(ControllerKind, String, String),
    GetNamespace(String),
    WatchNamespace(String),
    DeleteNamespace(String),
}

#[derive(Default)]
struct StoreState {
    /// (namespace, kind) -> names
    controllers: HashMap<(String, ControllerKind), Vec<String>>,
    namespaces: HashSet<String>,
    /// namespace -> one script per upcoming watch
    watches: HashMap<String, VecDeque<Vec<NamespaceEvent>>>,
    terminating: HashSet<String>,
    failing_lists: HashSet<(String, ControllerKind)>,
    failing_deletes: HashSet<String>,
    calls: Vec<StoreCall>,
}

/// In-memory [`ResourceStore`]
///
/// Each watch replays the next script queued with
/// [`MockResourceStore::script_watch`], or `[Modified, Deleted]` once the
/// queue is empty. A script that ends without a terminal event behaves like a
/// watch closed by the server.
#[derive(Clone, Default)]
pub struct MockResourceStore {
    state: Arc<RwLock<StoreState>>,
}

impl MockResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace
    pub fn with_namespace(self, namespace: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .namespaces
            .insert(namespace.to_string());
        self
    }

    /// Add controllers of one kind to a namespace
    pub fn with_controllers(self, kind: ControllerKind, namespace: &str, names: &[&str]) -> Self {
        self.state
            .write()
            .unwrap()
            .controllers
            .entry((namespace.to_string(), kind))
            .or_default()
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Queue the events replayed by one watch of `namespace`
    pub fn script_watch(&self, namespace: &str, events: Vec<NamespaceEvent>) {
        self.state
            .write()
            .unwrap()
            .watches
            .entry(namespace.to_string())
            .or_default()
            .push_back(events);
    }

    /// Keep `namespace` fetchable after its deletion was requested, as a
    /// namespace stuck in `Terminating` on finalizers
    pub fn keep_terminating(&self, namespace: &str) {
        self.state
            .write()
            .unwrap()
            .terminating
            .insert(namespace.to_string());
    }

    /// Make listing `kind` in `namespace` fail
    pub fn fail_list(&self, kind: ControllerKind, namespace: &str) {
        self.state
            .write()
            .unwrap()
            .failing_lists
            .insert((namespace.to_string(), kind));
    }

    /// Make deleting any resource called `name` fail
    pub fn fail_delete(&self, name: &str) {
        self.state
            .write()
            .unwrap()
            .failing_deletes
            .insert(name.to_string());
    }

    /// All calls received, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.read().unwrap().calls.clone()
    }

    /// Calls that touched `namespace`, in order
    pub fn calls_for(&self, namespace: &str) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                StoreCall::ListControllers(_, ns) | StoreCall::DeleteController(_, ns, _) => {
                    ns == namespace
                }
                StoreCall::GetNamespace(ns)
                | StoreCall::WatchNamespace(ns)
                | StoreCall::DeleteNamespace(ns) => ns == namespace,
            })
            .collect()
    }

    /// Number of delete requests of any kind
    pub fn delete_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    StoreCall::DeleteController(..) | StoreCall::DeleteNamespace(_)
                )
            })
            .count()
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.state.read().unwrap().namespaces.contains(namespace)
    }

    /// Remaining controllers of `kind` in `namespace`
    pub fn controllers(&self, kind: ControllerKind, namespace: &str) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .controllers
            .get(&(namespace.to_string(), kind))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ResourceStore for MockResourceStore {
    async fn list_controllers(&self, kind: ControllerKind, namespace: &str) -> Result<Vec<String>> {
        let mut state = self.state.write().unwrap();
        state
            .calls
            .push(StoreCall::ListControllers(kind, namespace.to_string()));

        let key = (namespace.to_string(), kind);
        if state.failing_lists.contains(&key) {
            return Err(KubeError::Io(std::io::Error::other("connection reset by peer")));
        }
        Ok(state.controllers.get(&key).cloned().unwrap_or_default())
    }

    async fn delete_controller(
        &self,
        kind: ControllerKind,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.calls.push(StoreCall::DeleteController(
            kind,
            namespace.to_string(),
            name.to_string(),
        ));

        if state.failing_deletes.contains(name) {
            return Err(KubeError::ResourceDeletion {
                kind: kind.to_string(),
                name: name.to_string(),
                namespace: namespace.to_string(),
                message: "the server rejected the request".to_string(),
            });
        }

        if let Some(names) = state.controllers.get_mut(&(namespace.to_string(), kind)) {
            names.retain(|n| n != name);
        }
        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> Result<NamespaceRef> {
        let mut state = self.state.write().unwrap();
        state.calls.push(StoreCall::GetNamespace(name.to_string()));

        if !state.namespaces.contains(name) {
            return Err(KubeError::ResourceNotFound {
                kind: "Namespace".to_string(),
                name: name.to_string(),
            });
        }
        Ok(NamespaceRef {
            name: name.to_string(),
            resource_version: Some("1".to_string()),
        })
    }

    async fn watch_namespace(&self, namespace: &NamespaceRef) -> Result<NamespaceWatch> {
        let mut state = self.state.write().unwrap();
        state
            .calls
            .push(StoreCall::WatchNamespace(namespace.name.clone()));

        let events = state
            .watches
            .get_mut(&namespace.name)
            .and_then(|scripts| scripts.pop_front())
            .unwrap_or_else(|| vec![NamespaceEvent::Modified, NamespaceEvent::Deleted]);
        Ok(stream::iter(events.into_iter().map(Ok)).boxed())
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.calls.push(StoreCall::DeleteNamespace(name.to_string()));

        if state.failing_deletes.contains(name) {
            return Err(KubeError::ResourceDeletion {
                kind: "Namespace".to_string(),
                name: name.to_string(),
                namespace: name.to_string(),
                message: "the server rejected the request".to_string(),
            });
        }

        if !state.terminating.contains(name) {
            state.namespaces.remove(name);
        }
        Ok(())
    }
}

/// [`CommandRunner`] that records commands instead of running them
///
/// Unscripted commands answer with their own text, so `((shell tag))`
/// renders as `tag`.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    calls: Arc<RwLock<Vec<String>>>,
    outputs: Arc<RwLock<HashMap<String, String>>>,
    failing: Arc<RwLock<HashSet<String>>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard output returned for `command`
    pub fn with_output(self, command: &str, output: &str) -> Self {
        self.outputs
            .write()
            .unwrap()
            .insert(command.to_string(), output.to_string());
        self
    }

    /// Make `command` exit non-zero
    pub fn fail_on(&self, command: &str) {
        self.failing.write().unwrap().insert(command.to_string());
    }

    /// Commands run, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str) -> std::result::Result<String, ShellError> {
        self.calls.write().unwrap().push(command.to_string());

        if self.failing.read().unwrap().contains(command) {
            return Err(ShellError::Failed {
                command: command.to_string(),
                status: "exit status: 1".to_string(),
                stderr: format!("{}: command failed", command),
            });
        }

        Ok(self
            .outputs
            .read()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_else(|| format!("{}\n", command)))
    }
}

/// [`Reporter`] that keeps every message for assertions
#[derive(Clone, Default)]
pub struct RecordingReporter {
    messages: Arc<RwLock<Vec<(String, String)>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(level, message)` pairs
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.read().unwrap().clone()
    }

    /// Messages recorded at one level
    pub fn at_level(&self, level: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| l == level)
            .map(|(_, m)| m)
            .collect()
    }

    fn record(&self, level: &str, message: String) {
        self.messages
            .write()
            .unwrap()
            .push((level.to_string(), message));
    }
}

impl Reporter for RecordingReporter {
    fn debug(&self, message: &str) {
        self.record("debug", message.to_string());
    }

    fn info(&self, message: &str) {
        self.record("info", message.to_string());
    }

    fn warn(&self, message: &str) {
        self.record("warn", message.to_string());
    }

    fn status(&self, title: &str, message: &str) {
        self.record("status", format!("{}: {}", title, message));
    }
}
