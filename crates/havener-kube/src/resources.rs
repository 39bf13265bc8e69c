//! Cluster resource operations needed for purging releases
//!
//! Only a narrow slice of the API is required: listing and deleting the
//! controllers of a namespace, and deleting a namespace while watching it.
//! Every deletion uses foreground propagation so that dependents (pods,
//! replica sets) are removed before their owner disappears.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    Client, ResourceExt,
    api::{Api, DeleteParams, ListParams, PropagationPolicy, WatchEvent, WatchParams},
};
use serde::de::DeserializeOwned;
use std::fmt;

use crate::error::{KubeError, Result};

/// Controller kinds removed before a namespace is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    Deployment,
    StatefulSet,
}

impl ControllerKind {
    /// Order in which controllers are purged
    pub const PURGE_ORDER: [ControllerKind; 2] =
        [ControllerKind::Deployment, ControllerKind::StatefulSet];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerKind::Deployment => "Deployment",
            ControllerKind::StatefulSet => "StatefulSet",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fetched namespace, the starting point of a watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRef {
    pub name: String,
    pub resource_version: Option<String>,
}

/// Watch events for a single namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceEvent {
    Added,
    Modified,
    Deleted,
    Bookmark,
    /// Server-side watch error with its message
    Error(String),
}

/// Stream of events for one namespace
pub type NamespaceWatch = BoxStream<'static, Result<NamespaceEvent>>;

/// Cluster resource store
///
/// Implementations must be Send + Sync, one store is shared by all purge tasks.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Names of all controllers of `kind` in `namespace`
    async fn list_controllers(&self, kind: ControllerKind, namespace: &str) -> Result<Vec<String>>;

    /// Delete one controller with foreground propagation
    async fn delete_controller(&self, kind: ControllerKind, namespace: &str, name: &str)
    -> Result<()>;

    /// Fetch a namespace
    async fn get_namespace(&self, name: &str) -> Result<NamespaceRef>;

    /// Watch a single namespace, starting at its fetched resource version
    async fn watch_namespace(&self, namespace: &NamespaceRef) -> Result<NamespaceWatch>;

    /// Request deletion of a namespace with foreground propagation
    async fn delete_namespace(&self, name: &str) -> Result<()>;
}

/// [`ResourceStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeResourceStore {
    client: Client,
}

impl KubeResourceStore {
    /// Connect using the default kubeconfig or in-cluster configuration
    pub async fn new() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    /// Create with an existing Kubernetes client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }
}

fn foreground() -> DeleteParams {
    DeleteParams {
        propagation_policy: Some(PropagationPolicy::Foreground),
        ..Default::default()
    }
}

async fn names<K>(api: Api<K>) -> Result<Vec<String>>
where
    K: kube::Resource + Clone + DeserializeOwned + fmt::Debug,
{
    let list = api.list(&ListParams::default()).await?;
    Ok(list.items.iter().map(|item| item.name_any()).collect())
}

async fn delete_foreground<K>(api: Api<K>, kind: &str, namespace: &str, name: &str) -> Result<()>
where
    K: kube::Resource + Clone + DeserializeOwned + fmt::Debug,
{
    api.delete(name, &foreground())
        .await
        .map_err(|e| KubeError::ResourceDeletion {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            message: e.to_string(),
        })?;
    Ok(())
}

/// Watch scoped to the one namespace called `name`
fn watch_params(name: &str) -> WatchParams {
    WatchParams::default().fields(&format!("metadata.name={}", name))
}

fn namespace_event(event: WatchEvent<Namespace>) -> NamespaceEvent {
    match event {
        WatchEvent::Added(_) => NamespaceEvent::Added,
        WatchEvent::Modified(_) => NamespaceEvent::Modified,
        WatchEvent::Deleted(_) => NamespaceEvent::Deleted,
        WatchEvent::Bookmark(_) => NamespaceEvent::Bookmark,
        WatchEvent::Error(e) => NamespaceEvent::Error(e.message),
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn list_controllers(&self, kind: ControllerKind, namespace: &str) -> Result<Vec<String>> {
        match kind {
            ControllerKind::Deployment => {
                names(Api::<Deployment>::namespaced(self.client.clone(), namespace)).await
            }
            ControllerKind::StatefulSet => {
                names(Api::<StatefulSet>::namespaced(self.client.clone(), namespace)).await
            }
        }
    }

    async fn delete_controller(
        &self,
        kind: ControllerKind,
        namespace: &str,
        name: &str,
    ) -> Result<()> {
        match kind {
            ControllerKind::Deployment => {
                let api = Api::<Deployment>::namespaced(self.client.clone(), namespace);
                delete_foreground(api, kind.as_str(), namespace, name).await
            }
            ControllerKind::StatefulSet => {
                let api = Api::<StatefulSet>::namespaced(self.client.clone(), namespace);
                delete_foreground(api, kind.as_str(), namespace, name).await
            }
        }
    }

    async fn get_namespace(&self, name: &str) -> Result<NamespaceRef> {
        let namespace = self.namespaces().get(name).await?;
        Ok(NamespaceRef {
            name: namespace.name_any(),
            resource_version: namespace.resource_version(),
        })
    }

    async fn watch_namespace(&self, namespace: &NamespaceRef) -> Result<NamespaceWatch> {
        let params = watch_params(&namespace.name);
        let version = namespace.resource_version.as_deref().unwrap_or("0");

        let stream = self.namespaces().watch(&params, version).await?;
        Ok(stream
            .map(|event| event.map(namespace_event).map_err(KubeError::Api))
            .boxed())
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        delete_foreground(self.namespaces(), "Namespace", name, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    #[test]
    fn test_purge_order() {
        assert_eq!(
            ControllerKind::PURGE_ORDER,
            [ControllerKind::Deployment, ControllerKind::StatefulSet]
        );
        assert_eq!(ControllerKind::StatefulSet.to_string(), "StatefulSet");
    }

    #[test]
    fn test_foreground_propagation() {
        assert!(matches!(
            foreground().propagation_policy,
            Some(PropagationPolicy::Foreground)
        ));
    }

    #[test]
    fn test_namespace_event_mapping() {
        let ns = Namespace::default();
        assert_eq!(namespace_event(WatchEvent::Added(ns.clone())), NamespaceEvent::Added);
        assert_eq!(
            namespace_event(WatchEvent::Modified(ns.clone())),
            NamespaceEvent::Modified
        );
        assert_eq!(namespace_event(WatchEvent::Deleted(ns)), NamespaceEvent::Deleted);
    }

    #[test]
    fn test_watch_error_keeps_server_message() {
        let response = ErrorResponse {
            status: "Failure".to_string(),
            message: "too old resource version: 1 (4242)".to_string(),
            reason: "Expired".to_string(),
            code: 410,
        };

        assert_eq!(
            namespace_event(WatchEvent::Error(response)),
            NamespaceEvent::Error("too old resource version: 1 (4242)".to_string())
        );
    }

    #[test]
    fn test_watch_is_scoped_to_one_namespace() {
        let params = watch_params("demo");
        assert_eq!(params.field_selector.as_deref(), Some("metadata.name=demo"));
        assert!(params.label_selector.is_none());
    }
}
