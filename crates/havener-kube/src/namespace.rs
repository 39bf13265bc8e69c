//! Namespace termination confirmed through a watch stream

use futures::StreamExt;

use crate::error::{KubeError, Result};
use crate::resources::{NamespaceEvent, ResourceStore};

/// Delete a namespace and wait until the cluster reports it gone
///
/// The watch is opened before the delete request is issued so the `Deleted`
/// event cannot be missed. There is no client-side timeout: namespaces with
/// finalizers may take a long time to terminate. The API server closes every
/// watch after a few minutes, so a closed stream is resumed from a freshly
/// fetched resource version. A namespace that can no longer be fetched at that
/// point is gone.
pub async fn terminate_namespace<S>(store: &S, namespace: &str) -> Result<()>
where
    S: ResourceStore + ?Sized,
{
    let target = store.get_namespace(namespace).await?;
    let mut events = store.watch_namespace(&target).await?;

    store.delete_namespace(namespace).await?;
    tracing::debug!(namespace, "namespace deletion requested, waiting for confirmation");

    loop {
        while let Some(event) = events.next().await {
            match event? {
                NamespaceEvent::Deleted => {
                    tracing::debug!(namespace, "namespace deleted");
                    return Ok(());
                }
                NamespaceEvent::Error(message) => {
                    return Err(KubeError::NamespaceWatch {
                        namespace: namespace.to_string(),
                        message,
                    });
                }
                other => tracing::trace!(namespace, event = ?other, "ignoring namespace event"),
            }
        }

        let target = match store.get_namespace(namespace).await {
            Ok(target) => target,
            Err(e) if e.is_not_found() => {
                tracing::debug!(namespace, "namespace deleted while the watch was closed");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(
            namespace,
            resource_version = ?target.resource_version,
            "watch closed, resuming"
        );
        events = store.watch_namespace(&target).await?;
    }
}
