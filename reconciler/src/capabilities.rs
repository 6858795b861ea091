//! The collaborators a reconciler needs from a cloud.
//!
//! Implementations wrap the vendor SDKs. Pagination, retries and credential
//! handling stay inside them; only the final result or a [`CloudError`]
//! crosses this boundary.

use async_trait::async_trait;
use failover::{CloudError, InstanceGroupSnapshot, InstanceIdentity, MetricQuery};
use std::sync::Arc;

#[async_trait]
pub trait MetricSource<I: InstanceIdentity>: Send + Sync {
    /// Latest value of the validator metric for one instance.
    ///
    /// Returns `Ok(None)` when the instance has no recent data point, which
    /// means "not reporting yet" rather than a failure.
    async fn query_latest_metric(
        &self,
        query: &MetricQuery,
        instance: &I,
    ) -> Result<Option<f64>, CloudError>;
}

#[async_trait]
pub trait InstanceLister<I: InstanceIdentity>: Send + Sync {
    /// Live groups of the deployment `prefix` in one location.
    async fn list_instances(
        &self,
        prefix: &str,
        location_index: usize,
        location: &str,
    ) -> Result<Vec<InstanceGroupSnapshot<I>>, CloudError>;
}

#[async_trait]
pub trait InstanceDeleter<I: InstanceIdentity>: Send + Sync {
    /// Deletes `instances` from `group`. An empty slice is a no-op.
    async fn delete_instances(&self, group: &str, instances: &[I]) -> Result<(), CloudError>;
}

/// The adapters of one cloud, built once per invocation.
pub struct CloudAdapters<I: InstanceIdentity> {
    pub lister: Arc<dyn InstanceLister<I>>,
    pub metrics: Arc<dyn MetricSource<I>>,
    pub deleter: Arc<dyn InstanceDeleter<I>>,
}

impl<I: InstanceIdentity> Clone for CloudAdapters<I> {
    fn clone(&self) -> Self {
        CloudAdapters {
            lister: self.lister.clone(),
            metrics: self.metrics.clone(),
            deleter: self.deleter.clone(),
        }
    }
}

impl<I: InstanceIdentity> CloudAdapters<I> {
    /// Uses one backend for all three capabilities.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: InstanceLister<I> + MetricSource<I> + InstanceDeleter<I> + 'static,
    {
        CloudAdapters {
            lister: backend.clone(),
            metrics: backend.clone(),
            deleter: backend,
        }
    }
}
