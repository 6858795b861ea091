//! A cloud held entirely in memory.
//!
//! Backs the CLI (loaded from a snapshot file) and every reconciler test.
//! Faults can be injected per location, per group or for all metric queries.

use async_trait::async_trait;
use failover::{CloudError, InstanceGroupSnapshot, InstanceIdentity, MetricQuery};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::capabilities::{InstanceDeleter, InstanceLister, MetricSource};
use crate::clouds::Cloud;

/// Serializable description of the live cluster.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ClusterSpec {
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GroupSpec {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub instances: Vec<InstanceSpec>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct InstanceSpec {
    pub name: String,
    /// Latest validator metric sample, absent when the instance is not reporting
    #[serde(default)]
    pub metric: Option<f64>,
}

struct MemoryInstance<I> {
    identity: I,
    name: String,
    metric: Option<f64>,
}

struct MemoryGroup<I> {
    name: String,
    location: String,
    instances: Vec<MemoryInstance<I>>,
}

#[derive(Default)]
struct Faults {
    // keyed by normalized location
    list: HashMap<String, CloudError>,
    // keyed by group name
    delete: HashMap<String, CloudError>,
    metrics: Option<CloudError>,
}

pub struct InMemoryCloud<C: Cloud> {
    groups: Mutex<Vec<MemoryGroup<C::Instance>>>,
    faults: Mutex<Faults>,
    deleted: Mutex<Vec<C::Instance>>,
}

impl<C: Cloud> Default for InMemoryCloud<C> {
    fn default() -> Self {
        InMemoryCloud {
            groups: Mutex::new(Vec::new()),
            faults: Mutex::new(Faults::default()),
            deleted: Mutex::new(Vec::new()),
        }
    }
}

impl<C: Cloud> InMemoryCloud<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_spec(spec: &ClusterSpec) -> Self {
        let cloud = Self::new();
        for group in &spec.groups {
            let instances: Vec<_> = group
                .instances
                .iter()
                .map(|i| (i.name.as_str(), i.metric))
                .collect();
            cloud.add_group(&group.name, &group.location, &instances);
        }
        cloud
    }

    /// Current state, in the same form it was loaded from.
    pub fn spec(&self) -> ClusterSpec {
        let groups = self.groups.lock();
        ClusterSpec {
            groups: groups
                .iter()
                .map(|group| GroupSpec {
                    name: group.name.clone(),
                    location: group.location.clone(),
                    instances: group
                        .instances
                        .iter()
                        .map(|i| InstanceSpec {
                            name: i.name.clone(),
                            metric: i.metric,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn add_group(&self, name: &str, location: &str, instances: &[(&str, Option<f64>)]) {
        let instances = instances
            .iter()
            .map(|(instance, metric)| MemoryInstance {
                identity: C::instance(name, instance),
                name: instance.to_string(),
                metric: *metric,
            })
            .collect();

        self.groups.lock().push(MemoryGroup {
            name: name.to_string(),
            location: location.to_string(),
            instances,
        });
    }

    /// Updates the metric of one instance. Returns false if it does not exist.
    pub fn set_metric(&self, group: &str, instance: &str, metric: Option<f64>) -> bool {
        let mut groups = self.groups.lock();
        let target = groups
            .iter_mut()
            .filter(|g| g.name == group)
            .flat_map(|g| g.instances.iter_mut())
            .find(|i| i.name == instance);

        match target {
            Some(instance) => {
                instance.metric = metric;
                true
            }
            None => false,
        }
    }

    pub fn fail_listing(&self, location: &str, error: CloudError) {
        self.faults
            .lock()
            .list
            .insert(C::normalize_location(location), error);
    }

    pub fn fail_deletion(&self, group: &str, error: CloudError) {
        self.faults.lock().delete.insert(group.to_string(), error);
    }

    pub fn fail_metrics(&self, error: CloudError) {
        self.faults.lock().metrics = Some(error);
    }

    pub fn instance_count(&self) -> usize {
        self.groups.lock().iter().map(|g| g.instances.len()).sum()
    }

    /// Every instance deleted so far, in deletion order.
    pub fn deleted(&self) -> Vec<C::Instance> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl<C: Cloud> InstanceLister<C::Instance> for InMemoryCloud<C> {
    async fn list_instances(
        &self,
        prefix: &str,
        location_index: usize,
        location: &str,
    ) -> Result<Vec<InstanceGroupSnapshot<C::Instance>>, CloudError> {
        let location = C::normalize_location(location);
        if let Some(error) = self.faults.lock().list.get(&location) {
            return Err(error.clone());
        }

        let groups = self.groups.lock();
        Ok(groups
            .iter()
            .filter(|g| g.name.starts_with(prefix) && C::normalize_location(&g.location) == location)
            .map(|g| InstanceGroupSnapshot {
                group: g.name.clone(),
                location_index,
                location: g.location.clone(),
                instances: g.instances.iter().map(|i| i.identity.clone()).collect(),
            })
            .collect())
    }
}

#[async_trait]
impl<C: Cloud> MetricSource<C::Instance> for InMemoryCloud<C> {
    async fn query_latest_metric(
        &self,
        _query: &MetricQuery,
        instance: &C::Instance,
    ) -> Result<Option<f64>, CloudError> {
        if let Some(error) = &self.faults.lock().metrics {
            return Err(error.clone());
        }

        let groups = self.groups.lock();
        Ok(groups
            .iter()
            .flat_map(|g| g.instances.iter())
            .find(|i| i.identity.is_same_instance(instance))
            .and_then(|i| i.metric))
    }
}

#[async_trait]
impl<C: Cloud> InstanceDeleter<C::Instance> for InMemoryCloud<C> {
    async fn delete_instances(
        &self,
        group: &str,
        instances: &[C::Instance],
    ) -> Result<(), CloudError> {
        if instances.is_empty() {
            return Ok(());
        }

        if let Some(error) = self.faults.lock().delete.get(group) {
            return Err(error.clone());
        }

        let mut groups = self.groups.lock();
        let Some(target) = groups.iter_mut().find(|g| g.name == group) else {
            return Err(not_found(format!("group {group}")));
        };

        if let Some(missing) = instances.iter().find(|i| {
            i.group() != group || !target.instances.iter().any(|t| t.identity.is_same_instance(i))
        }) {
            return Err(not_found(format!("instance {missing} in group {group}")));
        }

        let mut deleted = self.deleted.lock();
        target.instances.retain(|t| {
            let delete = instances.iter().any(|i| t.identity.is_same_instance(i));
            if delete {
                deleted.push(t.identity.clone());
            }
            !delete
        });

        Ok(())
    }
}

fn not_found(what: String) -> CloudError {
    CloudError::Api {
        code: "NotFound".to_string(),
        message: format!("{what} does not exist"),
    }
}
