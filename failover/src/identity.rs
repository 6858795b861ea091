//! Instance identities and the live-state snapshots built from them.

use std::fmt;
use std::hash::Hash;

use crate::location::{LOCATION_COUNT, LocationCounts, location_name};

/// A cloud-specific handle on one compute instance.
///
/// AWS identifies instances by ID, Azure by hostname within a scale set and
/// GCP by name within an instance group. `is_same_instance` lets each cloud
/// decide how a metric-reported identity matches a listed one.
pub trait InstanceIdentity:
    Clone + fmt::Debug + fmt::Display + Eq + Hash + Send + Sync + 'static
{
    /// Name of the auto-scaling group, scale set or instance group owning the instance.
    fn group(&self) -> &str;

    fn is_same_instance(&self, other: &Self) -> bool {
        self == other
    }
}

/// Identifies the metric reported by validator instances.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricQuery {
    pub name: String,
    pub namespace: String,
}

/// An instance that may be the active validator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ValidatorCandidate<I> {
    pub instance: I,
    pub location_index: usize,
}

impl<I: fmt::Display> fmt::Display for ValidatorCandidate<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.instance,
            location_name(self.location_index)
        )
    }
}

/// Live instances of one group in one location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceGroupSnapshot<I> {
    pub group: String,
    pub location_index: usize,
    /// Location as reported by the cloud, not normalized
    pub location: String,
    pub instances: Vec<I>,
}

/// Every live group of one deployment, ordered by location index then group name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterSnapshot<I> {
    groups: Vec<InstanceGroupSnapshot<I>>,
}

impl<I: InstanceIdentity> ClusterSnapshot<I> {
    pub fn new(mut groups: Vec<InstanceGroupSnapshot<I>>) -> Self {
        groups.sort_by(|a, b| {
            a.location_index
                .cmp(&b.location_index)
                .then_with(|| a.group.cmp(&b.group))
        });
        ClusterSnapshot { groups }
    }

    pub fn groups(&self) -> &[InstanceGroupSnapshot<I>] {
        &self.groups
    }

    pub fn instance_count(&self) -> usize {
        self.groups.iter().map(|g| g.instances.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.instance_count() == 0
    }

    pub fn counts_per_location(&self) -> LocationCounts {
        let mut counts = [0; LOCATION_COUNT];
        for group in &self.groups {
            if let Some(count) = counts.get_mut(group.location_index) {
                *count += group.instances.len() as u32;
            }
        }
        counts
    }

    /// Every live instance as a potential validator.
    pub fn candidates(&self) -> impl Iterator<Item = ValidatorCandidate<I>> + '_ {
        self.groups.iter().flat_map(|group| {
            group.instances.iter().map(|instance| ValidatorCandidate {
                instance: instance.clone(),
                location_index: group.location_index,
            })
        })
    }

    /// Cloud-reported location of the group holding `instance`.
    pub fn location_of(&self, instance: &I) -> Option<&str> {
        self.groups
            .iter()
            .find(|group| group.instances.iter().any(|i| i.is_same_instance(instance)))
            .map(|group| group.location.as_str())
    }
}
