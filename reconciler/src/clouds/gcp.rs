use failover::{InstanceIdentity, normalize_location};
use std::fmt;

use super::Cloud;

pub struct Gcp;

/// A compute instance in a managed instance group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GcpInstance {
    pub instance_group: String,
    pub name: String,
}

impl fmt::Display for GcpInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instance_group, self.name)
    }
}

impl InstanceIdentity for GcpInstance {
    fn group(&self) -> &str {
        &self.instance_group
    }

    // Monitoring labels carry the instance name only.
    fn is_same_instance(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Cloud for Gcp {
    type Instance = GcpInstance;

    const NAME: &'static str = "gcp";

    /// Instances live in zones (`us-central1-a`), configuration names regions
    /// (`us-central1`).
    fn normalize_location(location: &str) -> String {
        let normalized = normalize_location(location);
        match normalized.rsplit_once('-') {
            Some((region, zone))
                if zone.len() == 1
                    && zone.chars().all(|c| c.is_ascii_lowercase())
                    && region.ends_with(|c: char| c.is_ascii_digit()) =>
            {
                region.to_string()
            }
            _ => normalized,
        }
    }

    fn instance(group: &str, name: &str) -> GcpInstance {
        GcpInstance {
            instance_group: group.to_string(),
            name: name.to_string(),
        }
    }
}
