use failover::{InstanceIdentity, normalize_location};
use std::fmt;

use super::Cloud;

pub struct Azure;

/// A virtual machine in a scale set. Azure Monitor reports the validator
/// metric per scale set with a hostname dimension, so the hostname is the
/// identity rather than the VM instance id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AzureInstance {
    pub scale_set: String,
    pub hostname: String,
}

impl fmt::Display for AzureInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scale_set, self.hostname)
    }
}

impl InstanceIdentity for AzureInstance {
    fn group(&self) -> &str {
        &self.scale_set
    }

    // Computer names come back in varying case from the metric dimension.
    fn is_same_instance(&self, other: &Self) -> bool {
        self.scale_set.eq_ignore_ascii_case(&other.scale_set)
            && self.hostname.eq_ignore_ascii_case(&other.hostname)
    }
}

impl Cloud for Azure {
    type Instance = AzureInstance;

    const NAME: &'static str = "azure";

    /// Display names (`East US`) and API names (`eastus`) both appear.
    fn normalize_location(location: &str) -> String {
        normalize_location(location)
    }

    fn instance(group: &str, name: &str) -> AzureInstance {
        AzureInstance {
            scale_set: group.to_string(),
            hostname: name.to_string(),
        }
    }
}
