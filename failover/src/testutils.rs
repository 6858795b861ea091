use std::fmt;

use crate::identity::{InstanceGroupSnapshot, InstanceIdentity};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TestInstance {
    pub group: String,
    pub id: String,
}

impl TestInstance {
    pub fn new(group: &str, id: &str) -> Self {
        TestInstance {
            group: group.to_string(),
            id: id.to_string(),
        }
    }
}

impl fmt::Display for TestInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.id)
    }
}

impl InstanceIdentity for TestInstance {
    fn group(&self) -> &str {
        &self.group
    }
}

pub fn group(
    name: &str,
    location_index: usize,
    location: &str,
    ids: &[&str],
) -> InstanceGroupSnapshot<TestInstance> {
    InstanceGroupSnapshot {
        group: name.to_string(),
        location_index,
        location: location.to_string(),
        instances: ids.iter().map(|id| TestInstance::new(name, id)).collect(),
    }
}
