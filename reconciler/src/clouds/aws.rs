use failover::{InstanceIdentity, normalize_location};
use std::fmt;

use super::Cloud;

pub struct Aws;

/// An EC2 instance in an auto-scaling group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AwsInstance {
    pub auto_scaling_group: String,
    pub instance_id: String,
}

impl fmt::Display for AwsInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.auto_scaling_group, self.instance_id)
    }
}

impl InstanceIdentity for AwsInstance {
    fn group(&self) -> &str {
        &self.auto_scaling_group
    }

    // Instance ids are unique per account, CloudWatch reports them without the group.
    fn is_same_instance(&self, other: &Self) -> bool {
        self.instance_id == other.instance_id
    }
}

impl Cloud for Aws {
    type Instance = AwsInstance;

    const NAME: &'static str = "aws";

    /// Instances report their availability zone (`us-east-1a`), configuration
    /// uses the region (`us-east-1`).
    fn normalize_location(location: &str) -> String {
        let mut normalized = normalize_location(location);
        let mut tail = normalized.chars().rev();
        if let (Some(zone), Some(digit)) = (tail.next(), tail.next())
            && zone.is_ascii_lowercase()
            && digit.is_ascii_digit()
        {
            normalized.pop();
        }
        normalized
    }

    fn instance(group: &str, name: &str) -> AwsInstance {
        AwsInstance {
            auto_scaling_group: group.to_string(),
            instance_id: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_location() {
        assert_eq!(Aws::normalize_location("us-east-1"), "us-east-1");
        assert_eq!(Aws::normalize_location("us-east-1a"), "us-east-1");
        assert_eq!(Aws::normalize_location(" EU-WEST-2C "), "eu-west-2");
        assert_eq!(Aws::normalize_location("a"), "a");
        assert_eq!(Aws::normalize_location(""), "");
    }

    #[test]
    fn test_same_instance_ignores_group() {
        let listed = Aws::instance("validator-asg-0", "i-0abc");
        let reported = Aws::instance("", "i-0abc");
        assert!(listed.is_same_instance(&reported));
        assert!(!listed.is_same_instance(&Aws::instance("validator-asg-0", "i-0def")));
        assert_eq!(listed.to_string(), "validator-asg-0/i-0abc");
    }
}
