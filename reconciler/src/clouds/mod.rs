//! Per-cloud identity types and location conventions.

mod aws;
mod azure;
mod gcp;

pub use aws::{Aws, AwsInstance};
pub use azure::{Azure, AzureInstance};
pub use gcp::{Gcp, GcpInstance};

use failover::InstanceIdentity;

pub trait Cloud: Send + Sync + 'static {
    type Instance: InstanceIdentity;

    const NAME: &'static str;

    /// Maps user input and API-reported locations onto one comparable form.
    fn normalize_location(location: &str) -> String;

    /// Builds an identity from a group name and the instance name the cloud lists.
    fn instance(group: &str, name: &str) -> Self::Instance;
}
