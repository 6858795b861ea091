//! Failover arbitration for a validator cluster spread over three locations.
//!
//! Everything in this crate is synchronous and free of I/O. Cloud access lives
//! behind the capability traits of the `reconciler` crate, which gathers live
//! state and feeds it into the decision functions exported here.

pub mod config;
pub mod errors;
pub mod identity;
pub mod location;
pub mod metrics_defs;
pub mod plan;
pub mod state;
pub mod surplus;
pub mod validator;

#[cfg(test)]
pub(crate) mod testutils;

pub use config::{FailoverConfig, ValidationError, validate_locations};
pub use errors::{CloudError, FailoverError, GroupFailure, Result, WaitOperation};
pub use identity::{
    ClusterSnapshot, InstanceGroupSnapshot, InstanceIdentity, MetricQuery, ValidatorCandidate,
};
pub use location::{
    LOCATION_COUNT, LocationCounts, Locations, count_instances_at_normalized_location,
    distribute_single_instance, normalize_location,
};
pub use plan::{FailoverMode, FailoverPlan, PlanError, PlanOutputs, PlanSource};
pub use state::{Compression, StateCodec, StateError};
pub use surplus::{DeleteSet, select_surplus, surplus_count};
pub use validator::{VALIDATOR_ACTIVE_VALUE, locate_validator};
