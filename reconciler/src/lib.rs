//! Drives the failover decision logic against live cloud state.
//!
//! Cloud access goes through the capability traits in [`capabilities`]. Each
//! lifecycle call builds a [`Reconciler`] with explicit adapters, gathers a
//! snapshot with per-location fan-out and hands it to the `failover` crate.

pub mod capabilities;
pub mod clouds;
pub mod config;
pub mod executor;
pub mod memory;
pub mod metrics_defs;
pub mod reconcile;
pub mod wait;

pub use capabilities::{CloudAdapters, InstanceDeleter, InstanceLister, MetricSource};
pub use clouds::{Aws, Azure, Cloud, Gcp};
pub use config::{ReconcileSettings, SettingsError};
pub use memory::{ClusterSpec, InMemoryCloud};
pub use reconcile::{ReconcileOutcome, Reconciler};
