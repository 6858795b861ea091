//! Metrics definitions for the reconciler.

use shared::metrics_defs::{MetricDef, MetricType};

pub const INSTANCES_DELETED: MetricDef = MetricDef {
    name: "reconcile.instances_deleted",
    metric_type: MetricType::Counter,
    description: "Number of surplus instances deleted",
};

pub const DELETION_FAILED: MetricDef = MetricDef {
    name: "reconcile.deletion_failed",
    metric_type: MetricType::Counter,
    description: "Number of groups whose instance deletion failed",
};

pub const FANOUT_TIMEOUT: MetricDef = MetricDef {
    name: "reconcile.fanout.timeout",
    metric_type: MetricType::Counter,
    description: "Number of fan-out tasks still pending at the deadline",
};

pub const WAIT_ATTEMPTS: MetricDef = MetricDef {
    name: "reconcile.wait.attempts",
    metric_type: MetricType::Histogram,
    description: "Number of polls a convergence wait needed",
};

pub const LIVE_INSTANCES: MetricDef = MetricDef {
    name: "reconcile.live_instances",
    metric_type: MetricType::Gauge,
    description: "Live instances of the deployment in the latest snapshot",
};

pub const RECONCILE_DURATION: MetricDef = MetricDef {
    name: "reconcile.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a lifecycle call in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    INSTANCES_DELETED,
    DELETION_FAILED,
    FANOUT_TIMEOUT,
    WAIT_ATTEMPTS,
    LIVE_INSTANCES,
    RECONCILE_DURATION,
];
