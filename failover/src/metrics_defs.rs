//! Metrics definitions for the failover decision logic.

use shared::metrics_defs::{MetricDef, MetricType};

pub const VALIDATOR_FOUND: MetricDef = MetricDef {
    name: "validator.found",
    metric_type: MetricType::Counter,
    description: "Number of lookups that located exactly one validator",
};

pub const VALIDATOR_NOT_FOUND: MetricDef = MetricDef {
    name: "validator.not_found",
    metric_type: MetricType::Counter,
    description: "Number of lookups where no instance reported the active validator value",
};

pub const VALIDATOR_AMBIGUOUS: MetricDef = MetricDef {
    name: "validator.ambiguous",
    metric_type: MetricType::Counter,
    description: "Number of lookups where more than one instance reported as the validator",
};

pub const SURPLUS_SELECTED: MetricDef = MetricDef {
    name: "surplus.selected",
    metric_type: MetricType::Histogram,
    description: "Number of instances selected for deletion in single mode",
};

pub const PLAN_DEFAULTS_APPLIED: MetricDef = MetricDef {
    name: "plan.defaults_applied",
    metric_type: MetricType::Counter,
    description: "Number of single-mode plans seeded from the baseline",
};

pub const ALL_METRICS: &[MetricDef] = &[
    VALIDATOR_FOUND,
    VALIDATOR_NOT_FOUND,
    VALIDATOR_AMBIGUOUS,
    SURPLUS_SELECTED,
    PLAN_DEFAULTS_APPLIED,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_unique() {
        assert_eq!(shared::metrics_defs::find_duplicate(ALL_METRICS), None);
    }
}
