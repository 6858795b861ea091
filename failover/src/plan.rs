//! The per-invocation failover plan.
//!
//! A plan is built from configuration or decoded from persisted state, has its
//! counts set once from live cluster state, optionally falls back to defaults
//! and is then encoded again. It is never shared between invocations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{FailoverConfig, ValidationError};
use crate::identity::MetricQuery;
use crate::location::{
    LOCATION_COUNT, LocationCounts, Locations, count_instances_at_normalized_location,
    distribute_single_instance,
};
use crate::metrics_defs::PLAN_DEFAULTS_APPLIED;
use shared::counter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailoverMode {
    /// Fixed instance count per location
    Distributed,
    /// Exactly one active instance across all locations
    Single,
}

impl FailoverMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FailoverMode::Distributed => "distributed",
            FailoverMode::Single => "single",
        }
    }
}

impl fmt::Display for FailoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailoverMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "distributed" => Ok(FailoverMode::Distributed),
            "single" => Ok(FailoverMode::Single),
            _ => Err(ValidationError::UnknownFailoverMode(s.to_string())),
        }
    }
}

/// Where a plan was built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Config,
    State,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("expected at most {max} counts, got {got}")]
    TooManyCounts { got: usize, max: usize },
}

/// Values reported back to the caller after every invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PlanOutputs {
    pub primary_count: u32,
    pub secondary_count: u32,
    pub tertiary_count: u32,
    pub failover_instances: LocationCounts,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverPlan {
    pub prefix: String,
    pub mode: FailoverMode,
    pub metric_name: String,
    pub metric_namespace: String,
    /// Distributed-mode targets, also the fallback when no live state exists
    pub baseline_instances: LocationCounts,
    pub locations: Locations,
    /// Live or derived instance count per location
    pub counts: LocationCounts,
    pub source: PlanSource,
}

impl FailoverPlan {
    /// Builds an unset plan from validated configuration.
    pub fn from_config(config: &FailoverConfig) -> Result<Self, ValidationError> {
        let mode = config.validate()?;

        let locations: Locations = config.locations.clone().try_into().map_err(
            |locations: Vec<String>| ValidationError::WrongLocationCount {
                expected: LOCATION_COUNT,
                got: locations.len(),
            },
        )?;
        let baseline_instances: LocationCounts = config
            .instances
            .as_slice()
            .try_into()
            .map_err(|_| ValidationError::WrongInstanceCount {
                expected: LOCATION_COUNT,
                got: config.instances.len(),
            })?;

        Ok(FailoverPlan {
            prefix: config.prefix.clone(),
            mode,
            metric_name: config.metric_name.clone(),
            metric_namespace: config.metric_namespace.clone(),
            baseline_instances,
            locations,
            counts: [0; LOCATION_COUNT],
            source: PlanSource::Config,
        })
    }

    /// Sets the counts positionally. Positions not given fall back to the
    /// baseline, so an empty slice restores the baseline entirely.
    pub fn set_counts(&mut self, values: &[u32]) -> Result<(), PlanError> {
        if values.len() > LOCATION_COUNT {
            return Err(PlanError::TooManyCounts {
                got: values.len(),
                max: LOCATION_COUNT,
            });
        }

        let mut counts = self.baseline_instances;
        counts[..values.len()].copy_from_slice(values);
        self.counts = counts;

        tracing::debug!(prefix = %self.prefix, counts = ?self.counts, "set failover counts");
        Ok(())
    }

    /// Sets one instance at the configured location matching `location`.
    pub fn set_counts_at_location<F>(&mut self, location: &str, normalize: F)
    where
        F: Fn(&str) -> String,
    {
        self.counts = count_instances_at_normalized_location(&self.locations, location, normalize);
        tracing::debug!(
            prefix = %self.prefix,
            location,
            counts = ?self.counts,
            "set failover counts at validator location"
        );
    }

    /// True when no live signal has been recorded yet.
    pub fn is_unset(&self) -> bool {
        self.counts.iter().all(|count| *count == 0)
    }

    /// Distributed plans always follow the baseline. Single plans without any
    /// counts get one instance at the location with the largest baseline.
    pub fn apply_defaults_if_unset(&mut self) {
        match self.mode {
            FailoverMode::Distributed => self.counts = self.baseline_instances,
            FailoverMode::Single if self.is_unset() => {
                self.counts = distribute_single_instance(&self.baseline_instances);
                counter!(PLAN_DEFAULTS_APPLIED).increment(1);
                tracing::info!(
                    prefix = %self.prefix,
                    counts = ?self.counts,
                    "no live validator signal, seeding single instance"
                );
            }
            FailoverMode::Single => {}
        }
    }

    pub fn total_instances(&self) -> u32 {
        self.counts.iter().sum()
    }

    pub fn outputs(&self) -> PlanOutputs {
        let [primary_count, secondary_count, tertiary_count] = self.counts;
        PlanOutputs {
            primary_count,
            secondary_count,
            tertiary_count,
            failover_instances: self.counts,
        }
    }

    pub fn metric_query(&self) -> MetricQuery {
        MetricQuery {
            name: self.metric_name.clone(),
            namespace: self.metric_namespace.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::normalize_location;

    fn plan(mode: FailoverMode, baseline: LocationCounts) -> FailoverPlan {
        FailoverPlan {
            prefix: "test".to_string(),
            mode,
            metric_name: "validator_value".to_string(),
            metric_namespace: "validator".to_string(),
            baseline_instances: baseline,
            locations: [
                "Central US".to_string(),
                "East US".to_string(),
                "West US".to_string(),
            ],
            counts: [0; LOCATION_COUNT],
            source: PlanSource::Config,
        }
    }

    const BASELINES: &[LocationCounts] = &[[0, 0, 0], [1, 1, 1], [3, 0, 2], [10, 10, 11], [0, 7, 0]];

    #[test]
    fn test_set_counts_falls_back_to_baseline() {
        for baseline in BASELINES {
            let mut p = plan(FailoverMode::Distributed, *baseline);

            p.set_counts(&[]).unwrap();
            assert_eq!(p.counts, *baseline);

            p.set_counts(&[9]).unwrap();
            assert_eq!(p.counts, [9, baseline[1], baseline[2]]);

            p.set_counts(&[9, 8]).unwrap();
            assert_eq!(p.counts, [9, 8, baseline[2]]);

            p.set_counts(&[9, 8, 7]).unwrap();
            assert_eq!(p.counts, [9, 8, 7]);
        }
    }

    #[test]
    fn test_set_counts_rejects_extra_values() {
        let mut p = plan(FailoverMode::Single, [1, 1, 1]);
        p.set_counts(&[0, 1, 0]).unwrap();

        assert_eq!(
            p.set_counts(&[1, 2, 3, 4]),
            Err(PlanError::TooManyCounts { got: 4, max: 3 })
        );
        assert_eq!(p.counts, [0, 1, 0]);
    }

    #[test]
    fn test_is_unset() {
        let mut p = plan(FailoverMode::Single, [1, 1, 1]);
        assert!(p.is_unset());
        p.set_counts(&[0, 0, 1]).unwrap();
        assert!(!p.is_unset());
        p.set_counts(&[0, 0, 0]).unwrap();
        assert!(p.is_unset());
    }

    #[test]
    fn test_apply_defaults_is_idempotent() {
        let starting_counts: &[LocationCounts] = &[[0, 0, 0], [0, 1, 0], [2, 2, 2]];

        for mode in [FailoverMode::Distributed, FailoverMode::Single] {
            for baseline in BASELINES {
                for counts in starting_counts {
                    let mut p = plan(mode, *baseline);
                    p.counts = *counts;

                    p.apply_defaults_if_unset();
                    let once = p.counts;
                    p.apply_defaults_if_unset();
                    assert_eq!(p.counts, once, "mode {mode}, baseline {baseline:?}");
                }
            }
        }
    }

    #[test]
    fn test_apply_defaults() {
        let mut p = plan(FailoverMode::Distributed, [3, 2, 1]);
        p.apply_defaults_if_unset();
        assert_eq!(p.counts, [3, 2, 1]);

        // Distributed counts never drift from the baseline
        p.counts = [1, 0, 0];
        p.apply_defaults_if_unset();
        assert_eq!(p.counts, [3, 2, 1]);

        let mut p = plan(FailoverMode::Single, [1, 4, 2]);
        p.apply_defaults_if_unset();
        assert_eq!(p.counts, [0, 1, 0]);
        assert_eq!(p.total_instances(), 1);

        // A derived single-mode count is kept
        let mut p = plan(FailoverMode::Single, [1, 4, 2]);
        p.counts = [0, 0, 1];
        p.apply_defaults_if_unset();
        assert_eq!(p.counts, [0, 0, 1]);
    }

    #[test]
    fn test_set_counts_at_location() {
        let mut p = plan(FailoverMode::Single, [1, 1, 1]);
        p.set_counts_at_location("eastus", normalize_location);
        assert_eq!(p.counts, [0, 1, 0]);

        p.set_counts_at_location("", normalize_location);
        assert_eq!(p.counts, [1, 0, 0]);
    }

    #[test]
    fn test_outputs() {
        let mut p = plan(FailoverMode::Distributed, [3, 2, 1]);
        p.apply_defaults_if_unset();
        let outputs = p.outputs();
        assert_eq!(outputs.primary_count, 3);
        assert_eq!(outputs.secondary_count, 2);
        assert_eq!(outputs.tertiary_count, 1);
        assert_eq!(outputs.failover_instances, [3, 2, 1]);
        assert_eq!(
            outputs.primary_count + outputs.secondary_count + outputs.tertiary_count,
            p.total_instances()
        );
    }

    #[test]
    fn test_failover_mode_parse() {
        assert_eq!("single".parse::<FailoverMode>(), Ok(FailoverMode::Single));
        assert_eq!(" Distributed ".parse::<FailoverMode>(), Ok(FailoverMode::Distributed));
        assert_eq!(
            "both".parse::<FailoverMode>(),
            Err(ValidationError::UnknownFailoverMode("both".to_string()))
        );
        assert_eq!(FailoverMode::Single.to_string(), "single");
    }

    #[test]
    fn test_from_config() {
        let config = FailoverConfig {
            prefix: "test".to_string(),
            locations: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            instances: vec![2, 0, 1],
            failover_mode: "single".to_string(),
            metric_name: "m".to_string(),
            metric_namespace: "ns".to_string(),
        };

        let p = FailoverPlan::from_config(&config).unwrap();
        assert_eq!(p.mode, FailoverMode::Single);
        assert_eq!(p.baseline_instances, [2, 0, 1]);
        assert_eq!(p.locations, ["a", "b", "c"].map(String::from));
        assert!(p.is_unset());
        assert_eq!(p.source, PlanSource::Config);

        let mut invalid = config.clone();
        invalid.instances = vec![1];
        assert_eq!(
            FailoverPlan::from_config(&invalid),
            Err(ValidationError::WrongInstanceCount {
                expected: 3,
                got: 1
            })
        );

        let mut invalid = config;
        invalid.locations.push("d".to_string());
        assert_eq!(
            FailoverPlan::from_config(&invalid),
            Err(ValidationError::WrongLocationCount {
                expected: 3,
                got: 4
            })
        );
    }
}
