//! Finds the single instance currently acting as the validator.

use crate::errors::{FailoverError, Result};
use crate::identity::{InstanceIdentity, ValidatorCandidate};
use crate::metrics_defs::{VALIDATOR_AMBIGUOUS, VALIDATOR_FOUND, VALIDATOR_NOT_FOUND};
use shared::counter;

/// Metric value reported by the instance that is actively validating.
pub const VALIDATOR_ACTIVE_VALUE: f64 = 1.0;

fn is_active(value: f64) -> bool {
    (value - VALIDATOR_ACTIVE_VALUE).abs() < f64::EPSILON
}

/// Picks the one candidate whose latest metric sample is the active value.
///
/// A sample of `None` means the instance has no recent data point. It is never
/// a candidate but is counted in the `ValidatorNotFound` error so a scrape gap
/// can be told apart from a cluster with no validator.
pub fn locate_validator<I, S>(samples: S) -> Result<ValidatorCandidate<I>>
where
    I: InstanceIdentity,
    S: IntoIterator<Item = (ValidatorCandidate<I>, Option<f64>)>,
{
    let mut not_reporting = 0;
    let mut active = Vec::new();

    for (candidate, value) in samples {
        match value {
            Some(value) if is_active(value) => active.push(candidate),
            Some(_) => {}
            None => not_reporting += 1,
        }
    }

    let mut active = active.into_iter();
    match (active.next(), active.next()) {
        (None, _) => {
            counter!(VALIDATOR_NOT_FOUND).increment(1);
            tracing::debug!(not_reporting, "no instance reports the active validator value");
            Err(FailoverError::ValidatorNotFound { not_reporting })
        }
        (Some(candidate), None) => {
            counter!(VALIDATOR_FOUND).increment(1);
            tracing::debug!(validator = %candidate, "located validator");
            Ok(candidate)
        }
        (Some(first), Some(second)) => {
            let mut candidates: Vec<String> = [first, second]
                .into_iter()
                .chain(active)
                .map(|c| c.to_string())
                .collect();
            candidates.sort();

            counter!(VALIDATOR_AMBIGUOUS).increment(1);
            tracing::error!(
                count = candidates.len(),
                candidates = ?candidates,
                "multiple instances report as the active validator"
            );
            Err(FailoverError::ValidatorAmbiguous { candidates })
        }
    }
}
