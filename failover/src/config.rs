use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::location::{LOCATION_COUNT, normalize_location};
use crate::plan::FailoverMode;

pub const MAX_PREFIX_LEN: usize = 64;

// Path separators, brackets and shell metacharacters. Resource names across all
// three clouds are derived from the prefix.
const FORBIDDEN_PREFIX_CHARS: &[char] = &[
    '/', '\\', '[', ']', ':', ';', '|', '=', ',', '+', '*', '?', '<', '>', '"', '\'', '`', '$',
    '&', '!', '(', ')', '{', '}', '#', '%',
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("prefix cannot be empty")]
    EmptyPrefix,

    #[error("prefix is {len} characters long, at most {max} are allowed")]
    PrefixTooLong { len: usize, max: usize },

    #[error("prefix contains forbidden character {0:?}")]
    InvalidPrefixCharacter(char),

    #[error("prefix cannot start with '_'")]
    PrefixLeadingUnderscore,

    #[error("prefix cannot end with {0:?}")]
    PrefixTrailingCharacter(char),

    #[error("expected {expected} locations, got {got}")]
    WrongLocationCount { expected: usize, got: usize },

    #[error("location {0} is empty")]
    EmptyLocation(usize),

    #[error("duplicate location: {0}")]
    DuplicateLocation(String),

    #[error("expected {expected} instance counts, got {got}")]
    WrongInstanceCount { expected: usize, got: usize },

    #[error("unknown failover mode: {0}")]
    UnknownFailoverMode(String),

    #[error("metric name cannot be empty")]
    EmptyMetricName,

    #[error("metric namespace cannot be empty")]
    EmptyMetricNamespace,
}

/// Failover resource configuration, consumed once when a plan is built.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct FailoverConfig {
    /// Namespace shared by every resource of one deployment
    pub prefix: String,
    /// Primary, secondary and tertiary locations
    pub locations: Vec<String>,
    /// Distributed-mode instance count per location
    pub instances: Vec<u32>,
    /// Either "distributed" or "single"
    #[serde(default = "default_failover_mode")]
    pub failover_mode: String,
    pub metric_name: String,
    pub metric_namespace: String,
}

fn default_failover_mode() -> String {
    FailoverMode::Distributed.to_string()
}

impl FailoverConfig {
    /// Validates the configuration, returning the parsed failover mode.
    pub fn validate(&self) -> Result<FailoverMode, ValidationError> {
        validate_prefix(&self.prefix)?;

        if self.locations.len() != LOCATION_COUNT {
            return Err(ValidationError::WrongLocationCount {
                expected: LOCATION_COUNT,
                got: self.locations.len(),
            });
        }

        validate_locations(self.locations.as_slice(), normalize_location)?;

        if self.instances.len() != LOCATION_COUNT {
            return Err(ValidationError::WrongInstanceCount {
                expected: LOCATION_COUNT,
                got: self.instances.len(),
            });
        }

        if self.metric_name.trim().is_empty() {
            return Err(ValidationError::EmptyMetricName);
        }

        if self.metric_namespace.trim().is_empty() {
            return Err(ValidationError::EmptyMetricNamespace);
        }

        self.failover_mode.parse()
    }
}

/// Rejects empty locations and locations that coincide under `normalize`.
///
/// Clouds can map locations more coarsely than [`normalize_location`], GCP and
/// AWS fold zones into their region. Callers that know the cloud check again
/// with its mapping.
pub fn validate_locations<S, F>(locations: &[S], normalize: F) -> Result<(), ValidationError>
where
    S: AsRef<str>,
    F: Fn(&str) -> String,
{
    let mut seen = HashSet::new();
    for (idx, location) in locations.iter().enumerate() {
        let location = location.as_ref();
        let normalized = normalize(location);
        if normalized.is_empty() {
            return Err(ValidationError::EmptyLocation(idx));
        }
        if !seen.insert(normalized) {
            return Err(ValidationError::DuplicateLocation(location.to_string()));
        }
    }
    Ok(())
}

fn validate_prefix(prefix: &str) -> Result<(), ValidationError> {
    let Some(first) = prefix.chars().next() else {
        return Err(ValidationError::EmptyPrefix);
    };

    let len = prefix.chars().count();
    if len > MAX_PREFIX_LEN {
        return Err(ValidationError::PrefixTooLong {
            len,
            max: MAX_PREFIX_LEN,
        });
    }

    if let Some(c) = prefix
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_PREFIX_CHARS.contains(c))
    {
        return Err(ValidationError::InvalidPrefixCharacter(c));
    }

    if first == '_' {
        return Err(ValidationError::PrefixLeadingUnderscore);
    }

    match prefix.chars().last() {
        Some(c @ ('.' | '-')) => Err(ValidationError::PrefixTrailingCharacter(c)),
        _ => Ok(()),
    }
}
