use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("poll interval cannot be 0")]
    ZeroPollInterval,

    #[error("timeout ({timeout_secs}s) is shorter than the poll interval ({poll_interval_secs}s)")]
    TimeoutShorterThanPollInterval {
        timeout_secs: u64,
        poll_interval_secs: u64,
    },
}

/// Bounds for every cloud interaction of one lifecycle call.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Interval between convergence polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Deadline for the whole lifecycle call, fan-out and waits included
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        ReconcileSettings {
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ReconcileSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.poll_interval_secs == 0 {
            return Err(SettingsError::ZeroPollInterval);
        }
        if self.timeout_secs < self.poll_interval_secs {
            return Err(SettingsError::TimeoutShorterThanPollInterval {
                timeout_secs: self.timeout_secs,
                poll_interval_secs: self.poll_interval_secs,
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings: ReconcileSettings = serde_yaml::from_str("{}").unwrap();
        assert_eq!(settings, ReconcileSettings::default());
        assert_eq!(settings.poll_interval(), Duration::from_secs(5));
        assert_eq!(settings.timeout(), Duration::from_secs(600));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let settings = ReconcileSettings {
            poll_interval_secs: 0,
            timeout_secs: 10,
        };
        assert_eq!(settings.validate(), Err(SettingsError::ZeroPollInterval));

        let settings = ReconcileSettings {
            poll_interval_secs: 30,
            timeout_secs: 10,
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::TimeoutShorterThanPollInterval {
                timeout_secs: 10,
                poll_interval_secs: 30
            })
        );
    }
}
