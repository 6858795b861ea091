use failover::{FailoverConfig, ValidationError, validate_locations};
use reconciler::{Aws, Azure, Cloud, Gcp, ReconcileSettings, SettingsError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
    Gcp,
}

#[derive(Debug, Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub provider: Provider,
    pub failover: FailoverConfig,
    #[serde(default)]
    pub reconcile: ReconcileSettings,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Config = read_yaml(path)?;
        config.validate()?;

        Ok(config)
    }

    /// Rejects malformed input before any cloud call is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.failover.validate()?;

        let locations = self.failover.locations.as_slice();
        match self.provider {
            Provider::Aws => validate_locations(locations, Aws::normalize_location)?,
            Provider::Azure => validate_locations(locations, Azure::normalize_location)?,
            Provider::Gcp => validate_locations(locations, Gcp::normalize_location)?,
        }

        self.reconcile.validate()?;
        Ok(())
    }
}

pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let file = File::open(path)?;
    let data = serde_yaml::from_reader(file)?;

    Ok(data)
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid failover config: {0}")]
    Failover(#[from] ValidationError),
    #[error("invalid reconcile config: {0}")]
    Reconcile(#[from] SettingsError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            provider: azure
            failover:
                prefix: validator
                locations: [Central US, East US, West US]
                instances: [1, 1, 1]
                failover_mode: single
                metric_name: validator_value
                metric_namespace: validator
            reconcile:
                poll_interval_secs: 10
                timeout_secs: 300
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://public@sentry.example.com/1
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.provider, Provider::Azure);
        assert_eq!(config.failover.locations[1], "East US");
        assert_eq!(config.reconcile.poll_interval(), Duration::from_secs(10));

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        let logging = config.common.logging.expect("logging config");
        assert_eq!(logging.level, "info");
        assert!(logging.sentry_dsn.is_some());
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let yaml = r#"
            provider: gcp
            failover:
                prefix: validator
                locations: [us-central1, us-east1, europe-west1]
                instances: [2, 1, 0]
                metric_name: validator_value
                metric_namespace: validator
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.provider, Provider::Gcp);
        assert_eq!(config.failover.failover_mode, "distributed");
        assert_eq!(config.reconcile, ReconcileSettings::default());
        assert!(config.common.metrics.is_none());
        assert!(config.common.logging.is_none());
    }

    #[test]
    fn invalid_configs() {
        let unknown_provider = r#"
            provider: oracle
            failover:
                prefix: validator
                locations: [a, b, c]
                instances: [1, 1, 1]
                metric_name: m
                metric_namespace: n
            "#;
        let tmp = write_tmp_file(unknown_provider);
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));

        let bad_prefix = r#"
            provider: aws
            failover:
                prefix: "validator/"
                locations: [a, b, c]
                instances: [1, 1, 1]
                metric_name: m
                metric_namespace: n
            "#;
        let tmp = write_tmp_file(bad_prefix);
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::Failover(ValidationError::InvalidPrefixCharacter('/')))
        ));

        let zero_interval = r#"
            provider: aws
            failover:
                prefix: validator
                locations: [a, b, c]
                instances: [1, 1, 1]
                metric_name: m
                metric_namespace: n
            reconcile:
                poll_interval_secs: 0
            "#;
        let tmp = write_tmp_file(zero_interval);
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::Reconcile(SettingsError::ZeroPollInterval))
        ));

        let same_region = r#"
            provider: gcp
            failover:
                prefix: validator
                locations: [us-central1-a, us-central1-b, europe-west4-a]
                instances: [1, 1, 1]
                metric_name: m
                metric_namespace: n
            "#;
        let tmp = write_tmp_file(same_region);
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::Failover(ValidationError::DuplicateLocation(l))) if l == "us-central1-b"
        ));

        // Distinct zones are fine where zones are not folded into regions
        let zones = same_region.replace("provider: gcp", "provider: azure");
        let tmp = write_tmp_file(&zones);
        assert!(Config::from_file(tmp.path()).is_ok());

        assert!(matches!(
            Config::from_file(Path::new("/nonexistent/config.yaml")),
            Err(ConfigError::LoadError(_))
        ));
    }
}
