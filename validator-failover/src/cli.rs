use clap::{Parser, Subcommand};
use failover::{FailoverError, FailoverPlan, PlanOutputs, StateCodec, StateError};
use reconciler::{Aws, Azure, Cloud, CloudAdapters, ClusterSpec, Gcp, InMemoryCloud, Reconciler};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{CommonConfig, Config, ConfigError, Provider, read_yaml};
use crate::telemetry;

#[derive(Parser, Debug)]
#[command(name = "validator-failover", version, about = "Validator failover across three locations")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the configuration and print the plan it yields without live state
    Plan {
        #[arg(long)]
        config: PathBuf,
    },
    /// Refresh a persisted plan from a cluster snapshot
    Read {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        state: String,
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Create (or update, given a previous state) a plan and converge the
    /// snapshot cluster toward it
    Apply {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Print a persisted plan as JSON
    DecodeState { state: String },
}

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Failover(#[from] FailoverError),
    #[error("invalid state: {0}")]
    State(#[from] StateError),
    #[error("invalid sentry dsn: {0}")]
    Dsn(#[from] sentry::types::ParseDsnError),
    #[error("could not set up telemetry: {0}")]
    Telemetry(String),
    #[error("could not write output: {0}")]
    Output(#[from] serde_json::Error),
}

/// What every lifecycle command prints.
#[derive(Debug, Serialize)]
pub struct Report {
    #[serde(flatten)]
    pub outputs: PlanOutputs,
    /// Encoded plan to pass to the next invocation
    pub state: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<String>,
    /// Cluster left behind by `apply`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterSpec>,
}

impl Cli {
    pub async fn run(self) -> Result<(), CliError> {
        let output = match &self.command {
            Command::Plan { config } => {
                let config = Config::from_file(config)?;
                let _sentry = telemetry::init(&config.common)?;
                serde_json::to_string_pretty(&plan(&config)?)?
            }
            Command::Read {
                config,
                state,
                snapshot,
            } => {
                let config = Config::from_file(config)?;
                let _sentry = telemetry::init(&config.common)?;
                serde_json::to_string_pretty(&read(&config, state, snapshot).await?)?
            }
            Command::Apply {
                config,
                state,
                snapshot,
            } => {
                let config = Config::from_file(config)?;
                let _sentry = telemetry::init(&config.common)?;
                serde_json::to_string_pretty(&apply(&config, state.as_deref(), snapshot).await?)?
            }
            Command::DecodeState { state } => {
                let _sentry = telemetry::init(&CommonConfig::default())?;
                serde_json::to_string_pretty(&decode_state(state)?)?
            }
        };

        println!("{output}");
        Ok(())
    }
}

pub fn plan(config: &Config) -> Result<Report, CliError> {
    let mut plan = FailoverPlan::from_config(&config.failover).map_err(FailoverError::from)?;
    plan.apply_defaults_if_unset();
    report(&plan, Vec::new(), None)
}

pub async fn read(config: &Config, state: &str, snapshot: &Path) -> Result<Report, CliError> {
    let plan = StateCodec::default().load(state)?;
    let spec: ClusterSpec = read_yaml(snapshot)?;

    match config.provider {
        Provider::Aws => read_with::<Aws>(config, plan, &spec).await,
        Provider::Azure => read_with::<Azure>(config, plan, &spec).await,
        Provider::Gcp => read_with::<Gcp>(config, plan, &spec).await,
    }
}

pub async fn apply(
    config: &Config,
    state: Option<&str>,
    snapshot: &Path,
) -> Result<Report, CliError> {
    let previous = state.map(|s| StateCodec::default().load(s)).transpose()?;
    let spec: ClusterSpec = read_yaml(snapshot)?;

    match config.provider {
        Provider::Aws => apply_with::<Aws>(config, previous, &spec).await,
        Provider::Azure => apply_with::<Azure>(config, previous, &spec).await,
        Provider::Gcp => apply_with::<Gcp>(config, previous, &spec).await,
    }
}

pub fn decode_state(state: &str) -> Result<FailoverPlan, CliError> {
    Ok(StateCodec::default().load(state)?)
}

fn build_reconciler<C: Cloud>(config: &Config, cloud: &Arc<InMemoryCloud<C>>) -> Reconciler<C> {
    Reconciler::new(
        CloudAdapters::from_backend(cloud.clone()),
        config.reconcile.clone(),
    )
}

async fn read_with<C: Cloud>(
    config: &Config,
    plan: FailoverPlan,
    spec: &ClusterSpec,
) -> Result<Report, CliError> {
    let cloud = Arc::new(InMemoryCloud::<C>::from_spec(spec));
    let plan = build_reconciler(config, &cloud).read(plan).await?;
    report(&plan, Vec::new(), None)
}

async fn apply_with<C: Cloud>(
    config: &Config,
    previous: Option<FailoverPlan>,
    spec: &ClusterSpec,
) -> Result<Report, CliError> {
    let cloud = Arc::new(InMemoryCloud::<C>::from_spec(spec));
    let reconciler = build_reconciler(config, &cloud);

    let outcome = match &previous {
        Some(previous) => reconciler.update(previous, &config.failover).await?,
        None => reconciler.create(&config.failover).await?,
    };

    let deleted = outcome
        .deleted
        .values()
        .flatten()
        .map(ToString::to_string)
        .collect();
    report(&outcome.plan, deleted, Some(cloud.spec()))
}

fn report(
    plan: &FailoverPlan,
    deleted: Vec<String>,
    cluster: Option<ClusterSpec>,
) -> Result<Report, CliError> {
    Ok(Report {
        outputs: plan.outputs(),
        state: StateCodec::default().encode(plan)?,
        deleted,
        cluster,
    })
}
