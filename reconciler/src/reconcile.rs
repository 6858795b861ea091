//! The create, read and update lifecycle of a failover plan.
//!
//! Every call gathers live state per location in parallel, decides with the
//! `failover` crate and, in single mode, tears down surplus instances before
//! waiting for the cluster to settle on the validator alone.

use failover::{
    ClusterSnapshot, DeleteSet, FailoverConfig, FailoverError, FailoverMode, FailoverPlan,
    GroupFailure, LOCATION_COUNT, LocationCounts, PlanOutputs, Result, ValidatorCandidate,
    WaitOperation, locate_validator, select_surplus, surplus_count, validate_locations,
};
use failover::location::location_name;
use shared::{counter, gauge, histogram};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::capabilities::CloudAdapters;
use crate::clouds::Cloud;
use crate::config::ReconcileSettings;
use crate::executor::FanOut;
use crate::metrics_defs::{
    DELETION_FAILED, INSTANCES_DELETED, LIVE_INSTANCES, RECONCILE_DURATION,
};
use crate::wait::poll_until;

/// Result of a create or update call.
#[derive(Debug)]
pub struct ReconcileOutcome<I> {
    pub plan: FailoverPlan,
    pub outputs: PlanOutputs,
    /// Instances removed by this call, keyed by group
    pub deleted: DeleteSet<I>,
}

pub struct Reconciler<C: Cloud> {
    adapters: CloudAdapters<C::Instance>,
    settings: ReconcileSettings,
}

impl<C: Cloud> Reconciler<C> {
    pub fn new(adapters: CloudAdapters<C::Instance>, settings: ReconcileSettings) -> Self {
        Reconciler { adapters, settings }
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.settings.timeout()
    }

    /// Rejects plans whose locations collapse onto one another under this
    /// cloud's mapping, e.g. two GCP zones of the same region.
    fn check_locations(plan: &FailoverPlan) -> Result<()> {
        validate_locations(plan.locations.as_slice(), C::normalize_location)?;
        Ok(())
    }

    fn plan_from_config(config: &FailoverConfig) -> Result<FailoverPlan> {
        let plan = FailoverPlan::from_config(config)?;
        Self::check_locations(&plan)?;
        Ok(plan)
    }

    /// Refreshes `plan` from live state without changing the cluster.
    ///
    /// A single-mode plan with no validator reporting keeps its counts, a
    /// missing validator is a convergence state rather than an error.
    pub async fn read(&self, mut plan: FailoverPlan) -> Result<FailoverPlan> {
        let started = Instant::now();
        info!(cloud = C::NAME, prefix = %plan.prefix, mode = %plan.mode, "reading failover plan");
        Self::check_locations(&plan)?;

        if plan.mode == FailoverMode::Single {
            let deadline = self.deadline();
            let snapshot = self.gather(&plan, deadline).await?;
            match self.locate(&plan, &snapshot, deadline).await {
                Ok(validator) => {
                    let location = validator_location(&plan, &snapshot, &validator);
                    plan.set_counts_at_location(&location, C::normalize_location);
                }
                Err(e) if e.is_not_found() => {
                    info!(prefix = %plan.prefix, counts = ?plan.counts, "no validator reporting, keeping counts");
                }
                Err(e) => return Err(e),
            }
        }

        plan.apply_defaults_if_unset();
        record_duration(C::NAME, started);
        Ok(plan)
    }

    pub async fn create(&self, config: &FailoverConfig) -> Result<ReconcileOutcome<C::Instance>> {
        let plan = Self::plan_from_config(config)?;
        self.converge(plan).await
    }

    /// Converges a changed configuration. Single-mode counts carry over from
    /// `previous` while the locations stay the same.
    pub async fn update(
        &self,
        previous: &FailoverPlan,
        config: &FailoverConfig,
    ) -> Result<ReconcileOutcome<C::Instance>> {
        let mut plan = Self::plan_from_config(config)?;

        if previous.mode != plan.mode {
            info!(from = %previous.mode, to = %plan.mode, prefix = %plan.prefix, "failover mode changed");
        } else if plan.mode == FailoverMode::Single && previous.locations == plan.locations {
            plan.counts = previous.counts;
        }

        self.converge(plan).await
    }

    /// Drives the cluster toward `plan` and records the resulting counts.
    pub async fn converge(&self, mut plan: FailoverPlan) -> Result<ReconcileOutcome<C::Instance>> {
        let started = Instant::now();
        let deadline = self.deadline();
        info!(cloud = C::NAME, prefix = %plan.prefix, mode = %plan.mode, "converging failover plan");

        let mut deleted = DeleteSet::default();
        match plan.mode {
            FailoverMode::Distributed => {
                plan.apply_defaults_if_unset();
                self.wait_for_counts(&plan, plan.baseline_instances, deadline)
                    .await?;
            }
            FailoverMode::Single => match self.wait_for_validator(&plan, deadline).await {
                Ok(None) => {
                    info!(prefix = %plan.prefix, "no live instances");
                    plan.apply_defaults_if_unset();
                }
                Err(FailoverError::Timeout {
                    operation: WaitOperation::Validator,
                    waited,
                }) => {
                    warn!(prefix = %plan.prefix, ?waited, "no validator reported, tearing down all instances");
                    // The validator wait used up the first deadline
                    let deadline = self.deadline();
                    let snapshot = self.gather(&plan, deadline).await?;
                    deleted = self.teardown(&snapshot, None, deadline).await?;
                    if !deleted.is_empty() {
                        self.wait_for_counts(&plan, [0; LOCATION_COUNT], deadline)
                            .await?;
                    }
                    plan.apply_defaults_if_unset();
                }
                Ok(Some((validator, snapshot))) => {
                    info!(prefix = %plan.prefix, validator = %validator, "validator located");
                    deleted = self
                        .teardown(&snapshot, Some(&validator.instance), deadline)
                        .await?;

                    if !deleted.is_empty() {
                        let mut target = [0; LOCATION_COUNT];
                        if let Some(slot) = target.get_mut(validator.location_index) {
                            *slot = 1;
                        }
                        self.wait_for_counts(&plan, target, deadline).await?;
                    }

                    let location = validator_location(&plan, &snapshot, &validator);
                    plan.set_counts_at_location(&location, C::normalize_location);
                }
                Err(e) => return Err(e),
            },
        }

        record_duration(C::NAME, started);
        info!(prefix = %plan.prefix, counts = ?plan.counts, "failover plan converged");
        Ok(ReconcileOutcome {
            outputs: plan.outputs(),
            plan,
            deleted,
        })
    }

    /// Lists the deployment in all three locations in parallel.
    ///
    /// Groups are attributed to the location they were queried for, and any
    /// listing failure fails the whole snapshot.
    pub async fn gather(
        &self,
        plan: &FailoverPlan,
        deadline: Instant,
    ) -> Result<ClusterSnapshot<C::Instance>> {
        let tasks: Vec<_> = plan
            .locations
            .iter()
            .enumerate()
            .map(|(location_index, location)| {
                let lister = self.adapters.lister.clone();
                let prefix = plan.prefix.clone();
                let location = location.clone();
                let task = async move {
                    lister
                        .list_instances(&prefix, location_index, &location)
                        .await
                        .map_err(|e| {
                            FailoverError::cloud(
                                format!("{} location {location}", location_name(location_index)),
                                e,
                            )
                        })
                };
                (location_index, task)
            })
            .collect();

        let mut results = FanOut::new(deadline).run(tasks).await;
        results.sort_by_key(|(location_index, _)| *location_index);

        let mut groups = Vec::new();
        for (location_index, result) in results {
            for mut group in result? {
                group.location_index = location_index;
                groups.push(group);
            }
        }

        let snapshot = ClusterSnapshot::new(groups);
        gauge!(LIVE_INSTANCES, "cloud" => C::NAME).set(snapshot.instance_count() as f64);
        debug!(
            prefix = %plan.prefix,
            groups = snapshot.groups().len(),
            counts = ?snapshot.counts_per_location(),
            "gathered cluster snapshot"
        );
        Ok(snapshot)
    }

    async fn sample_validators(
        &self,
        plan: &FailoverPlan,
        snapshot: &ClusterSnapshot<C::Instance>,
        deadline: Instant,
    ) -> Result<Vec<(ValidatorCandidate<C::Instance>, Option<f64>)>> {
        let query = plan.metric_query();
        let tasks: Vec<_> = snapshot
            .candidates()
            .map(|candidate| {
                let metrics = self.adapters.metrics.clone();
                let query = query.clone();
                let instance = candidate.instance.clone();
                let task = async move {
                    metrics
                        .query_latest_metric(&query, &instance)
                        .await
                        .map_err(|e| FailoverError::cloud(format!("metric of {instance}"), e))
                };
                (candidate, task)
            })
            .collect();

        FanOut::new(deadline)
            .run(tasks)
            .await
            .into_iter()
            .map(|(candidate, result)| result.map(|value| (candidate, value)))
            .collect()
    }

    pub async fn locate(
        &self,
        plan: &FailoverPlan,
        snapshot: &ClusterSnapshot<C::Instance>,
        deadline: Instant,
    ) -> Result<ValidatorCandidate<C::Instance>> {
        let samples = self.sample_validators(plan, snapshot, deadline).await?;
        locate_validator(samples)
    }

    /// Waits until exactly one validator reports. Returns `None` right away
    /// when the deployment has no live instances at all.
    pub async fn wait_for_validator(
        &self,
        plan: &FailoverPlan,
        deadline: Instant,
    ) -> Result<Option<(ValidatorCandidate<C::Instance>, ClusterSnapshot<C::Instance>)>> {
        poll_until(
            WaitOperation::Validator,
            self.settings.poll_interval(),
            deadline,
            move || async move {
                let snapshot = self.gather(plan, deadline).await?;
                if snapshot.is_empty() {
                    return Ok(Some(None));
                }

                match self.locate(plan, &snapshot, deadline).await {
                    Ok(validator) => Ok(Some(Some((validator, snapshot)))),
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(e) => Err(e),
                }
            },
        )
        .await
    }

    /// Waits until the live count per location equals `target`.
    pub async fn wait_for_counts(
        &self,
        plan: &FailoverPlan,
        target: LocationCounts,
        deadline: Instant,
    ) -> Result<ClusterSnapshot<C::Instance>> {
        poll_until(
            WaitOperation::InstanceCount,
            self.settings.poll_interval(),
            deadline,
            move || async move {
                let snapshot = self.gather(plan, deadline).await?;
                let counts = snapshot.counts_per_location();
                if counts == target {
                    Ok(Some(snapshot))
                } else {
                    debug!(?counts, ?target, "instance counts not converged");
                    Ok(None)
                }
            },
        )
        .await
    }

    /// Deletes every instance except `validator`, one task per group.
    ///
    /// All groups are attempted even when some fail, the failures are then
    /// reported together.
    pub async fn teardown(
        &self,
        snapshot: &ClusterSnapshot<C::Instance>,
        validator: Option<&C::Instance>,
        deadline: Instant,
    ) -> Result<DeleteSet<C::Instance>> {
        let delete_set = select_surplus(snapshot.groups(), validator);
        if delete_set.is_empty() {
            return Ok(delete_set);
        }

        let tasks: Vec<_> = delete_set
            .iter()
            .map(|(group, instances)| {
                let deleter = self.adapters.deleter.clone();
                let group = group.clone();
                let instances = instances.clone();
                let key = group.clone();
                let task = async move {
                    info!(group = %group, count = instances.len(), "deleting surplus instances");
                    deleter
                        .delete_instances(&group, &instances)
                        .await
                        .map_err(|e| FailoverError::cloud("instance deletion", e))
                };
                (key, task)
            })
            .collect();

        let mut failures: Vec<GroupFailure> = FanOut::new(deadline)
            .run(tasks)
            .await
            .into_iter()
            .filter_map(|(group, result)| {
                result.err().map(|e| GroupFailure {
                    group,
                    source: Box::new(e),
                })
            })
            .collect();

        if !failures.is_empty() {
            failures.sort_by(|a, b| a.group.cmp(&b.group));
            counter!(DELETION_FAILED).increment(failures.len() as u64);
            for failure in &failures {
                error!(group = %failure.group, error = %failure.source, "failed to delete surplus instances");
            }
            return Err(FailoverError::Deletion { failures });
        }

        counter!(INSTANCES_DELETED).increment(surplus_count(&delete_set) as u64);
        Ok(delete_set)
    }
}

/// Cloud-reported location of the validator, falling back to the configured one.
fn validator_location<I: failover::InstanceIdentity>(
    plan: &FailoverPlan,
    snapshot: &ClusterSnapshot<I>,
    validator: &ValidatorCandidate<I>,
) -> String {
    snapshot
        .location_of(&validator.instance)
        .or_else(|| plan.locations.get(validator.location_index).map(String::as_str))
        .unwrap_or_default()
        .to_string()
}

fn record_duration(cloud: &'static str, started: Instant) {
    histogram!(RECONCILE_DURATION, "cloud" => cloud).record(started.elapsed().as_secs_f64());
}
