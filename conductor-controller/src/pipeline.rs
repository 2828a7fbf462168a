/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! `PipelineDriver` runs the eight pipeline stages against one
//! `ClusterDataCache` refresh at a time. At most one run is active per
//! cluster; additional triggers while a run is active coalesce into a
//! single follow-up run via a `tokio::sync::Notify` permit. Shutdown is
//! signalled through a `watch` channel and honored at the next stage
//! boundary.

use crate::cache::ClusterDataCache;
use crate::dispatch::{self, DispatchReport};
use crate::message_gen;
use crate::monitor::{PipelineMonitor, Stage};
use crate::rebalance::delay::DelayRebalanceTracker;
use crate::rebalance::{compute_best_possible, PartitionAssignment, RebalancerRegistry};
use crate::throttle::{self, IntermediateState};
use crate::{current_state_agg, external_view, resource};
use conductor_common::error::Result;
use conductor_common::paths;
use conductor_store::client::CoordinationStore;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tracing::{error, info};

/// A cheap, cloneable handle for requesting a pipeline run from outside
/// `PipelineDriver` itself, e.g. from `admin::set_instance_enabled`
/// after flipping `InstanceConfig.enabled`. Separate from `PipelineDriver`
/// so admin operations don't need the full driver, just something to
/// notify.
#[derive(Clone)]
pub struct PipelineTrigger(Arc<Notify>);

impl PipelineTrigger {
    pub fn fire(&self) {
        self.0.notify_one();
    }
}

pub struct PipelineDriver {
    cluster: String,
    store: Arc<dyn CoordinationStore>,
    cache: ClusterDataCache,
    rebalancers: RebalancerRegistry,
    monitor: Arc<dyn PipelineMonitor>,
    delay_tracker: tokio::sync::Mutex<DelayRebalanceTracker>,
    trigger: Arc<Notify>,
}

impl PipelineDriver {
    pub fn new(
        cluster: impl Into<String>,
        store: Arc<dyn CoordinationStore>,
        rebalancers: RebalancerRegistry,
        monitor: Arc<dyn PipelineMonitor>,
    ) -> Self {
        let cluster = cluster.into();
        Self {
            cache: ClusterDataCache::new(cluster.clone()),
            cluster,
            store,
            rebalancers,
            monitor,
            delay_tracker: tokio::sync::Mutex::new(DelayRebalanceTracker::new()),
            trigger: Arc::new(Notify::new()),
        }
    }

    /// Wakes a waiting `run_forever` loop, or leaves a permit for the
    /// next `notified().await` if a run is already in progress.
    pub fn request_run(&self) {
        self.trigger.notify_one();
    }

    /// Returns a cloneable handle that fires this driver's trigger from
    /// outside, for threading into admin operations that should request
    /// a run on success (e.g. `admin::set_instance_enabled`).
    pub fn trigger_handle(&self) -> PipelineTrigger {
        PipelineTrigger(Arc::clone(&self.trigger))
    }

    /// Subscribes to the store's change-notification streams for the
    /// cluster's live instances, ideal states, participant configs, and
    /// instance trees (the latter covering CurrentState changes), and
    /// calls `request_run` on every event. This is the store-callback
    /// half of the two documented refresh triggers; `run_forever`'s
    /// `poll_interval` sleep is the other.
    pub fn spawn_watchers(self: &Arc<Self>) {
        for root in [
            paths::live_instances_root(&self.cluster),
            paths::ideal_states_root(&self.cluster),
            paths::participant_configs_root(&self.cluster),
            paths::instances_root(&self.cluster),
        ] {
            let driver = Arc::clone(self);
            tokio::spawn(async move {
                match driver.store.watch_children(&root).await {
                    Ok(mut events) => {
                        while events.next().await.is_some() {
                            driver.request_run();
                        }
                    }
                    Err(e) => error!(cluster = %driver.cluster, root = %root, error = %e, "failed to subscribe to change notifications"),
                }
            });
        }
    }

    /// Drives the pipeline until `shutdown` fires. `poll_interval`
    /// bounds staleness when no change notification arrives.
    pub async fn run_forever(self: Arc<Self>, poll_interval: Duration, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = self.trigger.notified() => {}
                _ = tokio::time::sleep(poll_interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
            if *shutdown.borrow() {
                return;
            }

            let now_ms = wall_clock_ms();
            match self.run_once(now_ms, &shutdown).await {
                Ok(report) => {
                    self.monitor.messages_dispatched(
                        &self.cluster,
                        report.messages_created,
                        report.messages_cancelled,
                        report.messages_abandoned,
                    );
                }
                Err(e) => error!(cluster = %self.cluster, error = %e, "pipeline run failed"),
            }
        }
    }

    pub async fn run_once(&self, now_ms: i64, shutdown: &watch::Receiver<bool>) -> Result<DispatchReport> {
        let start = Instant::now();
        self.monitor.run_started(&self.cluster);

        let report = self.run_stages(now_ms, shutdown).await;

        match &report {
            Ok(_) => self.monitor.run_completed(&self.cluster, start.elapsed()),
            Err(e) => self.monitor.run_aborted(&self.cluster, stage_for_error(e), e),
        }
        report
    }

    async fn run_stages(&self, now_ms: i64, shutdown: &watch::Receiver<bool>) -> Result<DispatchReport> {
        let stage_start = Instant::now();
        let snapshot = self.cache.refresh(self.store.as_ref()).await?;
        self.monitor.stage_completed(&self.cluster, Stage::ClusterDataCache, stage_start.elapsed());

        if snapshot.cluster_config.as_ref().map(|c| c.pipeline_disabled).unwrap_or(false) {
            info!(cluster = %self.cluster, "pipeline disabled, skipping run");
            return Ok(DispatchReport { messages_created: 0, messages_cancelled: 0, messages_abandoned: 0 });
        }

        let (effective_snapshot, next_wakeup) = {
            let mut tracker = self.delay_tracker.lock().await;
            tracker.apply(now_ms, &snapshot)
        };
        if let Some(expiry) = next_wakeup {
            self.schedule_wakeup(now_ms, expiry);
        }

        if bail_if_shutting_down(shutdown) {
            return Ok(DispatchReport { messages_created: 0, messages_cancelled: 0, messages_abandoned: 0 });
        }

        let stage_start = Instant::now();
        let (resources, config_errors) = resource::enumerate_resources(&effective_snapshot);
        for err in &config_errors {
            error!(cluster = %self.cluster, error = %err, "resource skipped");
        }
        self.monitor.stage_completed(&self.cluster, Stage::ResourceComputation, stage_start.elapsed());

        let stage_start = Instant::now();
        let mut aggregates = HashMap::new();
        for r in &resources {
            aggregates.insert(
                r.ideal_state.resource_name.clone(),
                current_state_agg::aggregate(&effective_snapshot, r),
            );
        }
        self.monitor.stage_completed(&self.cluster, Stage::CurrentStateAggregation, stage_start.elapsed());

        if bail_if_shutting_down(shutdown) {
            return Ok(DispatchReport { messages_created: 0, messages_cancelled: 0, messages_abandoned: 0 });
        }

        let stage_start = Instant::now();
        let mut best_possible: HashMap<String, PartitionAssignment> = HashMap::new();
        for r in &resources {
            match compute_best_possible(&effective_snapshot, r, &self.rebalancers) {
                Ok(assignment) => {
                    best_possible.insert(r.ideal_state.resource_name.clone(), assignment);
                }
                Err(e) => error!(
                    cluster = %self.cluster,
                    resource = %r.ideal_state.resource_name,
                    error = %e,
                    "rebalance failed for resource, leaving it unchanged this run"
                ),
            }
        }
        self.monitor.stage_completed(&self.cluster, Stage::BestPossibleState, stage_start.elapsed());

        let cluster_config = effective_snapshot
            .cluster_config
            .clone()
            .ok_or_else(|| conductor_common::error::ConductorError::Other(anyhow::anyhow!("missing cluster config")))?;

        // Classification, budget seeding, and throttled selection all happen
        // inside one pass (`throttle::compute_intermediate_state`); this
        // covers both the Intermediate-State and Message-Throttling stages.
        let stage_start = Instant::now();
        let intermediate: IntermediateState =
            throttle::compute_intermediate_state(&cluster_config, &resources, &best_possible, &aggregates);
        let elapsed = stage_start.elapsed();
        self.monitor.stage_completed(&self.cluster, Stage::IntermediateState, elapsed);
        self.monitor.stage_completed(&self.cluster, Stage::MessageThrottling, elapsed);

        if bail_if_shutting_down(shutdown) {
            return Ok(DispatchReport { messages_created: 0, messages_cancelled: 0, messages_abandoned: 0 });
        }

        let stage_start = Instant::now();
        let generated = message_gen::generate(&effective_snapshot, &intermediate, now_ms);
        self.monitor.stage_completed(&self.cluster, Stage::MessageGeneration, stage_start.elapsed());

        let session_by_instance: HashMap<String, String> = effective_snapshot
            .live_instances
            .values()
            .map(|live| (live.instance_name.clone(), live.session_id.clone()))
            .collect();

        let stage_start = Instant::now();
        let report = dispatch::dispatch(self.store.as_ref(), &self.cluster, &session_by_instance, &generated).await?;
        self.monitor.stage_completed(&self.cluster, Stage::Dispatch, stage_start.elapsed());

        for r in &resources {
            if let Some(aggregate) = aggregates.get(&r.ideal_state.resource_name) {
                let view = external_view::build(r, aggregate);
                if let Err(e) = external_view::publish(self.store.as_ref(), &self.cluster, &view).await {
                    error!(cluster = %self.cluster, resource = %r.ideal_state.resource_name, error = %e, "failed to publish external view");
                }
            }
        }

        Ok(report)
    }

    /// Schedules a future `request_run` for when a delay-rebalance grace
    /// period expires, so the instance that departed is re-evaluated for
    /// real removal without waiting for the next unrelated trigger.
    fn schedule_wakeup(&self, now_ms: i64, expiry_ms: i64) {
        let delay = (expiry_ms - now_ms).max(0) as u64;
        let notify = Arc::clone(&self.trigger);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            notify.notify_one();
        });
    }
}

fn bail_if_shutting_down(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// A coarse guess at which stage produced an abort, for the monitor
/// sink's benefit; `run_stages` doesn't thread stage identity through
/// its `?` chain.
fn stage_for_error(error: &conductor_common::error::ConductorError) -> Stage {
    use conductor_common::error::ConductorError as E;
    match error {
        E::SnapshotIncomplete(_) => Stage::ClusterDataCache,
        E::ConfigInvalid { .. } => Stage::ResourceComputation,
        E::StateModelViolation { .. } => Stage::IntermediateState,
        E::HandlerException { .. } | E::HandlerTimeout { .. } => Stage::Dispatch,
        E::StoreTransient { .. } | E::StoreVersionConflict { .. } | E::StoreNotFound(_) => Stage::Dispatch,
        E::Other(_) => Stage::ClusterDataCache,
    }
}

fn wall_clock_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}
