/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Pipeline observability as a sink interface rather than global state.
//! `PipelineDriver` holds an `Arc<dyn PipelineMonitor>` and calls out to
//! it at stage boundaries; nothing in the pipeline reaches for a
//! process-wide metrics singleton.

use std::time::Duration;

/// One pipeline stage, in execution order, for use as an event tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ClusterDataCache,
    ResourceComputation,
    CurrentStateAggregation,
    BestPossibleState,
    IntermediateState,
    MessageGeneration,
    MessageThrottling,
    Dispatch,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::ClusterDataCache => "cluster_data_cache",
            Stage::ResourceComputation => "resource_computation",
            Stage::CurrentStateAggregation => "current_state_aggregation",
            Stage::BestPossibleState => "best_possible_state",
            Stage::IntermediateState => "intermediate_state",
            Stage::MessageGeneration => "message_generation",
            Stage::MessageThrottling => "message_throttling",
            Stage::Dispatch => "dispatch",
        }
    }
}

pub trait PipelineMonitor: Send + Sync {
    fn run_started(&self, cluster: &str) {
        let _ = cluster;
    }

    fn run_completed(&self, cluster: &str, duration: Duration) {
        let _ = (cluster, duration);
    }

    fn run_aborted(&self, cluster: &str, stage: Stage, error: &conductor_common::error::ConductorError) {
        let _ = (cluster, stage, error);
    }

    fn stage_completed(&self, cluster: &str, stage: Stage, duration: Duration) {
        let _ = (cluster, stage, duration);
    }

    fn messages_dispatched(&self, cluster: &str, created: usize, cancelled: usize, abandoned: usize) {
        let _ = (cluster, created, cancelled, abandoned);
    }
}

/// Discards every event. Used where no observability is wired up, e.g.
/// unit tests that only care about pipeline outcomes.
#[derive(Default)]
pub struct NoopMonitor;

impl PipelineMonitor for NoopMonitor {}

/// Emits structured `tracing` events at stage boundaries.
#[derive(Default)]
pub struct TracingMonitor;

impl PipelineMonitor for TracingMonitor {
    fn run_started(&self, cluster: &str) {
        tracing::debug!(cluster, "pipeline run started");
    }

    fn run_completed(&self, cluster: &str, duration: Duration) {
        tracing::info!(cluster, duration_ms = duration.as_millis() as u64, "pipeline run completed");
    }

    fn run_aborted(&self, cluster: &str, stage: Stage, error: &conductor_common::error::ConductorError) {
        tracing::warn!(cluster, stage = stage.name(), %error, "pipeline run aborted");
    }

    fn stage_completed(&self, cluster: &str, stage: Stage, duration: Duration) {
        tracing::debug!(
            cluster,
            stage = stage.name(),
            duration_ms = duration.as_millis() as u64,
            "pipeline stage completed"
        );
    }

    fn messages_dispatched(&self, cluster: &str, created: usize, cancelled: usize, abandoned: usize) {
        tracing::info!(cluster, created, cancelled, abandoned, "messages dispatched");
    }
}
