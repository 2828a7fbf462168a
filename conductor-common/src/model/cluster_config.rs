/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which dimension a throttle budget applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThrottleScope {
    LoadBalance,
    RecoveryBalance,
    Any,
}

/// A single configured concurrency cap at a given scope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub max_concurrent_transitions: u32,
    pub scope: ThrottleScope,
}

/// How fault-zone topology is derived for FULL_AUTO placement. The
/// topology path names the key whose value segments an
/// instance's tags/config into zone identifiers, e.g. `/zone/rack`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultZoneType {
    pub topology_path: String,
}

/// `CONFIGS/CLUSTER/{cluster}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub cluster_name: String,
    pub fault_zone: Option<FaultZoneType>,
    pub throttles: HashMap<String, Vec<ThrottleConfig>>,
    pub persist_best_possible: bool,
    pub persist_intermediate: bool,
    pub pipeline_disabled: bool,
    pub delay_rebalance_disabled: bool,
    pub delay_rebalance_time_ms: u64,
    pub transition_cancel_enabled: bool,
}

impl ClusterConfig {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            fault_zone: None,
            throttles: HashMap::new(),
            persist_best_possible: false,
            persist_intermediate: false,
            pipeline_disabled: false,
            delay_rebalance_disabled: false,
            delay_rebalance_time_ms: 0,
            transition_cancel_enabled: true,
        }
    }

    /// Throttle caps configured for a given scope key (`"cluster"`,
    /// a resource name, or an instance name).
    pub fn throttles_for(&self, scope_key: &str) -> &[ThrottleConfig] {
        self.throttles
            .get(scope_key)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
