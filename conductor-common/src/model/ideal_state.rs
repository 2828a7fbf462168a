/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Selects which rebalancer variant computes best-possible-state for a
/// resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebalanceMode {
    FullAuto,
    SemiAuto,
    Customized,
    UserDefined,
}

/// `IDEALSTATES/{resource}`: the declarative target placement
/// and mode for a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdealState {
    pub resource_name: String,
    pub num_partitions: u32,
    pub replica_count: u32,
    pub rebalance_mode: RebalanceMode,
    pub state_model_ref: String,
    pub instance_group_tag: Option<String>,
    pub min_active_replicas: u32,
    /// Class name of the plugin rebalancer when `rebalance_mode` is
    /// `UserDefined`.
    pub rebalancer_class: Option<String>,
    /// SEMI_AUTO: ordered preference list of instances, per partition.
    pub preference_lists: HashMap<String, Vec<String>>,
    /// CUSTOMIZED: authoritative instance -> state map, per partition.
    pub customized_map: HashMap<String, HashMap<String, String>>,
}

impl IdealState {
    pub fn new(resource_name: impl Into<String>, state_model_ref: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            num_partitions: 0,
            replica_count: 0,
            rebalance_mode: RebalanceMode::SemiAuto,
            state_model_ref: state_model_ref.into(),
            instance_group_tag: None,
            min_active_replicas: 0,
            rebalancer_class: None,
            preference_lists: HashMap::new(),
            customized_map: HashMap::new(),
        }
    }

    /// Canonical partition names for this resource: `{resource}_0` ..
    /// `{resource}_{num_partitions - 1}`, matching the naming convention
    /// used throughout the controller pipeline tests.
    pub fn partition_names(&self) -> Vec<String> {
        (0..self.num_partitions)
            .map(|i| format!("{}_{}", self.resource_name, i))
            .collect()
    }
}
