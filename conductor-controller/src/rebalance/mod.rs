/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Best-Possible-State computation: for each partition, the desired
//! instance→state map the cluster should converge to, ignoring
//! throttles. Four variants share one `Rebalancer` capability, selected
//! per resource by `IdealState.rebalance_mode` rather than through deep
//! inheritance.

pub mod customized;
pub mod delay;
pub mod full_auto;
pub mod semi_auto;
pub mod user_defined;

use crate::resource::ResourceView;
use crate::snapshot::ClusterSnapshot;
use conductor_common::error::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// `partition -> instance -> target state`.
pub type PartitionAssignment = BTreeMap<String, BTreeMap<String, String>>;

pub trait Rebalancer: Send + Sync {
    fn compute(&self, snapshot: &ClusterSnapshot, resource: &ResourceView<'_>) -> Result<PartitionAssignment>;
}

/// Holds user-defined rebalancer plugins keyed by the class name named
/// in `IdealState.rebalancer_class`.
#[derive(Default)]
pub struct RebalancerRegistry {
    plugins: HashMap<String, Arc<dyn Rebalancer>>,
}

impl RebalancerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class_name: impl Into<String>, rebalancer: Arc<dyn Rebalancer>) {
        self.plugins.insert(class_name.into(), rebalancer);
    }

    pub fn get(&self, class_name: &str) -> Option<Arc<dyn Rebalancer>> {
        self.plugins.get(class_name).cloned()
    }
}

/// Dispatches to the correct rebalancer variant for a resource.
pub fn compute_best_possible(
    snapshot: &ClusterSnapshot,
    resource: &ResourceView<'_>,
    registry: &RebalancerRegistry,
) -> Result<PartitionAssignment> {
    use conductor_common::model::RebalanceMode;

    match resource.ideal_state.rebalance_mode {
        RebalanceMode::SemiAuto => semi_auto::SemiAutoRebalancer.compute(snapshot, resource),
        RebalanceMode::FullAuto => full_auto::FullAutoRebalancer.compute(snapshot, resource),
        RebalanceMode::Customized => customized::CustomizedRebalancer.compute(snapshot, resource),
        RebalanceMode::UserDefined => {
            user_defined::UserDefinedRebalancer::new(registry).compute(snapshot, resource)
        }
    }
}
