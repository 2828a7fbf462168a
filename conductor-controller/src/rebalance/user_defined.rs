/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! USER_DEFINED: delegates to a named rebalancer plugin looked up by
//! `IdealState.rebalancer_class` in the registry.

use super::{PartitionAssignment, Rebalancer, RebalancerRegistry};
use crate::resource::ResourceView;
use crate::snapshot::ClusterSnapshot;
use conductor_common::error::{ConductorError, Result};

pub struct UserDefinedRebalancer<'a> {
    registry: &'a RebalancerRegistry,
}

impl<'a> UserDefinedRebalancer<'a> {
    pub fn new(registry: &'a RebalancerRegistry) -> Self {
        Self { registry }
    }
}

impl<'a> Rebalancer for UserDefinedRebalancer<'a> {
    fn compute(&self, snapshot: &ClusterSnapshot, resource: &ResourceView<'_>) -> Result<PartitionAssignment> {
        let class_name = resource.ideal_state.rebalancer_class.as_deref().ok_or_else(|| {
            ConductorError::ConfigInvalid {
                subject: resource.ideal_state.resource_name.clone(),
                reason: "USER_DEFINED rebalance mode requires rebalancer_class".to_string(),
            }
        })?;
        let plugin = self.registry.get(class_name).ok_or_else(|| ConductorError::ConfigInvalid {
            subject: resource.ideal_state.resource_name.clone(),
            reason: format!("no rebalancer plugin registered as '{class_name}'"),
        })?;
        plugin.compute(snapshot, resource)
    }
}
