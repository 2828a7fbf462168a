/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! SEMI_AUTO: the ideal state lists preferred instances per partition in
//! priority order. States are handed out top-down through the state
//! model's priority list, each state claiming as many of the remaining
//! eligible instances as its upper bound allows.

use super::{PartitionAssignment, Rebalancer};
use crate::resource::ResourceView;
use crate::snapshot::ClusterSnapshot;
use conductor_common::error::Result;
use std::collections::BTreeMap;

pub struct SemiAutoRebalancer;

impl Rebalancer for SemiAutoRebalancer {
    fn compute(&self, snapshot: &ClusterSnapshot, resource: &ResourceView<'_>) -> Result<PartitionAssignment> {
        let mut assignment = PartitionAssignment::new();
        let replica_count = resource.ideal_state.replica_count;

        for partition in &resource.partitions {
            let preference = resource
                .ideal_state
                .preference_lists
                .get(partition)
                .cloned()
                .unwrap_or_default();

            let eligible: Vec<&String> = preference
                .iter()
                .filter(|instance| {
                    snapshot.is_instance_live(instance)
                        && snapshot.is_instance_enabled(instance)
                        && !snapshot
                            .instance_configs
                            .get(*instance)
                            .is_some_and(|c| c.is_partition_disabled(&resource.ideal_state.resource_name, partition))
                })
                .collect();

            let mut states = BTreeMap::new();
            let mut cursor = 0usize;
            for state in &resource.state_model.states_priority_list {
                if cursor >= eligible.len() {
                    break;
                }
                let remaining = eligible.len() - cursor;
                let take = resource
                    .state_model
                    .upper_bound(state, replica_count)
                    .map(|n| (n as usize).min(remaining))
                    .unwrap_or(remaining);
                for instance in &eligible[cursor..cursor + take] {
                    states.insert((*instance).clone(), state.clone());
                }
                cursor += take;
            }

            assignment.insert(partition.clone(), states);
        }

        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_common::model::{IdealState, InstanceConfig, LiveInstance, RebalanceMode};
    use conductor_statemodel::builtin::online_offline_with_master;
    use std::collections::HashMap;

    #[test]
    fn assigns_master_then_slaves_in_preference_order() {
        let mut ideal = IdealState::new("R", "OnlineOffline-with-Master");
        ideal.num_partitions = 1;
        ideal.replica_count = 3;
        ideal.rebalance_mode = RebalanceMode::SemiAuto;
        ideal
            .preference_lists
            .insert("R_0".to_string(), vec!["i1".into(), "i2".into(), "i3".into()]);
        let def = online_offline_with_master();

        let mut live_instances = HashMap::new();
        let mut instance_configs = HashMap::new();
        for name in ["i1", "i2", "i3"] {
            live_instances.insert(name.to_string(), LiveInstance::new(name, "s1"));
            instance_configs.insert(name.to_string(), InstanceConfig::new(name));
        }

        let snapshot = ClusterSnapshot {
            live_instances,
            instance_configs,
            ..Default::default()
        };

        let resource = ResourceView {
            ideal_state: &ideal,
            state_model: &def,
            partitions: ideal.partition_names(),
        };

        let assignment = SemiAutoRebalancer.compute(&snapshot, &resource).unwrap();
        let p0 = &assignment["R_0"];
        assert_eq!(p0["i1"], "MASTER");
        assert_eq!(p0["i2"], "SLAVE");
        assert_eq!(p0["i3"], "SLAVE");
    }

    #[test]
    fn disabled_partition_excludes_instance() {
        let mut ideal = IdealState::new("R", "OnlineOffline-with-Master");
        ideal.num_partitions = 1;
        ideal.replica_count = 1;
        ideal.rebalance_mode = RebalanceMode::SemiAuto;
        ideal
            .preference_lists
            .insert("R_0".to_string(), vec!["i1".into()]);
        let def = online_offline_with_master();

        let mut live_instances = HashMap::new();
        live_instances.insert("i1".to_string(), LiveInstance::new("i1", "s1"));
        let mut i1 = InstanceConfig::new("i1");
        i1.disabled_partitions
            .entry("R".to_string())
            .or_default()
            .insert("R_0".to_string());
        let mut instance_configs = HashMap::new();
        instance_configs.insert("i1".to_string(), i1);

        let snapshot = ClusterSnapshot {
            live_instances,
            instance_configs,
            ..Default::default()
        };
        let resource = ResourceView {
            ideal_state: &ideal,
            state_model: &def,
            partitions: ideal.partition_names(),
        };

        let assignment = SemiAutoRebalancer.compute(&snapshot, &resource).unwrap();
        assert!(assignment["R_0"].is_empty());
    }
}
