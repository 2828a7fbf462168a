/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! CUSTOMIZED: the ideal state's per-partition instance→state map is
//! authoritative; the rebalancer only filters it down to live, enabled
//! instances.

use super::{PartitionAssignment, Rebalancer};
use crate::resource::ResourceView;
use crate::snapshot::ClusterSnapshot;
use conductor_common::error::Result;
use std::collections::BTreeMap;

pub struct CustomizedRebalancer;

impl Rebalancer for CustomizedRebalancer {
    fn compute(&self, snapshot: &ClusterSnapshot, resource: &ResourceView<'_>) -> Result<PartitionAssignment> {
        let mut assignment = PartitionAssignment::new();
        for partition in &resource.partitions {
            let map = resource
                .ideal_state
                .customized_map
                .get(partition)
                .cloned()
                .unwrap_or_default();
            let filtered: BTreeMap<String, String> = map
                .into_iter()
                .filter(|(instance, _)| snapshot.is_instance_live(instance) && snapshot.is_instance_enabled(instance))
                .collect();
            assignment.insert(partition.clone(), filtered);
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
    fn filters_out_non_live_instances() {
        let mut ideal = IdealState::new("R", "OnlineOffline-with-Master");
        ideal.num_partitions = 1;
        ideal.rebalance_mode = RebalanceMode::Customized;
        let mut map = HashMap::new();
        map.insert("i1".to_string(), "MASTER".to_string());
        map.insert("i2".to_string(), "SLAVE".to_string());
        ideal.customized_map.insert("R_0".to_string(), map);
        let def = online_offline_with_master();

        let mut live_instances = HashMap::new();
        live_instances.insert("i1".to_string(), LiveInstance::new("i1", "s1"));
        let mut instance_configs = HashMap::new();
        instance_configs.insert("i1".to_string(), InstanceConfig::new("i1"));

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
        let assignment = CustomizedRebalancer.compute(&snapshot, &resource).unwrap();
        assert_eq!(assignment["R_0"].len(), 1);
        assert_eq!(assignment["R_0"]["i1"], "MASTER");
    }
}
