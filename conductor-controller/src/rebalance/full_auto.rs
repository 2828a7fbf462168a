/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! FULL_AUTO: the controller computes its own preference list per
//! partition rather than reading one from the ideal state. Eligible
//! instances are grouped into fault zones, interleaved into a single
//! rotating ring so replicas spread across zones, rotated per partition
//! so no zone is favored across the whole resource, and a sticky pass
//! keeps an instance already hosting a non-initial state for a
//! partition in place when it is still eligible.

use super::{PartitionAssignment, Rebalancer};
use crate::resource::ResourceView;
use crate::snapshot::ClusterSnapshot;
use conductor_common::error::Result;
use std::collections::{BTreeMap, VecDeque};

pub struct FullAutoRebalancer;

impl FullAutoRebalancer {
    fn zone_of(&self, snapshot: &ClusterSnapshot, instance: &str, topology_key: Option<&str>) -> String {
        let Some(key) = topology_key else {
            return instance.to_string();
        };
        let key = key.trim_start_matches('/');
        snapshot
            .instance_configs
            .get(instance)
            .and_then(|cfg| {
                cfg.tags
                    .iter()
                    .find_map(|tag| tag.strip_prefix(&format!("{key}=")))
            })
            .map(|zone| zone.to_string())
            .unwrap_or_else(|| instance.to_string())
    }

    fn eligible_instances(&self, snapshot: &ClusterSnapshot, resource: &ResourceView<'_>) -> Vec<String> {
        let mut names: Vec<String> = snapshot
            .instance_configs
            .keys()
            .filter(|name| snapshot.is_instance_live(name) && snapshot.is_instance_enabled(name))
            .filter(|name| match &resource.ideal_state.instance_group_tag {
                Some(tag) => snapshot
                    .instance_configs
                    .get(*name)
                    .is_some_and(|c| c.tags.contains(tag)),
                None => true,
            })
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Interleaves instances from every zone, zones visited in sorted
    /// order, heavier-capacity instances within a zone visited first.
    fn build_ring(&self, snapshot: &ClusterSnapshot, instances: &[String], topology_key: Option<&str>) -> Vec<String> {
        let mut zones: BTreeMap<String, VecDeque<String>> = BTreeMap::new();
        for instance in instances {
            let zone = self.zone_of(snapshot, instance, topology_key);
            let mut bucket = zones.remove(&zone).unwrap_or_default();
            bucket.push_back(instance.clone());
            zones.insert(zone, bucket);
        }
        for bucket in zones.values_mut() {
            let mut v: Vec<String> = bucket.drain(..).collect();
            v.sort_by_key(|name| {
                let capacity: u32 = snapshot
                    .instance_configs
                    .get(name)
                    .map(|c| c.capacity.values().sum())
                    .unwrap_or(0);
                (std::cmp::Reverse(capacity), name.clone())
            });
            *bucket = v.into();
        }

        let mut ring = Vec::with_capacity(instances.len());
        loop {
            let mut progressed = false;
            for bucket in zones.values_mut() {
                if let Some(instance) = bucket.pop_front() {
                    ring.push(instance);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        ring
    }
}

impl Rebalancer for FullAutoRebalancer {
    fn compute(&self, snapshot: &ClusterSnapshot, resource: &ResourceView<'_>) -> Result<PartitionAssignment> {
        let topology_key = snapshot
            .cluster_config
            .as_ref()
            .and_then(|c| c.fault_zone.as_ref())
            .map(|fz| fz.topology_path.as_str());

        let eligible = self.eligible_instances(snapshot, resource);
        let ring = self.build_ring(snapshot, &eligible, topology_key);
        let replica_count = resource.ideal_state.replica_count;

        let mut assignment = PartitionAssignment::new();
        for (idx, partition) in resource.partitions.iter().enumerate() {
            let ordered = self.order_for_partition(snapshot, resource, partition, &ring, idx);

            let mut states = BTreeMap::new();
            let mut cursor = 0usize;
            for state in &resource.state_model.states_priority_list {
                if cursor >= ordered.len() {
                    break;
                }
                let remaining = ordered.len() - cursor;
                let take = resource
                    .state_model
                    .upper_bound(state, replica_count)
                    .map(|n| (n as usize).min(remaining))
                    .unwrap_or(remaining);
                for instance in &ordered[cursor..cursor + take] {
                    states.insert(instance.clone(), state.clone());
                }
                cursor += take;
            }
            assignment.insert(partition.clone(), states);
        }

        Ok(assignment)
    }
}

impl FullAutoRebalancer {
    /// Sticky instances (already hosting this partition in a non-initial,
    /// non-terminal state) come first, in ring order; the rest of the
    /// ring, rotated so partition `idx` starts at a different offset,
    /// fills the remaining slots.
    fn order_for_partition(
        &self,
        snapshot: &ClusterSnapshot,
        resource: &ResourceView<'_>,
        partition: &str,
        ring: &[String],
        idx: usize,
    ) -> Vec<String> {
        if ring.is_empty() {
            return Vec::new();
        }
        let offset = idx % ring.len();
        let rotated: Vec<String> = ring[offset..].iter().chain(ring[..offset].iter()).cloned().collect();

        let sticky: Vec<String> = rotated
            .iter()
            .filter(|instance| {
                snapshot
                    .current_state_of(instance, &resource.ideal_state.resource_name)
                    .and_then(|cs| cs.partition_state.get(partition))
                    .is_some_and(|state| {
                        state != &resource.state_model.initial_state && state != "ERROR" && state != "DROPPED"
                    })
            })
            .cloned()
            .collect();

        let mut ordered = sticky.clone();
        for instance in rotated {
            if !ordered.contains(&instance) {
                ordered.push(instance);
            }
        }
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_common::model::{IdealState, InstanceConfig, LiveInstance, RebalanceMode};
    use conductor_statemodel::builtin::online_offline_with_master;
    use std::collections::HashMap;

    fn base_snapshot(instances: &[&str]) -> ClusterSnapshot {
        let mut live_instances = HashMap::new();
        let mut instance_configs = HashMap::new();
        for name in instances {
            live_instances.insert(name.to_string(), LiveInstance::new(*name, "s1"));
            instance_configs.insert(name.to_string(), InstanceConfig::new(*name));
        }
        ClusterSnapshot {
            live_instances,
            instance_configs,
            ..Default::default()
        }
    }

    #[test]
    fn spreads_replicas_across_all_eligible_instances() {
        let snapshot = base_snapshot(&["i1", "i2", "i3"]);
        let mut ideal = IdealState::new("R", "OnlineOffline-with-Master");
        ideal.num_partitions = 3;
        ideal.replica_count = 3;
        ideal.rebalance_mode = RebalanceMode::FullAuto;
        let def = online_offline_with_master();
        let resource = ResourceView {
            ideal_state: &ideal,
            state_model: &def,
            partitions: ideal.partition_names(),
        };

        let assignment = FullAutoRebalancer.compute(&snapshot, &resource).unwrap();
        for partition_map in assignment.values() {
            assert_eq!(partition_map.len(), 3);
            assert_eq!(partition_map.values().filter(|s| *s == "MASTER").count(), 1);
        }
    }

    #[test]
    fn sticky_instance_keeps_its_slot() {
        let mut snapshot = base_snapshot(&["i1", "i2", "i3"]);
        let mut ideal = IdealState::new("R", "OnlineOffline-with-Master");
        ideal.num_partitions = 1;
        ideal.replica_count = 3;
        ideal.rebalance_mode = RebalanceMode::FullAuto;
        let def = online_offline_with_master();

        let mut cs = conductor_common::model::CurrentState {
            instance_name: "i3".into(),
            session_id: "s1".into(),
            resource_name: "R".into(),
            state_model_def: def.name.clone(),
            bucket_size: 0,
            partition_state: HashMap::new(),
            requested_state: HashMap::new(),
            info: HashMap::new(),
        };
        cs.partition_state.insert("R_0".into(), "MASTER".into());
        snapshot.current_states.insert(("i3".to_string(), "R".to_string()), cs);

        let resource = ResourceView {
            ideal_state: &ideal,
            state_model: &def,
            partitions: ideal.partition_names(),
        };
        let assignment = FullAutoRebalancer.compute(&snapshot, &resource).unwrap();
        assert_eq!(assignment["R_0"]["i3"], "MASTER");
    }
}
