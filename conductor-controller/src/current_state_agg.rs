/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Current-State Aggregation: folds per-participant current-state
//! reports and outstanding messages into a per-(resource, partition,
//! instance) view that the rebalancer and throttle engine read from.

use crate::resource::ResourceView;
use crate::snapshot::ClusterSnapshot;
use conductor_common::model::Message;
use std::collections::BTreeMap;

/// What is known about one replica: its observed state, any
/// controller-authored requested-state, and the single pending message
/// (if any) targeting it.
#[derive(Debug, Clone, Default)]
pub struct ReplicaObservation {
    pub current_state: Option<String>,
    pub requested_state: Option<String>,
    pub pending_message: Option<Message>,
}

impl ReplicaObservation {
    pub fn is_in_flight(&self) -> bool {
        self.pending_message.is_some()
    }
}

/// Aggregated view for one resource: `partition -> instance ->
/// observation`, ordered by partition name so downstream throttle
/// selection can walk it deterministically.
pub struct ResourceAggregate {
    pub partitions: BTreeMap<String, BTreeMap<String, ReplicaObservation>>,
}

pub fn aggregate(snapshot: &ClusterSnapshot, resource: &ResourceView<'_>) -> ResourceAggregate {
    let mut partitions: BTreeMap<String, BTreeMap<String, ReplicaObservation>> = resource
        .partitions
        .iter()
        .map(|p| (p.clone(), BTreeMap::new()))
        .collect();

    let mut instances: Vec<&String> = snapshot.live_instances.keys().collect();
    instances.sort();

    for instance in instances {
        let current_state = snapshot.current_state_of(instance, &resource.ideal_state.resource_name);
        let pending = snapshot.pending_messages_for(instance);

        for partition in &resource.partitions {
            let observed = current_state
                .and_then(|cs| cs.partition_state.get(partition))
                .cloned();
            let requested = current_state
                .and_then(|cs| cs.requested_state.get(partition))
                .cloned();
            let pending_message = pending
                .iter()
                .find(|m| {
                    m.resource_name == resource.ideal_state.resource_name
                        && &m.partition_name == partition
                        && m.tgt_name == *instance
                })
                .cloned();

            partitions
                .get_mut(partition)
                .expect("partition seeded above")
                .insert(
                    instance.clone(),
                    ReplicaObservation {
                        current_state: observed,
                        requested_state: requested,
                        pending_message,
                    },
                );
        }
    }

    ResourceAggregate { partitions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_common::model::{CurrentState, IdealState, LiveInstance, RebalanceMode};
    use conductor_statemodel::builtin::online_offline_with_master;
    use std::collections::HashMap;

    #[test]
    fn folds_current_state_and_pending_message_per_instance() {
        let mut ideal = IdealState::new("R", "OnlineOffline-with-Master");
        ideal.num_partitions = 1;
        ideal.replica_count = 1;
        ideal.rebalance_mode = RebalanceMode::SemiAuto;
        let def = online_offline_with_master();

        let mut live_instances = HashMap::new();
        live_instances.insert("i1".to_string(), LiveInstance::new("i1", "s1"));

        let mut current_states = HashMap::new();
        let mut cs = CurrentState {
            instance_name: "i1".into(),
            session_id: "s1".into(),
            resource_name: "R".into(),
            state_model_def: "OnlineOffline-with-Master".into(),
            bucket_size: 0,
            partition_state: HashMap::new(),
            requested_state: HashMap::new(),
            info: HashMap::new(),
        };
        cs.partition_state.insert("R_0".into(), "OFFLINE".into());
        current_states.insert(("i1".to_string(), "R".to_string()), cs);

        let snapshot = ClusterSnapshot {
            live_instances,
            current_states,
            ..Default::default()
        };

        let resource = ResourceView {
            ideal_state: &ideal,
            state_model: &def,
            partitions: ideal.partition_names(),
        };

        let agg = aggregate(&snapshot, &resource);
        let obs = &agg.partitions["R_0"]["i1"];
        assert_eq!(obs.current_state.as_deref(), Some("OFFLINE"));
        assert!(!obs.is_in_flight());
    }
}
