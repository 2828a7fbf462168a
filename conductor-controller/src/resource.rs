/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Resource Computation: enumerates resources and their partitions from
//! ideal states, pairing each with its state model definition so later
//! stages never need to re-resolve the reference by name.

use crate::snapshot::ClusterSnapshot;
use conductor_common::error::{ConductorError, Result};
use conductor_common::model::{IdealState, StateModelDefinition};

/// One resource's placement input, already bound to its state model.
pub struct ResourceView<'a> {
    pub ideal_state: &'a IdealState,
    pub state_model: &'a StateModelDefinition,
    pub partitions: Vec<String>,
}

/// Enumerates every resource in the snapshot with a valid ideal state and
/// state-model reference. A resource whose `state_model_ref` does not
/// resolve is reported as `ConfigInvalid` and skipped rather than
/// aborting the whole run, matching the per-resource isolation policy.
pub fn enumerate_resources(snapshot: &ClusterSnapshot) -> (Vec<ResourceView<'_>>, Vec<ConductorError>) {
    let mut views = Vec::new();
    let mut skipped = Vec::new();

    let mut resource_names: Vec<&String> = snapshot.ideal_states.keys().collect();
    resource_names.sort();

    for resource in resource_names {
        let ideal_state = &snapshot.ideal_states[resource];
        match snapshot.state_model_defs.get(&ideal_state.state_model_ref) {
            Some(state_model) => {
                views.push(ResourceView {
                    ideal_state,
                    state_model,
                    partitions: ideal_state.partition_names(),
                });
            }
            None => {
                skipped.push(ConductorError::ConfigInvalid {
                    subject: resource.clone(),
                    reason: format!(
                        "no registered state model named '{}'",
                        ideal_state.state_model_ref
                    ),
                });
            }
        }
    }

    (views, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_common::model::{ExternalView as _Unused, RebalanceMode};
    use conductor_statemodel::builtin::online_offline_with_master;
    use std::collections::HashMap;

    fn snapshot_with_resource(name: &str, partitions: u32, model: bool) -> ClusterSnapshot {
        let mut ideal_states = HashMap::new();
        let mut ideal = IdealState::new(name, "OnlineOffline-with-Master");
        ideal.num_partitions = partitions;
        ideal.replica_count = 3;
        ideal.rebalance_mode = RebalanceMode::SemiAuto;
        ideal_states.insert(name.to_string(), ideal);

        let mut state_model_defs = HashMap::new();
        if model {
            let def = online_offline_with_master();
            state_model_defs.insert(def.name.clone(), def);
        }

        ClusterSnapshot {
            ideal_states,
            state_model_defs,
            ..Default::default()
        }
    }

    #[test]
    fn enumerates_partitions_in_order() {
        let snapshot = snapshot_with_resource("R", 3, true);
        let (views, skipped) = enumerate_resources(&snapshot);
        assert!(skipped.is_empty());
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].partitions, vec!["R_0", "R_1", "R_2"]);
    }

    #[test]
    fn missing_state_model_is_skipped_not_fatal() {
        let snapshot = snapshot_with_resource("R", 1, false);
        let (views, skipped) = enumerate_resources(&snapshot);
        assert!(views.is_empty());
        assert_eq!(skipped.len(), 1);
        assert!(matches!(skipped[0], ConductorError::ConfigInvalid { .. }));
    }
}
