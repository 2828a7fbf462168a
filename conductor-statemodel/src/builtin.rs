/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Built-in state model definitions. Every model here declares OFFLINE
//! and ERROR as common entry/failure states and DROPPED as the terminal
//! state reached once a partition is removed from an instance, each
//! model being a finite-state machine over replica states such as
//! OFFLINE/SLAVE/MASTER/ERROR/DROPPED.

use conductor_common::model::{StateConstraint, StateModelDefinition, Transition};
use std::collections::HashMap;

fn common_tail(transitions: &mut Vec<Transition>) {
    transitions.push(Transition { from_state: "ERROR".into(), to_state: "OFFLINE".into(), priority: 1 });
    transitions.push(Transition { from_state: "OFFLINE".into(), to_state: "DROPPED".into(), priority: 3 });
    transitions.push(Transition { from_state: "ERROR".into(), to_state: "DROPPED".into(), priority: 3 });
}

/// MASTER/SLAVE/OFFLINE with a single master and `R-1` slaves,
/// unbounded OFFLINE.
pub fn online_offline_with_master() -> StateModelDefinition {
    let mut upper_bounds = HashMap::new();
    upper_bounds.insert("MASTER".to_string(), StateConstraint::Count(1));
    upper_bounds.insert("SLAVE".to_string(), StateConstraint::Relative(-1));
    upper_bounds.insert("OFFLINE".to_string(), StateConstraint::Unbounded);
    upper_bounds.insert("ERROR".to_string(), StateConstraint::Unbounded);
    upper_bounds.insert("DROPPED".to_string(), StateConstraint::Unbounded);

    let mut transitions = vec![
        Transition { from_state: "OFFLINE".into(), to_state: "SLAVE".into(), priority: 1 },
        Transition { from_state: "SLAVE".into(), to_state: "MASTER".into(), priority: 1 },
        Transition { from_state: "MASTER".into(), to_state: "SLAVE".into(), priority: 1 },
        Transition { from_state: "SLAVE".into(), to_state: "OFFLINE".into(), priority: 2 },
    ];
    common_tail(&mut transitions);

    StateModelDefinition {
        name: "OnlineOffline-with-Master".to_string(),
        states_priority_list: vec![
            "MASTER".to_string(),
            "SLAVE".to_string(),
            "OFFLINE".to_string(),
            "ERROR".to_string(),
            "DROPPED".to_string(),
        ],
        initial_state: "OFFLINE".to_string(),
        transitions,
        upper_bounds,
    }
}

/// LEADER/STANDBY/OFFLINE, structurally identical to
/// `online_offline_with_master` under different state names — included
/// to show the model is a declarative table, not hardcoded behavior.
pub fn leader_standby() -> StateModelDefinition {
    let mut upper_bounds = HashMap::new();
    upper_bounds.insert("LEADER".to_string(), StateConstraint::Count(1));
    upper_bounds.insert("STANDBY".to_string(), StateConstraint::Relative(-1));
    upper_bounds.insert("OFFLINE".to_string(), StateConstraint::Unbounded);
    upper_bounds.insert("ERROR".to_string(), StateConstraint::Unbounded);
    upper_bounds.insert("DROPPED".to_string(), StateConstraint::Unbounded);

    let mut transitions = vec![
        Transition { from_state: "OFFLINE".into(), to_state: "STANDBY".into(), priority: 1 },
        Transition { from_state: "STANDBY".into(), to_state: "LEADER".into(), priority: 1 },
        Transition { from_state: "LEADER".into(), to_state: "STANDBY".into(), priority: 1 },
        Transition { from_state: "STANDBY".into(), to_state: "OFFLINE".into(), priority: 2 },
    ];
    common_tail(&mut transitions);

    StateModelDefinition {
        name: "LeaderStandby".to_string(),
        states_priority_list: vec![
            "LEADER".to_string(),
            "STANDBY".to_string(),
            "OFFLINE".to_string(),
            "ERROR".to_string(),
            "DROPPED".to_string(),
        ],
        initial_state: "OFFLINE".to_string(),
        transitions,
        upper_bounds,
    }
}

/// A simple two-state model: every live replica should be ONLINE, with
/// no master/slave distinction.
pub fn online_offline() -> StateModelDefinition {
    let mut upper_bounds = HashMap::new();
    upper_bounds.insert("ONLINE".to_string(), StateConstraint::Relative(0));
    upper_bounds.insert("OFFLINE".to_string(), StateConstraint::Unbounded);
    upper_bounds.insert("ERROR".to_string(), StateConstraint::Unbounded);
    upper_bounds.insert("DROPPED".to_string(), StateConstraint::Unbounded);

    let mut transitions = vec![
        Transition { from_state: "OFFLINE".into(), to_state: "ONLINE".into(), priority: 1 },
        Transition { from_state: "ONLINE".into(), to_state: "OFFLINE".into(), priority: 2 },
    ];
    common_tail(&mut transitions);

    StateModelDefinition {
        name: "OnlineOffline".to_string(),
        states_priority_list: vec![
            "ONLINE".to_string(),
            "OFFLINE".to_string(),
            "ERROR".to_string(),
            "DROPPED".to_string(),
        ],
        initial_state: "OFFLINE".to_string(),
        transitions,
        upper_bounds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_slave_upper_bounds_resolve() {
        let sm = online_offline_with_master();
        assert_eq!(sm.upper_bound("MASTER", 3), Some(1));
        assert_eq!(sm.upper_bound("SLAVE", 3), Some(2));
        assert_eq!(sm.upper_bound("OFFLINE", 3), None);
    }

    #[test]
    fn every_model_can_recover_from_error() {
        for sm in [online_offline_with_master(), leader_standby(), online_offline()] {
            assert!(sm.has_transition("ERROR", "OFFLINE"), "{}", sm.name);
        }
    }
}
