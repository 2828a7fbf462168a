/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The upper bound on the number of replicas of a partition that may
/// occupy a given state, as declared on `STATEMODELDEFS/{name}`.
/// `R` and `N` are the two special tokens the data model calls out:
/// `R` scales with the resource's configured replica count (e.g. a
/// SLAVE bound of `R-1`), `N` means unbounded (effectively "as many
/// live, enabled instances as there are").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateConstraint {
    Count(u32),
    /// `R` token with an additive offset, e.g. `R` is `Relative(0)`,
    /// `R-1` is `Relative(-1)`.
    Relative(i32),
    Unbounded,
}

impl StateConstraint {
    /// Parse the upper-bound tokens from the wire format: a plain
    /// integer, `N`, `R`, or `R-<k>`.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.eq_ignore_ascii_case("N") {
            return Some(StateConstraint::Unbounded);
        }
        if let Some(rest) = token.strip_prefix('R').or_else(|| token.strip_prefix('r')) {
            if rest.is_empty() {
                return Some(StateConstraint::Relative(0));
            }
            let offset: i32 = rest.parse().ok()?;
            return Some(StateConstraint::Relative(offset));
        }
        token.parse::<u32>().ok().map(StateConstraint::Count)
    }

    /// Resolve against a concrete replica count. `None` means
    /// unbounded.
    pub fn resolve(&self, replica_count: u32) -> Option<u32> {
        match self {
            StateConstraint::Count(n) => Some(*n),
            StateConstraint::Relative(offset) => {
                Some((replica_count as i64 + *offset as i64).max(0) as u32)
            }
            StateConstraint::Unbounded => None,
        }
    }
}

/// One edge in a state model's transition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from_state: String,
    pub to_state: String,
    /// Lower priority values are preferred when multiple transitions
    /// could legally apply: transitions toward the top state that
    /// unblock recovery are generally given the lowest numbers.
    pub priority: u32,
}

/// `STATEMODELDEFS/{name}`: immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateModelDefinition {
    pub name: String,
    /// States ordered from "most preferred" (index 0, the top state) to
    /// least.
    pub states_priority_list: Vec<String>,
    pub initial_state: String,
    pub transitions: Vec<Transition>,
    pub upper_bounds: HashMap<String, StateConstraint>,
}

impl StateModelDefinition {
    /// The top (most preferred, typically the highest-responsibility)
    /// state, e.g. MASTER.
    pub fn top_state(&self) -> Option<&str> {
        self.states_priority_list.first().map(|s| s.as_str())
    }

    pub fn state_rank(&self, state: &str) -> Option<usize> {
        self.states_priority_list.iter().position(|s| s == state)
    }

    pub fn has_transition(&self, from: &str, to: &str) -> bool {
        self.transitions
            .iter()
            .any(|t| t.from_state == from && t.to_state == to)
    }

    /// All states directly reachable from `from`, ordered by ascending
    /// transition priority (lowest number first).
    pub fn next_states(&self, from: &str) -> Vec<&str> {
        let mut edges: Vec<&Transition> =
            self.transitions.iter().filter(|t| t.from_state == from).collect();
        edges.sort_by_key(|t| t.priority);
        edges.iter().map(|t| t.to_state.as_str()).collect()
    }

    /// A shortest legal path (in number of hops) from `from` to `to`,
    /// inclusive of both endpoints, or `None` if unreachable. Used by
    /// the throttle engine to decide the next single-step state on the
    /// way to a best-possible target that is not directly reachable.
    pub fn shortest_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        if from == to {
            return Some(vec![from.to_string()]);
        }
        use std::collections::{HashMap as Map, VecDeque};
        let mut prev: Map<&str, &str> = Map::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(from);
        prev.insert(from, from);
        while let Some(cur) = queue.pop_front() {
            if cur == to {
                break;
            }
            for next in self.next_states(cur) {
                if !prev.contains_key(next) {
                    prev.insert(next, cur);
                    queue.push_back(next);
                }
            }
        }
        if !prev.contains_key(to) {
            return None;
        }
        let mut path = vec![to.to_string()];
        let mut cur = to;
        while cur != from {
            cur = prev[cur];
            path.push(cur.to_string());
        }
        path.reverse();
        Some(path)
    }

    pub fn upper_bound(&self, state: &str, replica_count: u32) -> Option<u32> {
        self.upper_bounds
            .get(state)
            .and_then(|c| c.resolve(replica_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_constraint_tokens() {
        assert_eq!(StateConstraint::parse("N"), Some(StateConstraint::Unbounded));
        assert_eq!(StateConstraint::parse("R"), Some(StateConstraint::Relative(0)));
        assert_eq!(StateConstraint::parse("R-1"), Some(StateConstraint::Relative(-1)));
        assert_eq!(StateConstraint::parse("3"), Some(StateConstraint::Count(3)));
    }

    #[test]
    fn resolves_relative_against_replica_count() {
        let c = StateConstraint::Relative(-1);
        assert_eq!(c.resolve(3), Some(2));
        assert_eq!(c.resolve(0), Some(0));
    }

    fn online_offline_master() -> StateModelDefinition {
        let mut upper_bounds = HashMap::new();
        upper_bounds.insert("MASTER".to_string(), StateConstraint::Count(1));
        upper_bounds.insert("SLAVE".to_string(), StateConstraint::Relative(-1));
        upper_bounds.insert("OFFLINE".to_string(), StateConstraint::Unbounded);
        StateModelDefinition {
            name: "OnlineOffline-with-Master".to_string(),
            states_priority_list: vec![
                "MASTER".to_string(),
                "SLAVE".to_string(),
                "OFFLINE".to_string(),
            ],
            initial_state: "OFFLINE".to_string(),
            transitions: vec![
                Transition { from_state: "OFFLINE".into(), to_state: "SLAVE".into(), priority: 1 },
                Transition { from_state: "SLAVE".into(), to_state: "MASTER".into(), priority: 1 },
                Transition { from_state: "MASTER".into(), to_state: "SLAVE".into(), priority: 1 },
                Transition { from_state: "SLAVE".into(), to_state: "OFFLINE".into(), priority: 2 },
                Transition { from_state: "ERROR".into(), to_state: "OFFLINE".into(), priority: 1 },
            ],
            upper_bounds,
        }
    }

    #[test]
    fn finds_shortest_path_through_slave() {
        let sm = online_offline_master();
        let path = sm.shortest_path("OFFLINE", "MASTER").unwrap();
        assert_eq!(path, vec!["OFFLINE", "SLAVE", "MASTER"]);
    }
}
