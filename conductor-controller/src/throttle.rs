/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Intermediate-State / Throttle Engine: given current state, pending
//! messages, and the best-possible target, emits the next legal step —
//! one single-hop transition per (instance, resource, partition) that
//! both respects the state model's upper bounds and fits inside the
//! configured throttle budgets. Recovery partitions are classified and
//! prioritized ahead of load-balance ones, in deterministic
//! (resource, partition) order.
//!
//! Per partition, a state's upper bound is checked against a frozen
//! occupancy count taken at the start of the run: accepting a
//! transition adds to that state's count but a same-run transition
//! vacating it is never credited back, since the store won't show it
//! complete until a later refresh. This keeps two instances from
//! swapping states neither of which fits under a cap in a single run —
//! e.g. a MASTER/SLAVE pair trading places can't both be dispatched at
//! once, since nothing serializes the two independent participants
//! that would execute them.

use crate::current_state_agg::ResourceAggregate;
use crate::rebalance::PartitionAssignment;
use crate::resource::ResourceView;
use conductor_common::model::{ClusterConfig, ThrottleScope};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Recovery,
    LoadBalance,
}

impl Classification {
    fn scope(self) -> ThrottleScope {
        match self {
            Classification::Recovery => ThrottleScope::RecoveryBalance,
            Classification::LoadBalance => ThrottleScope::LoadBalance,
        }
    }
}

/// A single-hop transition this run intends to dispatch.
#[derive(Debug, Clone)]
pub struct PlannedTransition {
    pub resource: String,
    pub partition: String,
    pub instance: String,
    pub from_state: String,
    pub to_state: String,
    pub classification: Classification,
}

/// A pending message whose target no longer appears among the
/// best-possible states for its (instance, partition) and should be
/// superseded by a cancellation.
#[derive(Debug, Clone)]
pub struct PlannedCancellation {
    pub resource: String,
    pub partition: String,
    pub instance: String,
    pub message: conductor_common::model::Message,
}

#[derive(Debug, Default)]
pub struct IntermediateState {
    pub transitions: Vec<PlannedTransition>,
    pub cancellations: Vec<PlannedCancellation>,
}

/// Classifies a partition as needing recovery (top state under-filled,
/// or any replica observed ERROR) or load-balance.
pub fn classify_partition(resource: &ResourceView<'_>, partition: &str, aggregate: &ResourceAggregate) -> Classification {
    let Some(observations) = aggregate.partitions.get(partition) else {
        return Classification::LoadBalance;
    };
    let has_error = observations
        .values()
        .any(|obs| obs.current_state.as_deref() == Some("ERROR"));
    if has_error {
        return Classification::Recovery;
    }
    if let Some(top_state) = resource.state_model.top_state() {
        if let Some(required) = resource.state_model.upper_bound(top_state, resource.ideal_state.replica_count) {
            let current_top = observations
                .values()
                .filter(|obs| obs.current_state.as_deref() == Some(top_state))
                .count() as u32;
            if current_top < required {
                return Classification::Recovery;
            }
        }
    }
    Classification::LoadBalance
}

/// Tracks remaining throttle budget for the duration of one pipeline
/// run, across every resource processed.
pub struct ThrottleBudget<'a> {
    cluster_config: &'a ClusterConfig,
    in_use: HashMap<(String, ThrottleScope), u32>,
}

impl<'a> ThrottleBudget<'a> {
    pub fn new(cluster_config: &'a ClusterConfig) -> Self {
        Self {
            cluster_config,
            in_use: HashMap::new(),
        }
    }

    /// Seed in-flight counts from one message already outstanding before
    /// this run, so its budget stays reserved until observed complete.
    pub fn seed_in_flight(&mut self, scope_key: &str, classification: Classification) {
        *self.in_use.entry((scope_key.to_string(), ThrottleScope::Any)).or_insert(0) += 1;
        *self
            .in_use
            .entry((scope_key.to_string(), classification.scope()))
            .or_insert(0) += 1;
    }

    fn has_room(&self, scope_key: &str, scope: ThrottleScope) -> bool {
        let configs = self.cluster_config.throttles_for(scope_key);
        let Some(cfg) = configs.iter().find(|c| c.scope == scope) else {
            return true;
        };
        let used = self.in_use.get(&(scope_key.to_string(), scope)).copied().unwrap_or(0);
        used < cfg.max_concurrent_transitions
    }

    fn consume(&mut self, scope_key: &str, scope: ThrottleScope) {
        *self.in_use.entry((scope_key.to_string(), scope)).or_insert(0) += 1;
    }

    /// Tries to reserve one unit of budget at cluster, resource, and
    /// instance scope, both under ANY and under the classification's own
    /// scope. All four checks must pass or nothing is consumed.
    pub fn try_reserve(&mut self, resource: &str, instance: &str, classification: Classification) -> bool {
        let scope = classification.scope();
        let checks = [
            ("cluster", ThrottleScope::Any),
            ("cluster", scope),
            (resource, ThrottleScope::Any),
            (resource, scope),
            (instance, ThrottleScope::Any),
            (instance, scope),
        ];
        if !checks.iter().all(|(key, s)| self.has_room(key, *s)) {
            return false;
        }
        for (key, s) in checks {
            self.consume(key, s);
        }
        true
    }
}

/// Computes the intermediate state for every resource, consuming a
/// shared throttle budget across the whole run. Recovery-classified
/// partitions are scheduled before load-balance ones, each group
/// ordered by (resource, partition) ascending.
pub fn compute_intermediate_state(
    cluster_config: &ClusterConfig,
    resources: &[ResourceView<'_>],
    best_possible: &HashMap<String, PartitionAssignment>,
    aggregates: &HashMap<String, ResourceAggregate>,
) -> IntermediateState {
    let mut budget = ThrottleBudget::new(cluster_config);
    let mut result = IntermediateState::default();

    // Seed budget with everything already in flight, and collect
    // supersession candidates, before allocating new transitions.
    let mut classifications: HashMap<(String, String), Classification> = HashMap::new();
    for resource in resources {
        let Some(aggregate) = aggregates.get(&resource.ideal_state.resource_name) else {
            continue;
        };
        let Some(target) = best_possible.get(&resource.ideal_state.resource_name) else {
            continue;
        };
        for partition in &resource.partitions {
            let classification = classify_partition(resource, partition, aggregate);
            classifications.insert((resource.ideal_state.resource_name.clone(), partition.clone()), classification);

            let Some(observations) = aggregate.partitions.get(partition) else {
                continue;
            };
            let empty = BTreeMap::new();
            let desired = target.get(partition).unwrap_or(&empty);

            for (instance, obs) in observations {
                if let Some(message) = &obs.pending_message {
                    budget.seed_in_flight("cluster", classification);
                    budget.seed_in_flight(&resource.ideal_state.resource_name, classification);
                    budget.seed_in_flight(instance, classification);

                    let still_wanted = desired.get(instance).is_some_and(|s| s == &message.to_state);
                    if cluster_config.transition_cancel_enabled && !still_wanted {
                        result.cancellations.push(PlannedCancellation {
                            resource: resource.ideal_state.resource_name.clone(),
                            partition: partition.clone(),
                            instance: instance.clone(),
                            message: message.clone(),
                        });
                    }
                }
            }
        }
    }

    let mut recovery_candidates = Vec::new();
    let mut load_balance_candidates = Vec::new();

    for resource in resources {
        let Some(aggregate) = aggregates.get(&resource.ideal_state.resource_name) else {
            continue;
        };
        let Some(target) = best_possible.get(&resource.ideal_state.resource_name) else {
            continue;
        };
        let mut partitions: Vec<&String> = resource.partitions.iter().collect();
        partitions.sort();

        for partition in partitions {
            let Some(observations) = aggregate.partitions.get(partition) else {
                continue;
            };
            let classification = classifications[&(resource.ideal_state.resource_name.clone(), partition.clone())];
            let empty = BTreeMap::new();
            let desired = target.get(partition).unwrap_or(&empty);

            // Frozen per-partition occupancy, used to keep any single run
            // from handing out more instances of a state than its upper
            // bound allows. Entries accepted below only add to this count;
            // a same-run transition vacating a state is not credited back,
            // since the store won't show it complete until a later refresh.
            let mut state_counts: HashMap<String, u32> = HashMap::new();
            for obs in observations.values() {
                let state = obs.current_state.as_deref().unwrap_or(&resource.state_model.initial_state);
                *state_counts.entry(state.to_string()).or_insert(0) += 1;
            }

            let mut instances: Vec<&String> = observations.keys().collect();
            instances.sort();
            for instance in instances {
                let obs = &observations[instance];
                if obs.is_in_flight() {
                    continue;
                }
                let current = obs
                    .current_state
                    .clone()
                    .unwrap_or_else(|| resource.state_model.initial_state.clone());
                let Some(desired_state) = desired.get(instance) else {
                    continue;
                };
                if &current == desired_state {
                    continue;
                }
                let Some(path) = resource.state_model.shortest_path(&current, desired_state) else {
                    continue;
                };
                if path.len() < 2 {
                    continue;
                }
                let next_state = path[1].clone();

                if let Some(bound) = resource.state_model.upper_bound(&next_state, resource.ideal_state.replica_count) {
                    let projected = state_counts.get(&next_state).copied().unwrap_or(0);
                    if projected >= bound {
                        continue;
                    }
                }

                *state_counts.entry(next_state.clone()).or_insert(0) += 1;
                let candidate = PlannedTransition {
                    resource: resource.ideal_state.resource_name.clone(),
                    partition: partition.clone(),
                    instance: instance.clone(),
                    from_state: current,
                    to_state: next_state,
                    classification,
                };
                match classification {
                    Classification::Recovery => recovery_candidates.push(candidate),
                    Classification::LoadBalance => load_balance_candidates.push(candidate),
                }
            }
        }
    }

    for candidate in recovery_candidates.into_iter().chain(load_balance_candidates) {
        if budget.try_reserve(&candidate.resource, &candidate.instance, candidate.classification) {
            result.transitions.push(candidate);
        }
    }

    result
}
