/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Delayed rebalance: an instance that went non-live less than
//! `delay_rebalance_time_ms` ago is treated as still live for placement
//! purposes, so a brief participant restart does not trigger a full
//! reshuffle. Tracking survives across pipeline runs in a
//! `DelayRebalanceTracker` owned by the pipeline driver.

use crate::snapshot::ClusterSnapshot;
use conductor_common::model::LiveInstance;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct DelayRebalanceTracker {
    offline_since_ms: HashMap<String, i64>,
}

impl DelayRebalanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot with recently-departed instances reinstated as
    /// live (for rebalancing purposes only), plus the earliest future
    /// timestamp (ms) at which a reinstated instance's grace period
    /// expires, if any.
    pub fn apply(&mut self, now_ms: i64, snapshot: &ClusterSnapshot) -> (ClusterSnapshot, Option<i64>) {
        let known: HashSet<String> = snapshot
            .instance_configs
            .keys()
            .cloned()
            .chain(snapshot.live_instances.keys().cloned())
            .collect();

        for name in &known {
            if snapshot.is_instance_live(name) {
                self.offline_since_ms.remove(name);
            } else {
                self.offline_since_ms.entry(name.clone()).or_insert(now_ms);
            }
        }
        self.offline_since_ms.retain(|name, _| known.contains(name));

        let delay_ms = snapshot.cluster_config.as_ref().map(|c| c.delay_rebalance_time_ms).unwrap_or(0);
        let disabled = snapshot.cluster_config.as_ref().map(|c| c.delay_rebalance_disabled).unwrap_or(false);
        if disabled || delay_ms == 0 {
            return (snapshot.clone(), None);
        }

        let mut effective = snapshot.clone();
        let mut next_wakeup: Option<i64> = None;
        for (name, since) in &self.offline_since_ms {
            let expiry = since + delay_ms as i64;
            if now_ms < expiry {
                effective
                    .live_instances
                    .entry(name.clone())
                    .or_insert_with(|| LiveInstance::new(name.clone(), "delayed-rebalance"));
                next_wakeup = Some(next_wakeup.map_or(expiry, |w| w.min(expiry)));
            }
        }
        (effective, next_wakeup)
    }
}
