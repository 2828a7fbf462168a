/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// `CONFIGS/PARTICIPANT/{instance}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub instance_name: String,
    pub host: String,
    pub port: u16,
    pub enabled: bool,
    pub tags: HashSet<String>,
    /// Partitions of a resource that are disabled on this instance,
    /// keyed by resource name.
    pub disabled_partitions: HashMap<String, HashSet<String>>,
    /// Free-form capacity weights used by FULL_AUTO placement, e.g.
    /// `{"CPU": 100, "MEM": 100}`. Empty means "uniform capacity".
    pub capacity: HashMap<String, u32>,
}

impl InstanceConfig {
    pub fn new(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            host: String::new(),
            port: 0,
            enabled: true,
            tags: HashSet::new(),
            disabled_partitions: HashMap::new(),
            capacity: HashMap::new(),
        }
    }

    pub fn is_partition_disabled(&self, resource: &str, partition: &str) -> bool {
        self.disabled_partitions
            .get(resource)
            .is_some_and(|set| set.contains(partition))
    }
}
