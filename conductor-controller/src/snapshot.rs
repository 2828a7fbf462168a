/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The immutable snapshot every pipeline stage reads from: a single
//! pipeline run executes against one immutable snapshot.
//! `ClusterDataCache` builds the next one and publishes it by swap;
//! nothing here ever mutates in place.

use conductor_common::model::{
    ClusterConfig, CurrentState, IdealState, InstanceConfig, LiveInstance, Message,
    StateModelDefinition,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub cluster_config: Option<ClusterConfig>,
    pub instance_configs: HashMap<String, InstanceConfig>,
    pub live_instances: HashMap<String, LiveInstance>,
    pub ideal_states: HashMap<String, IdealState>,
    pub state_model_defs: HashMap<String, StateModelDefinition>,
    /// Keyed by (instance, resource); only populated for instances that
    /// are currently live, scoped to their current session; stale-session
    /// records are ignored by the controller.
    pub current_states: HashMap<(String, String), CurrentState>,
    /// All pending messages, keyed by target instance.
    pub pending_messages: HashMap<String, Vec<Message>>,
}

impl ClusterSnapshot {
    pub fn is_instance_live(&self, instance: &str) -> bool {
        self.live_instances.contains_key(instance)
    }

    pub fn is_instance_enabled(&self, instance: &str) -> bool {
        self.instance_configs
            .get(instance)
            .map(|c| c.enabled)
            .unwrap_or(false)
    }

    pub fn current_state_of(&self, instance: &str, resource: &str) -> Option<&CurrentState> {
        self.current_states
            .get(&(instance.to_string(), resource.to_string()))
    }

    pub fn pending_messages_for(&self, instance: &str) -> &[Message] {
        self.pending_messages
            .get(instance)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Pending STATE_TRANSITION/CANCELLATION message targeting this
    /// exact (instance, resource, partition), if any. At most one
    /// should ever be found.
    pub fn pending_message_for_partition<'a>(
        &'a self,
        instance: &str,
        resource: &str,
        partition: &str,
    ) -> Option<&'a Message> {
        self.pending_messages_for(instance).iter().find(|m| {
            m.resource_name == resource && m.partition_name == partition
        })
    }
}
