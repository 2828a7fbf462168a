/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `INSTANCES/{instance}/CURRENTSTATES/{session}/{resource}`:
/// the authoritative observed state of every partition of one resource
/// on one participant, scoped to the participant's live session.
///
/// `bucket_size > 0` would shard this record's maps across child nodes;
/// this controller only supports
/// `bucket_size == 0`, a single unsharded record per (instance, session,
/// resource).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CurrentState {
    pub instance_name: String,
    pub session_id: String,
    pub resource_name: String,
    pub state_model_def: String,
    pub bucket_size: u32,
    pub partition_state: HashMap<String, String>,
    /// Written only by the controller: marks a transition in flight from
    /// the controller's point of view (invariant on
    /// REQUESTED_STATE).
    pub requested_state: HashMap<String, String>,
    pub info: HashMap<String, String>,
}

impl CurrentState {
    pub fn new(
        instance_name: impl Into<String>,
        session_id: impl Into<String>,
        resource_name: impl Into<String>,
        state_model_def: impl Into<String>,
    ) -> Self {
        Self {
            instance_name: instance_name.into(),
            session_id: session_id.into(),
            resource_name: resource_name.into(),
            state_model_def: state_model_def.into(),
            bucket_size: 0,
            partition_state: HashMap::new(),
            requested_state: HashMap::new(),
            info: HashMap::new(),
        }
    }

    pub fn state_of(&self, partition: &str) -> Option<&str> {
        self.partition_state.get(partition).map(|s| s.as_str())
    }
}
