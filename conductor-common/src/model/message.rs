/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::{Deserialize, Serialize};

/// Message wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    StateTransition,
    TaskReply,
    Cancellation,
    NoOp,
    Shutdown,
}

/// `INSTANCES/{instance}/MESSAGES/{msgId}`: created by the
/// controller, consumed by the participant, deleted on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub msg_id: String,
    pub msg_type: MessageType,
    pub msg_sub_type: Option<String>,
    pub src_name: String,
    pub tgt_name: String,
    pub tgt_session_id: String,
    pub resource_name: String,
    pub partition_name: String,
    pub state_model_def: String,
    pub from_state: String,
    pub to_state: String,
    pub create_timestamp: i64,
    pub execute_start_timestamp: Option<i64>,
    pub retry_count: u32,
    /// Handler timeout in milliseconds; `None` means no explicit
    /// deadline beyond the executor's own grace period.
    pub timeout_ms: Option<u64>,
}

impl Message {
    pub fn new_state_transition(
        msg_id: impl Into<String>,
        src_name: impl Into<String>,
        tgt_name: impl Into<String>,
        tgt_session_id: impl Into<String>,
        resource_name: impl Into<String>,
        partition_name: impl Into<String>,
        state_model_def: impl Into<String>,
        from_state: impl Into<String>,
        to_state: impl Into<String>,
        create_timestamp: i64,
    ) -> Self {
        Self {
            msg_id: msg_id.into(),
            msg_type: MessageType::StateTransition,
            msg_sub_type: None,
            src_name: src_name.into(),
            tgt_name: tgt_name.into(),
            tgt_session_id: tgt_session_id.into(),
            resource_name: resource_name.into(),
            partition_name: partition_name.into(),
            state_model_def: state_model_def.into(),
            from_state: from_state.into(),
            to_state: to_state.into(),
            create_timestamp,
            execute_start_timestamp: None,
            retry_count: 0,
            timeout_ms: None,
        }
    }

    /// Turn this in-flight STATE_TRANSITION message into a cancellation
    /// that supersedes it; both are counted against the throttle budget
    /// until the cancellation is observed complete.
    pub fn into_cancellation(mut self) -> Self {
        self.msg_type = MessageType::Cancellation;
        self
    }
}
