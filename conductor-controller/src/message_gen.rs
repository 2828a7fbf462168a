/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Message Generation: turns the throttle engine's planned transitions
//! and cancellations into concrete `Message` records, ready for dispatch
//! to write to each participant's message queue.

use crate::snapshot::ClusterSnapshot;
use crate::throttle::IntermediateState;
use conductor_common::model::Message;

pub struct GeneratedMessages {
    /// New STATE_TRANSITION messages to create.
    pub new_messages: Vec<Message>,
    /// Existing messages to overwrite in place as CANCELLATION, keyed by
    /// (instance, msg_id).
    pub cancellations: Vec<(String, Message)>,
}

pub fn generate(snapshot: &ClusterSnapshot, intermediate: &IntermediateState, now_ms: i64) -> GeneratedMessages {
    let mut new_messages = Vec::new();

    for transition in &intermediate.transitions {
        let Some(live) = snapshot.live_instances.get(&transition.instance) else {
            continue;
        };
        let state_model = snapshot
            .ideal_states
            .get(&transition.resource)
            .map(|is| is.state_model_ref.clone())
            .unwrap_or_default();
        let msg_id = uuid::Uuid::new_v4().to_string();
        let message = Message::new_state_transition(
            msg_id,
            "controller",
            transition.instance.clone(),
            live.session_id.clone(),
            transition.resource.clone(),
            transition.partition.clone(),
            state_model,
            transition.from_state.clone(),
            transition.to_state.clone(),
            now_ms,
        );
        new_messages.push(message);
    }

    let cancellations = intermediate
        .cancellations
        .iter()
        .map(|c| (c.instance.clone(), c.message.clone().into_cancellation()))
        .collect();

    GeneratedMessages {
        new_messages,
        cancellations,
    }
}
