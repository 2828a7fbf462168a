/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The participant handler contract: for each (from, to) pair in a
//! state model, a handler exposes a transition method receiving a
//! message and a notification context. Rust has no reflection-based
//! method dispatch by name, so the per-pair methods a cluster manager
//! generates from a state-model definition are expressed here as one
//! dispatch method the handler implementation switches on internally,
//! rather than a trait method per transition edge.

use async_trait::async_trait;
use conductor_common::model::Message;
use std::collections::HashMap;

/// Context passed alongside a message to a transition method.
#[derive(Debug, Clone, Default)]
pub struct NotificationContext {
    pub instance_name: String,
    pub session_id: String,
    pub extra: HashMap<String, String>,
}

/// One state-model handler instance, keyed by partition on the
/// participant side and cached for the partition's lifetime on this
/// participant.
#[async_trait]
pub trait StateModelHandler: Send + Sync {
    /// Execute the transition named by `message.from_state ->
    /// message.to_state`. Returning `Err` marks the partition ERROR on
    /// this participant; returning `Ok(info)` writes
    /// `info` (if present) into the partition's CurrentState info map.
    async fn transition(
        &self,
        message: &Message,
        ctx: &NotificationContext,
    ) -> anyhow::Result<Option<String>>;

    /// Called when the partition is reset (e.g. after ERROR recovery)
    /// before any further transition is attempted.
    async fn on_reset(&self, _ctx: &NotificationContext) {}

    /// Called when a transition handler errors, before CurrentState is
    /// written as ERROR, so the handler can release resources.
    async fn on_error(&self, _message: &Message, _ctx: &NotificationContext, _error: &anyhow::Error) {}

    /// Called instead of `transition` when transition-cancel is enabled
    /// and a cancellation message arrives for an in-flight transition.
    /// Returning `false` means no cancel hook is implemented, so the
    /// executor lets the original transition run to completion.
    async fn on_cancel(&self, _message: &Message, _ctx: &NotificationContext) -> bool {
        false
    }
}

/// Produces `StateModelHandler` instances keyed by partition, registered
/// per state-model name on the participant.
pub trait StateModelHandlerFactory: Send + Sync {
    fn create_handler(&self, partition: &str) -> std::sync::Arc<dyn StateModelHandler>;
}
