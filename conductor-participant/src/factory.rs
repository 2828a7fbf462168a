/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Maps state-model names to the handler factory that builds the
//! per-partition handler for them. `conductor-agentd` registers one
//! factory per state model it knows how to run; any state model left
//! unregistered falls back to a logging handler that accepts every
//! transition without doing real work, so a freshly started participant
//! never drops a message outright for a model it doesn't recognize.

use async_trait::async_trait;
use conductor_common::model::Message;
use conductor_statemodel::{NotificationContext, StateModelHandler, StateModelHandlerFactory};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub struct LoggingHandler {
    partition: String,
}

#[async_trait]
impl StateModelHandler for LoggingHandler {
    async fn transition(&self, message: &Message, _ctx: &NotificationContext) -> anyhow::Result<Option<String>> {
        info!(
            partition = %self.partition,
            from = %message.from_state,
            to = %message.to_state,
            "no handler registered for this state model, accepting transition as a no-op"
        );
        Ok(None)
    }
}

pub struct LoggingHandlerFactory;

impl StateModelHandlerFactory for LoggingHandlerFactory {
    fn create_handler(&self, partition: &str) -> Arc<dyn StateModelHandler> {
        Arc::new(LoggingHandler { partition: partition.to_string() })
    }
}

/// Builds the `(state model name -> factory)` map an `Executor` is
/// constructed with, defaulting every name not explicitly registered to
/// [`LoggingHandlerFactory`].
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    factories: HashMap<String, Arc<dyn StateModelHandlerFactory>>,
}

impl HandlerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, state_model: impl Into<String>, factory: Arc<dyn StateModelHandlerFactory>) -> Self {
        self.factories.insert(state_model.into(), factory);
        self
    }

    pub fn build(self, known_state_models: &[&str]) -> HashMap<String, Arc<dyn StateModelHandlerFactory>> {
        let mut factories = self.factories;
        for name in known_state_models {
            factories.entry((*name).to_string()).or_insert_with(|| Arc::new(LoggingHandlerFactory));
        }
        factories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unregistered_state_model_falls_back_to_logging_handler() {
        let factories = HandlerRegistryBuilder::new().build(&["OnlineOffline-with-Master"]);
        let factory = factories.get("OnlineOffline-with-Master").unwrap();
        let handler = factory.create_handler("R_0");
        let message = Message::new_state_transition(
            "m1", "controller", "i1", "s1", "R", "R_0", "OnlineOffline-with-Master", "OFFLINE", "SLAVE", 1000,
        );
        let ctx = NotificationContext::default();
        let result = handler.transition(&message, &ctx).await.unwrap();
        assert!(result.is_none());
    }
}
