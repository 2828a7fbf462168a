/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Consumes inbound messages for one participant, runs the registered
//! state-model handler, and publishes the resulting CurrentState. The
//! five execution steps (validate, invoke, write back on success, mark
//! ERROR on failure, time out cooperatively) all happen inside one
//! `KeyedDispatcher::run_exclusive` call per (resource, partition).

use crate::dispatcher::KeyedDispatcher;
use conductor_common::error::{ConductorError, Result};
use conductor_common::model::{CurrentState, Message, MessageType};
use conductor_common::paths;
use conductor_statemodel::{NotificationContext, StateModelHandler, StateModelHandlerFactory};
use conductor_store::client::{update_with_retry, CoordinationStore};
use conductor_store::typed::get_typed;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

const CANCEL_GRACE: Duration = Duration::from_secs(2);

type HandlerKey = (String, String);

pub struct Executor {
    store: Arc<dyn CoordinationStore>,
    cluster: String,
    instance: String,
    session_id: String,
    factories: HashMap<String, Arc<dyn StateModelHandlerFactory>>,
    dispatcher: Arc<KeyedDispatcher>,
    handlers: Mutex<HashMap<HandlerKey, Arc<dyn StateModelHandler>>>,
}

impl Executor {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        cluster: impl Into<String>,
        instance: impl Into<String>,
        session_id: impl Into<String>,
        factories: HashMap<String, Arc<dyn StateModelHandlerFactory>>,
        pool_capacity: usize,
    ) -> Self {
        Self {
            store,
            cluster: cluster.into(),
            instance: instance.into(),
            session_id: session_id.into(),
            factories,
            dispatcher: Arc::new(KeyedDispatcher::new(pool_capacity)),
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Polls this instance's message directory once and processes every
    /// message found, each inside its own dispatcher slot. Messages for
    /// the same (resource, partition) are serialized; distinct keys run
    /// concurrently up to the pool's capacity.
    pub async fn poll_once(self: &Arc<Self>) -> Result<()> {
        let root = paths::messages_root(&self.cluster, &self.instance);
        let ids = match self.store.get_children(&root).await {
            Ok(ids) => ids,
            Err(ConductorError::StoreNotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut tasks = Vec::new();
        for msg_id in ids {
            let path = paths::message_path(&self.cluster, &self.instance, &msg_id);
            let message = match get_typed::<Message>(self.store.as_ref(), &path).await {
                Ok(v) => v.data,
                Err(ConductorError::StoreNotFound(_)) => continue,
                Err(e) => {
                    warn!(path, error = %e, "failed to read message, skipping this poll");
                    continue;
                }
            };
            let this = Arc::clone(self);
            tasks.push(tokio::spawn(async move { this.process_message(message).await }));
        }
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "message-processing task panicked");
            }
        }
        Ok(())
    }

    async fn process_message(&self, message: Message) {
        let resource = message.resource_name.clone();
        let partition = message.partition_name.clone();
        let dispatcher = Arc::clone(&self.dispatcher);

        let outcome = dispatcher
            .run_exclusive(&resource, &partition, || self.handle_one(message))
            .await;

        if let Err(e) = outcome {
            error!(resource, partition, error = %e, "message handling failed");
        }
    }

    async fn handle_one(&self, message: Message) -> Result<()> {
        let cs_path = paths::current_state_path(&self.cluster, &self.instance, &self.session_id, &message.resource_name);

        if message.msg_type == MessageType::Cancellation {
            return self.handle_cancellation(&message).await;
        }

        let current = get_typed::<CurrentState>(self.store.as_ref(), &cs_path).await.ok();
        if let Some(cs) = &current {
            if cs.data.session_id != self.session_id {
                warn!(msg_id = %message.msg_id, "stale session, dropping message without invoking handler");
                return self.delete_message(&message).await;
            }
            let observed = cs.data.state_of(&message.partition_name).unwrap_or("OFFLINE");
            if observed != message.from_state {
                warn!(
                    msg_id = %message.msg_id,
                    observed,
                    expected = %message.from_state,
                    "stale from-state, dropping message without invoking handler"
                );
                return self.delete_message(&message).await;
            }
        } else if message.from_state != "OFFLINE" {
            warn!(msg_id = %message.msg_id, "no current state on record for a non-initial from-state, dropping message");
            return self.delete_message(&message).await;
        }

        let handler = self.handler_for(&message).await?;
        let ctx = NotificationContext {
            instance_name: self.instance.clone(),
            session_id: self.session_id.clone(),
            extra: HashMap::new(),
        };

        match run_with_timeout(handler, message.clone(), ctx).await {
            Ok(info) => {
                self.write_success(&message, info).await?;
                self.delete_message(&message).await?;
                if message.to_state == "DROPPED" {
                    self.dispose_handler(&message.resource_name, &message.partition_name).await;
                }
                Ok(())
            }
            Err(e) => {
                error!(msg_id = %message.msg_id, error = %e, "handler transition failed");
                self.write_error(&message).await?;
                self.delete_message(&message).await
            }
        }
    }

    async fn handle_cancellation(&self, message: &Message) -> Result<()> {
        let handler = self.handler_for(message).await?;
        let ctx = NotificationContext {
            instance_name: self.instance.clone(),
            session_id: self.session_id.clone(),
            extra: HashMap::new(),
        };
        let handled = handler.on_cancel(message, &ctx).await;
        if !handled {
            debug!(msg_id = %message.msg_id, "no cancel hook, letting the original transition run to completion");
            return Ok(());
        }
        self.delete_message(message).await
    }

    async fn handler_for(&self, message: &Message) -> Result<Arc<dyn StateModelHandler>> {
        let key = (message.resource_name.clone(), message.partition_name.clone());
        let mut handlers = self.handlers.lock().await;
        if let Some(h) = handlers.get(&key) {
            return Ok(Arc::clone(h));
        }
        let factory = self.factories.get(&message.state_model_def).ok_or_else(|| {
            ConductorError::ConfigInvalid {
                subject: message.state_model_def.clone(),
                reason: "no handler factory registered for this state model".to_string(),
            }
        })?;
        let handler = factory.create_handler(&message.partition_name);
        handlers.insert(key, Arc::clone(&handler));
        Ok(handler)
    }

    /// Disposes the cached handler for a partition once it has
    /// transitioned to DROPPED, so it is rebuilt from scratch if the
    /// partition is ever reassigned to this instance again. Called from
    /// `handle_one` right after a successful transition lands on DROPPED.
    async fn dispose_handler(&self, resource: &str, partition: &str) {
        self.handlers.lock().await.remove(&(resource.to_string(), partition.to_string()));
        self.dispatcher.forget(resource, partition);
    }

    async fn write_success(&self, message: &Message, info: Option<String>) -> Result<()> {
        let path = paths::current_state_path(&self.cluster, &self.instance, &self.session_id, &message.resource_name);
        let partition = message.partition_name.clone();
        let to_state = message.to_state.clone();
        let instance = self.instance.clone();
        let session = self.session_id.clone();
        let resource = message.resource_name.clone();
        let state_model = message.state_model_def.clone();

        update_with_retry(self.store.as_ref(), &path, true, 3, move |current| {
            let mut cs: CurrentState = current
                .and_then(|b| serde_json::from_slice(b).ok())
                .unwrap_or_else(|| CurrentState::new(instance.clone(), session.clone(), resource.clone(), state_model.clone()));
            cs.partition_state.insert(partition.clone(), to_state.clone());
            cs.requested_state.remove(&partition);
            if let Some(info) = &info {
                cs.info.insert(partition.clone(), info.clone());
            }
            serde_json::to_vec(&cs).expect("CurrentState always serializes")
        })
        .await
        .map(|_| ())
    }

    async fn write_error(&self, message: &Message) -> Result<()> {
        let path = paths::current_state_path(&self.cluster, &self.instance, &self.session_id, &message.resource_name);
        let partition = message.partition_name.clone();
        let instance = self.instance.clone();
        let session = self.session_id.clone();
        let resource = message.resource_name.clone();
        let state_model = message.state_model_def.clone();

        update_with_retry(self.store.as_ref(), &path, true, 3, move |current| {
            let mut cs: CurrentState = current
                .and_then(|b| serde_json::from_slice(b).ok())
                .unwrap_or_else(|| CurrentState::new(instance.clone(), session.clone(), resource.clone(), state_model.clone()));
            cs.partition_state.insert(partition.clone(), "ERROR".to_string());
            cs.requested_state.remove(&partition);
            serde_json::to_vec(&cs).expect("CurrentState always serializes")
        })
        .await
        .map(|_| ())
    }

    async fn delete_message(&self, message: &Message) -> Result<()> {
        let path = paths::message_path(&self.cluster, &self.instance, &message.msg_id);
        match self.store.delete(&path).await {
            Ok(()) | Err(ConductorError::StoreNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

async fn run_with_timeout(
    handler: Arc<dyn StateModelHandler>,
    message: Message,
    ctx: NotificationContext,
) -> anyhow::Result<Option<String>> {
    let timeout_ms = message.timeout_ms;
    let mut task: JoinHandle<anyhow::Result<Option<String>>> =
        tokio::spawn(async move { handler.transition(&message, &ctx).await });

    let Some(timeout_ms) = timeout_ms else {
        return task.await.map_err(|e| anyhow::anyhow!("handler task panicked: {e}"))?;
    };

    match tokio::time::timeout(Duration::from_millis(timeout_ms), &mut task).await {
        Ok(join_result) => join_result.map_err(|e| anyhow::anyhow!("handler task panicked: {e}"))?,
        Err(_elapsed) => {
            task.abort();
            match tokio::time::timeout(CANCEL_GRACE, &mut task).await {
                Ok(_) => Err(anyhow::anyhow!("handler timed out and was cancelled")),
                Err(_) => Err(anyhow::anyhow!("handler did not respond to cancellation within the grace period")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conductor_common::model::LiveInstance;
    use conductor_store::memory::InMemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct EchoHandler {
        should_fail: AtomicBool,
    }

    #[async_trait]
    impl StateModelHandler for EchoHandler {
        async fn transition(&self, message: &Message, _ctx: &NotificationContext) -> anyhow::Result<Option<String>> {
            if self.should_fail.load(Ordering::SeqCst) {
                anyhow::bail!("synthetic handler failure");
            }
            Ok(Some(format!("moved to {}", message.to_state)))
        }
    }

    struct EchoFactory {
        should_fail: Arc<AtomicBool>,
    }

    impl StateModelHandlerFactory for EchoFactory {
        fn create_handler(&self, _partition: &str) -> Arc<dyn StateModelHandler> {
            Arc::new(EchoHandler { should_fail: AtomicBool::new(self.should_fail.load(Ordering::SeqCst)) })
        }
    }

    async fn seed_instance(store: &dyn CoordinationStore, cluster: &str, instance: &str, session: &str) {
        conductor_store::typed::create_recursive_typed(
            store,
            &paths::live_instance_path(cluster, instance),
            &LiveInstance::new(instance, session),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn successful_transition_writes_state_and_deletes_message() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        seed_instance(store.as_ref(), "c1", "i1", "s1").await;

        let mut factories: HashMap<String, Arc<dyn StateModelHandlerFactory>> = HashMap::new();
        factories.insert(
            "OnlineOffline-with-Master".to_string(),
            Arc::new(EchoFactory { should_fail: Arc::new(AtomicBool::new(false)) }),
        );
        let executor = Arc::new(Executor::new(Arc::clone(&store), "c1", "i1", "s1", factories, 4));

        let message = Message::new_state_transition(
            "m1", "controller", "i1", "s1", "R", "R_0", "OnlineOffline-with-Master", "OFFLINE", "SLAVE", 1000,
        );
        conductor_store::typed::create_recursive_typed(
            store.as_ref(),
            &paths::message_path("c1", "i1", "m1"),
            &message,
        )
        .await
        .unwrap();

        executor.poll_once().await.unwrap();

        let cs = get_typed::<CurrentState>(store.as_ref(), &paths::current_state_path("c1", "i1", "s1", "R"))
            .await
            .unwrap();
        assert_eq!(cs.data.state_of("R_0"), Some("SLAVE"));
        assert!(!store.exists(&paths::message_path("c1", "i1", "m1")).await.unwrap());
    }

    #[tokio::test]
    async fn mismatched_from_state_drops_message_without_invoking_handler() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        seed_instance(store.as_ref(), "c1", "i1", "s1").await;

        let mut cs = CurrentState::new("i1", "s1", "R", "OnlineOffline-with-Master");
        cs.partition_state.insert("R_0".to_string(), "SLAVE".to_string());
        conductor_store::typed::create_recursive_typed(
            store.as_ref(),
            &paths::current_state_path("c1", "i1", "s1", "R"),
            &cs,
        )
        .await
        .unwrap();

        let mut factories: HashMap<String, Arc<dyn StateModelHandlerFactory>> = HashMap::new();
        factories.insert(
            "OnlineOffline-with-Master".to_string(),
            Arc::new(EchoFactory { should_fail: Arc::new(AtomicBool::new(true)) }),
        );
        let executor = Arc::new(Executor::new(Arc::clone(&store), "c1", "i1", "s1", factories, 4));

        let message = Message::new_state_transition(
            "m1", "controller", "i1", "s1", "R", "R_0", "OnlineOffline-with-Master", "OFFLINE", "SLAVE", 1000,
        );
        conductor_store::typed::create_recursive_typed(
            store.as_ref(),
            &paths::message_path("c1", "i1", "m1"),
            &message,
        )
        .await
        .unwrap();

        executor.poll_once().await.unwrap();

        let cs = get_typed::<CurrentState>(store.as_ref(), &paths::current_state_path("c1", "i1", "s1", "R"))
            .await
            .unwrap();
        // Still SLAVE: the stale OFFLINE->SLAVE message was dropped, not applied.
        assert_eq!(cs.data.state_of("R_0"), Some("SLAVE"));
    }

    #[tokio::test]
    async fn handler_failure_marks_partition_error() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        seed_instance(store.as_ref(), "c1", "i1", "s1").await;

        let mut factories: HashMap<String, Arc<dyn StateModelHandlerFactory>> = HashMap::new();
        factories.insert(
            "OnlineOffline-with-Master".to_string(),
            Arc::new(EchoFactory { should_fail: Arc::new(AtomicBool::new(true)) }),
        );
        let executor = Arc::new(Executor::new(Arc::clone(&store), "c1", "i1", "s1", factories, 4));

        let message = Message::new_state_transition(
            "m1", "controller", "i1", "s1", "R", "R_0", "OnlineOffline-with-Master", "OFFLINE", "SLAVE", 1000,
        );
        conductor_store::typed::create_recursive_typed(
            store.as_ref(),
            &paths::message_path("c1", "i1", "m1"),
            &message,
        )
        .await
        .unwrap();

        executor.poll_once().await.unwrap();

        let cs = get_typed::<CurrentState>(store.as_ref(), &paths::current_state_path("c1", "i1", "s1", "R"))
            .await
            .unwrap();
        assert_eq!(cs.data.state_of("R_0"), Some("ERROR"));
    }

    #[tokio::test]
    async fn transition_to_dropped_disposes_the_cached_handler() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
        seed_instance(store.as_ref(), "c1", "i1", "s1").await;

        let mut factories: HashMap<String, Arc<dyn StateModelHandlerFactory>> = HashMap::new();
        factories.insert(
            "OnlineOffline-with-Master".to_string(),
            Arc::new(EchoFactory { should_fail: Arc::new(AtomicBool::new(false)) }),
        );
        let executor = Arc::new(Executor::new(Arc::clone(&store), "c1", "i1", "s1", factories, 4));

        let message = Message::new_state_transition(
            "m1", "controller", "i1", "s1", "R", "R_0", "OnlineOffline-with-Master", "OFFLINE", "DROPPED", 1000,
        );
        conductor_store::typed::create_recursive_typed(
            store.as_ref(),
            &paths::message_path("c1", "i1", "m1"),
            &message,
        )
        .await
        .unwrap();

        executor.poll_once().await.unwrap();

        assert!(!executor.handlers.lock().await.contains_key(&("R".to_string(), "R_0".to_string())));
    }
}
