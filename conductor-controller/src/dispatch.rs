/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Dispatch: writes REQUESTED_STATE before the message that names it (so
//! a crash leaves a discoverable intent), then batch-creates new
//! messages and overwrites superseded ones as cancellations. Both the
//! REQUESTED_STATE writes and the message creates for a run are issued
//! concurrently as a batch and awaited together, rather than one message
//! at a time; a version conflict abandons just that message, the rest of
//! the batch is unaffected. The next pipeline run recomputes against a
//! fresh snapshot rather than retrying blindly.

use crate::message_gen::GeneratedMessages;
use conductor_common::error::{ConductorError, Result};
use conductor_common::model::Message;
use conductor_common::paths;
use conductor_store::batch::batch_create_recursive;
use conductor_store::client::{update_with_retry, CoordinationStore};
use futures::future::join_all;
use tracing::warn;

const REQUESTED_STATE_RETRIES: u32 = 3;

pub struct DispatchReport {
    pub messages_created: usize,
    pub messages_cancelled: usize,
    pub messages_abandoned: usize,
}

pub async fn dispatch(
    store: &dyn CoordinationStore,
    cluster: &str,
    session_by_instance: &std::collections::HashMap<String, String>,
    generated: &GeneratedMessages,
) -> Result<DispatchReport> {
    let mut created = 0usize;
    let mut cancelled = 0usize;
    let mut abandoned = 0usize;

    let requested_state_results = join_all(
        generated
            .new_messages
            .iter()
            .map(|message| write_requested_state(store, cluster, session_by_instance, message)),
    )
    .await;

    let mut create_items: Vec<(String, Message)> = Vec::new();
    for (message, result) in generated.new_messages.iter().zip(requested_state_results) {
        match result {
            Ok(()) => {
                let path = paths::message_path(cluster, &message.tgt_name, &message.msg_id);
                create_items.push((path, message.clone()));
            }
            Err(e) if e.is_locally_retryable() => {
                warn!(msg_id = %message.msg_id, error = %e, "abandoning dispatch for message after requested-state write failed");
                abandoned += 1;
            }
            Err(e) => return Err(e),
        }
    }

    for result in batch_create_recursive(store, &create_items).await {
        match result {
            Ok(_) => created += 1,
            Err(ConductorError::StoreVersionConflict { .. }) => abandoned += 1,
            Err(e) => return Err(e),
        }
    }

    let cancellation_results = join_all(
        generated
            .cancellations
            .iter()
            .map(|(instance, cancellation)| dispatch_cancellation(store, cluster, session_by_instance, instance, cancellation)),
    )
    .await;
    for result in cancellation_results {
        match result {
            Ok(()) => cancelled += 1,
            Err(ConductorError::StoreVersionConflict { .. }) => abandoned += 1,
            Err(e) => return Err(e),
        }
    }

    Ok(DispatchReport {
        messages_created: created,
        messages_cancelled: cancelled,
        messages_abandoned: abandoned,
    })
}

async fn dispatch_cancellation(
    store: &dyn CoordinationStore,
    cluster: &str,
    session_by_instance: &std::collections::HashMap<String, String>,
    instance: &str,
    cancellation: &Message,
) -> Result<()> {
    if let Some(session) = session_by_instance.get(instance) {
        clear_requested_state(store, cluster, instance, session, cancellation).await?;
    }

    let path = paths::message_path(cluster, instance, &cancellation.msg_id);
    update_with_retry(store, &path, true, REQUESTED_STATE_RETRIES, |_current| {
        serde_json::to_vec(cancellation).expect("Message always serializes")
    })
    .await
    .map(|_| ())
}

async fn write_requested_state(
    store: &dyn CoordinationStore,
    cluster: &str,
    session_by_instance: &std::collections::HashMap<String, String>,
    message: &Message,
) -> Result<()> {
    let Some(session) = session_by_instance.get(&message.tgt_name) else {
        return Ok(());
    };
    let path = paths::current_state_path(cluster, &message.tgt_name, session, &message.resource_name);
    let partition = message.partition_name.clone();
    let to_state = message.to_state.clone();

    update_with_retry(store, &path, true, REQUESTED_STATE_RETRIES, move |current| {
        let mut cs: conductor_common::model::CurrentState = current
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
            .unwrap_or_else(|| conductor_common::model::CurrentState {
                instance_name: message.tgt_name.clone(),
                session_id: session.clone(),
                resource_name: message.resource_name.clone(),
                state_model_def: message.state_model_def.clone(),
                ..Default::default()
            });
        cs.requested_state.insert(partition.clone(), to_state.clone());
        serde_json::to_vec(&cs).expect("CurrentState always serializes")
    })
    .await
    .map(|_| ())
}

/// The controller clears its own REQUESTED_STATE when it cancels a
/// transition, so a superseded partition is never left with a stale
/// intent; the participant clears it on ordinary completion instead.
async fn clear_requested_state(
    store: &dyn CoordinationStore,
    cluster: &str,
    instance: &str,
    session: &str,
    cancellation: &Message,
) -> Result<()> {
    let path = paths::current_state_path(cluster, instance, session, &cancellation.resource_name);
    let partition = cancellation.partition_name.clone();
    match update_with_retry(store, &path, false, REQUESTED_STATE_RETRIES, move |current| {
        let mut cs: conductor_common::model::CurrentState =
            current.and_then(|bytes| serde_json::from_slice(bytes).ok()).unwrap_or_default();
        cs.requested_state.remove(&partition);
        serde_json::to_vec(&cs).expect("CurrentState always serializes")
    })
    .await
    {
        Ok(_) => Ok(()),
        Err(ConductorError::StoreNotFound(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
