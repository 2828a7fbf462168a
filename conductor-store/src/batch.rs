/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Batched async access: issue every operation in a
//! batch concurrently, then await the collective result. This is the
//! uniform future/completion primitive in place of a callback-driven
//! store client — upstream stages never see a callback, only
//! `Vec<Result<_>>`.

use crate::client::CoordinationStore;
use crate::typed::create_recursive_typed;
use conductor_common::error::Result;
use futures::future::join_all;
use serde::Serialize;

/// Create every `(path, value)` pair concurrently, auto-creating
/// missing parents per item. Each slot in the returned vector
/// corresponds to the same index in `items`; one item's failure does
/// not cancel the others.
pub async fn batch_create_recursive<T: Serialize + Sync>(
    store: &dyn CoordinationStore,
    items: &[(String, T)],
) -> Vec<Result<i64>> {
    let futures = items.iter().map(|(path, value)| async move {
        create_recursive_typed(store, path, value)
            .await
            .map(|created| created.len() as i64)
    });
    join_all(futures).await
}

/// Delete every path concurrently. Used once a message has been
/// consumed by a participant, and during garbage collection of
/// stale-session CurrentState records.
pub async fn batch_delete(store: &dyn CoordinationStore, paths: &[String]) -> Vec<Result<()>> {
    let futures = paths.iter().map(|path| store.delete(path));
    join_all(futures).await
}
