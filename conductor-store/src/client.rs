/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The coordination-store adapter contract. A typed,
//! versioned KV interface over whatever hierarchical store backs the
//! cluster (etcd in `EtcdStore`, an in-process map in `InMemoryStore`
//! for tests). Everything above this trait — the cache, the dispatcher,
//! the executor — talks only to `CoordinationStore`, never to a
//! concrete backend.

use crate::versioned::{Stat, Versioned};
use async_trait::async_trait;
use conductor_common::error::{ConductorError, Result};
use futures::stream::BoxStream;
use std::path::{Path, PathBuf};

/// A change notification for a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEvent {
    DataChanged { path: PathBuf, version: i64 },
    Deleted { path: PathBuf },
}

/// A change notification for a path's child set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildEvent {
    ChildAdded { parent: PathBuf, child: String },
    ChildRemoved { parent: PathBuf, child: String },
}

/// Outcome of one operation inside a batch: either the operation's own
/// result, or a marker that the path did not exist at the time the
/// batch was issued (so the caller's NO_NODE second pass can create it
/// and retry).
#[derive(Debug)]
pub enum BatchOutcome<T> {
    Ok(T),
    NotFound(PathBuf),
    Err(ConductorError),
}

#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Read the raw bytes and version at `path`.
    async fn get(&self, path: &str) -> Result<Versioned<Vec<u8>>>;

    /// Read the raw bytes at every path, in order. Each slot is `None`
    /// if the corresponding path does not exist. This is the multi-get
    /// the cluster data cache batches its reads through.
    async fn batch_get(&self, paths: &[String]) -> Result<Vec<Option<Versioned<Vec<u8>>>>> {
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            match self.get(path).await {
                Ok(v) => out.push(Some(v)),
                Err(ConductorError::StoreNotFound(_)) => out.push(None),
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Write `data` at `path` with an optimistic expected version
    /// (`UNCONDITIONAL` to skip the check), returning the new version.
    /// Fails with `StoreNotFound` if the path does not exist; use
    /// `create` or `create_recursive` to bring it into existence first.
    async fn set(&self, path: &str, data: Vec<u8>, expected_version: i64) -> Result<i64>;

    /// Create `path` with `data` in persistent mode. Fails if the path
    /// already exists.
    async fn create(&self, path: &str, data: Vec<u8>) -> Result<i64>;

    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    async fn get_stat(&self, path: &str) -> Result<Stat>;

    async fn get_children(&self, path: &str) -> Result<Vec<String>>;

    /// Subscribe to data changes at `path`.
    async fn watch_path(&self, path: &str) -> Result<BoxStream<'static, PathEvent>>;

    /// Subscribe to additions/removals of `path`'s children.
    async fn watch_children(&self, path: &str) -> Result<BoxStream<'static, ChildEvent>>;

    /// Create `path`, recursively creating any missing persistent-mode
    /// parents first. Returns the full list of paths this call actually
    /// created (parents first), so a caller can roll them back on a
    /// later failure.
    async fn create_recursive(&self, path: &str, data: Vec<u8>) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        let mut missing_ancestors = Vec::new();
        let mut cursor = Path::new(path).to_path_buf();
        loop {
            let parent = match cursor.parent() {
                Some(p) if !p.as_os_str().is_empty() && p != Path::new("/") => p.to_path_buf(),
                _ => break,
            };
            if self.exists(&path_str(&parent)).await? {
                break;
            }
            missing_ancestors.push(parent.clone());
            cursor = parent;
        }
        for ancestor in missing_ancestors.into_iter().rev() {
            let ancestor_str = path_str(&ancestor);
            match self.create(&ancestor_str, Vec::new()).await {
                Ok(_) => created.push(ancestor),
                Err(ConductorError::StoreNotFound(_)) => {
                    // Raced with another creator; fall through and retry below.
                }
                Err(e) => return Err(e),
            }
        }
        match self.create(path, data).await {
            Ok(_) => {
                created.push(PathBuf::from(path));
                Ok(created)
            }
            Err(e) => Err(e),
        }
    }

}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// Read-apply-write with retry on version conflict. `f` receives the
/// current bytes (`None` if the path does not yet exist and
/// `allow_create` is set) and returns the
/// bytes to write. Retries until the write succeeds or `max_retries` is
/// exhausted.
///
/// This is a free function rather than a trait method so
/// `CoordinationStore` stays object-safe: callers hold
/// `Arc<dyn CoordinationStore>` almost everywhere above the backend
/// implementations.
pub async fn update_with_retry<F>(
    store: &dyn CoordinationStore,
    path: &str,
    allow_create: bool,
    max_retries: u32,
    mut f: F,
) -> Result<i64>
where
    F: FnMut(Option<&[u8]>) -> Vec<u8> + Send,
{
    let mut attempt = 0;
    loop {
        let current = match store.get(path).await {
            Ok(v) => Some(v),
            Err(ConductorError::StoreNotFound(_)) if allow_create => None,
            Err(e) => return Err(e),
        };
        let (expected_version, input) = match &current {
            Some(v) => (v.version, Some(v.data.as_slice())),
            None => (-1, None),
        };
        let next = f(input);
        let result = if current.is_none() {
            store.create_recursive(path, next).await.map(|_created| 0)
        } else {
            store.set(path, next, expected_version).await
        };
        match result {
            Ok(version) => return Ok(version),
            Err(ConductorError::StoreVersionConflict { .. }) if attempt < max_retries => {
                attempt += 1;
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}
