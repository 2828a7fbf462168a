/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! An in-process, version-tracked hierarchical store used by the
//! controller and participant test suites. This is the in-repo fake
//! that lets the pipeline and executor be exercised without a live
//! coordination service, the way `kimberlite-sim` stands in for a real
//! cluster in that crate's tests.

use crate::client::{ChildEvent, CoordinationStore, PathEvent};
use crate::versioned::{Stat, Versioned};
use async_trait::async_trait;
use conductor_common::error::{ConductorError, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

struct Entry {
    data: Vec<u8>,
    version: i64,
}

pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    path_events: broadcast::Sender<PathEvent>,
    child_events: broadcast::Sender<ChildEvent>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        let (path_events, _) = broadcast::channel(1024);
        let (child_events, _) = broadcast::channel(1024);
        Self {
            entries: Mutex::new(HashMap::new()),
            path_events,
            child_events,
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn parent_of(path: &str) -> Option<String> {
        let mut segments: Vec<&str> = path.split('/').collect();
        if segments.len() <= 2 {
            // "" and the single top-level segment, e.g. ["", "cluster"].
            return None;
        }
        segments.pop();
        Some(segments.join("/"))
    }

    fn child_name(path: &str) -> String {
        path.rsplit('/').next().unwrap_or(path).to_string()
    }
}

#[async_trait]
impl CoordinationStore for InMemoryStore {
    async fn get(&self, path: &str) -> Result<Versioned<Vec<u8>>> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(path)
            .map(|e| Versioned::new(e.data.clone(), e.version))
            .ok_or_else(|| ConductorError::StoreNotFound(PathBuf::from(path)))
    }

    async fn set(&self, path: &str, data: Vec<u8>, expected_version: i64) -> Result<i64> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(path)
            .ok_or_else(|| ConductorError::StoreNotFound(PathBuf::from(path)))?;
        if expected_version != -1 && entry.version != expected_version {
            return Err(ConductorError::StoreVersionConflict {
                path: PathBuf::from(path),
                expected: expected_version,
                actual: entry.version,
            });
        }
        entry.data = data;
        entry.version += 1;
        let version = entry.version;
        let _ = self.path_events.send(PathEvent::DataChanged {
            path: PathBuf::from(path),
            version,
        });
        Ok(version)
    }

    async fn create(&self, path: &str, data: Vec<u8>) -> Result<i64> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(path) {
            let actual = entries[path].version;
            return Err(ConductorError::StoreVersionConflict {
                path: PathBuf::from(path),
                expected: -1,
                actual,
            });
        }
        entries.insert(path.to_string(), Entry { data, version: 0 });
        drop(entries);
        let _ = self.path_events.send(PathEvent::DataChanged {
            path: PathBuf::from(path),
            version: 0,
        });
        if let Some(parent) = Self::parent_of(path) {
            let _ = self.child_events.send(ChildEvent::ChildAdded {
                parent: PathBuf::from(parent),
                child: Self::child_name(path),
            });
        }
        Ok(0)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(path).is_none() {
            return Err(ConductorError::StoreNotFound(PathBuf::from(path)));
        }
        drop(entries);
        let _ = self.path_events.send(PathEvent::Deleted {
            path: PathBuf::from(path),
        });
        if let Some(parent) = Self::parent_of(path) {
            let _ = self.child_events.send(ChildEvent::ChildRemoved {
                parent: PathBuf::from(parent),
                child: Self::child_name(path),
            });
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.entries.lock().unwrap().contains_key(path))
    }

    async fn get_stat(&self, path: &str) -> Result<Stat> {
        let entries = self.entries.lock().unwrap();
        let entry = entries
            .get(path)
            .ok_or_else(|| ConductorError::StoreNotFound(PathBuf::from(path)))?;
        let prefix = format!("{path}/");
        let num_children = entries
            .keys()
            .filter(|k| k.starts_with(&prefix) && !k[prefix.len()..].contains('/'))
            .count() as u64;
        Ok(Stat {
            version: entry.version,
            num_children,
        })
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>> {
        let entries = self.entries.lock().unwrap();
        let prefix = format!("{path}/");
        let mut children: Vec<String> = entries
            .keys()
            .filter_map(|k| {
                k.strip_prefix(&prefix)
                    .filter(|rest| !rest.contains('/'))
                    .map(|rest| rest.to_string())
            })
            .collect();
        children.sort();
        Ok(children)
    }

    async fn watch_path(&self, path: &str) -> Result<BoxStream<'static, PathEvent>> {
        let path = path.to_string();
        let rx = self.path_events.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(move |ev| {
            let path = path.clone();
            async move {
                match ev {
                    Ok(PathEvent::DataChanged { path: p, version }) if p == PathBuf::from(&path) => {
                        Some(PathEvent::DataChanged { path: p, version })
                    }
                    Ok(PathEvent::Deleted { path: p }) if p == PathBuf::from(&path) => {
                        Some(PathEvent::Deleted { path: p })
                    }
                    _ => None,
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn watch_children(&self, path: &str) -> Result<BoxStream<'static, ChildEvent>> {
        let path = path.to_string();
        let rx = self.child_events.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(move |ev| {
            let path = path.clone();
            async move {
                match ev {
                    Ok(ChildEvent::ChildAdded { parent, child }) if parent == PathBuf::from(&path) => {
                        Some(ChildEvent::ChildAdded { parent, child })
                    }
                    Ok(ChildEvent::ChildRemoved { parent, child }) if parent == PathBuf::from(&path) => {
                        Some(ChildEvent::ChildRemoved { parent, child })
                    }
                    _ => None,
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let store = InMemoryStore::new();
        store.create("/c/a", b"hello".to_vec()).await.unwrap();
        let v = store.get("/c/a").await.unwrap();
        assert_eq!(v.data, b"hello");
        assert_eq!(v.version, 0);
    }

    #[tokio::test]
    async fn set_rejects_stale_version() {
        let store = InMemoryStore::new();
        store.create("/c/a", b"1".to_vec()).await.unwrap();
        store.set("/c/a", b"2".to_vec(), 0).await.unwrap();
        let err = store.set("/c/a", b"3".to_vec(), 0).await.unwrap_err();
        assert!(matches!(err, ConductorError::StoreVersionConflict { .. }));
    }

    #[tokio::test]
    async fn create_recursive_builds_missing_parents() {
        let store = InMemoryStore::new();
        let created = store
            .create_recursive("/c/INSTANCES/i1/MESSAGES/m1", b"x".to_vec())
            .await
            .unwrap();
        assert!(store.exists("/c/INSTANCES").await.unwrap());
        assert!(store.exists("/c/INSTANCES/i1").await.unwrap());
        assert!(store.exists("/c/INSTANCES/i1/MESSAGES").await.unwrap());
        assert!(!created.is_empty());
    }

    #[tokio::test]
    async fn get_children_lists_direct_descendants_only() {
        let store = InMemoryStore::new();
        store.create_recursive("/c/R/p1", b"a".to_vec()).await.unwrap();
        store.create_recursive("/c/R/p2", b"b".to_vec()).await.unwrap();
        let mut children = store.get_children("/c/R").await.unwrap();
        children.sort();
        assert_eq!(children, vec!["p1".to_string(), "p2".to_string()]);
    }
}
