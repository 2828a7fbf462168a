/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The etcd-backed `CoordinationStore`, built against the full
//! `CoordinationStore` adapter contract. etcd's `mod_revision` plays the
//! role a ZooKeeper node version would: it only ever increases, so
//! comparing against it in a transaction gives the same
//! optimistic-write guarantee.

use crate::client::{ChildEvent, CoordinationStore, PathEvent};
use crate::versioned::{Stat, Versioned};
use async_trait::async_trait;
use conductor_common::error::{ConductorError, Result};
use etcd_client::{
    Client, Compare, CompareOp, EventType, GetOptions, Txn, TxnOp, WatchOptions,
};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::path::PathBuf;

pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    pub async fn connect(endpoints: &[String]) -> Result<Self> {
        let client = Client::connect(endpoints, None)
            .await
            .map_err(|e| ConductorError::StoreTransient {
                path: PathBuf::from("/"),
                source: anyhow::anyhow!(e),
            })?;
        Ok(Self { client })
    }

    fn transient(path: &str, source: etcd_client::Error) -> ConductorError {
        ConductorError::StoreTransient {
            path: PathBuf::from(path),
            source: anyhow::anyhow!(source),
        }
    }
}

#[async_trait]
impl CoordinationStore for EtcdStore {
    async fn get(&self, path: &str) -> Result<Versioned<Vec<u8>>> {
        let mut client = self.client.clone();
        let resp = client
            .get(path, None)
            .await
            .map_err(|e| Self::transient(path, e))?;
        match resp.kvs().first() {
            Some(kv) => Ok(Versioned::new(kv.value().to_vec(), kv.mod_revision())),
            None => Err(ConductorError::StoreNotFound(PathBuf::from(path))),
        }
    }

    async fn set(&self, path: &str, data: Vec<u8>, expected_version: i64) -> Result<i64> {
        let mut client = self.client.clone();
        if expected_version == -1 {
            let resp = client
                .put(path, data, None)
                .await
                .map_err(|e| Self::transient(path, e))?;
            return Ok(resp.header().map(|h| h.revision()).unwrap_or(0));
        }

        let txn = Txn::new()
            .when(vec![Compare::mod_revision(
                path,
                CompareOp::Equal,
                expected_version,
            )])
            .and_then(vec![TxnOp::put(path, data, None)])
            .or_else(vec![TxnOp::get(path, None)]);
        let resp = client.txn(txn).await.map_err(|e| Self::transient(path, e))?;
        if resp.succeeded() {
            return Ok(resp.header().map(|h| h.revision()).unwrap_or(0));
        }
        let actual = read_actual_revision(&resp).unwrap_or(-1);
        Err(ConductorError::StoreVersionConflict {
            path: PathBuf::from(path),
            expected: expected_version,
            actual,
        })
    }

    async fn create(&self, path: &str, data: Vec<u8>) -> Result<i64> {
        let mut client = self.client.clone();
        let txn = Txn::new()
            .when(vec![Compare::create_revision(path, CompareOp::Equal, 0)])
            .and_then(vec![TxnOp::put(path, data, None)])
            .or_else(vec![TxnOp::get(path, None)]);
        let resp = client.txn(txn).await.map_err(|e| Self::transient(path, e))?;
        if resp.succeeded() {
            return Ok(resp.header().map(|h| h.revision()).unwrap_or(0));
        }
        let actual = read_actual_revision(&resp).unwrap_or(-1);
        Err(ConductorError::StoreVersionConflict {
            path: PathBuf::from(path),
            expected: -1,
            actual,
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut client = self.client.clone();
        let resp = client
            .delete(path, None)
            .await
            .map_err(|e| Self::transient(path, e))?;
        if resp.deleted() == 0 {
            return Err(ConductorError::StoreNotFound(PathBuf::from(path)));
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let mut client = self.client.clone();
        let resp = client
            .get(path, Some(GetOptions::new().with_count_only()))
            .await
            .map_err(|e| Self::transient(path, e))?;
        Ok(resp.count() > 0)
    }

    async fn get_stat(&self, path: &str) -> Result<Stat> {
        let versioned = self.get(path).await?;
        let num_children = self.get_children(path).await?.len() as u64;
        Ok(Stat {
            version: versioned.version,
            num_children,
        })
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>> {
        let mut client = self.client.clone();
        let prefix = format!("{path}/");
        let resp = client
            .get(prefix.as_str(), Some(GetOptions::new().with_prefix()))
            .await
            .map_err(|e| Self::transient(path, e))?;
        let mut children: Vec<String> = resp
            .kvs()
            .iter()
            .filter_map(|kv| {
                let key = kv.key_str().ok()?;
                let rest = key.strip_prefix(&prefix)?;
                if rest.contains('/') {
                    None
                } else {
                    Some(rest.to_string())
                }
            })
            .collect();
        children.sort();
        children.dedup();
        Ok(children)
    }

    async fn watch_path(&self, path: &str) -> Result<BoxStream<'static, PathEvent>> {
        let mut client = self.client.clone();
        let (_watcher, stream) = client
            .watch(path, None)
            .await
            .map_err(|e| Self::transient(path, e))?;
        let owned_path = PathBuf::from(path);
        let mapped = stream.filter_map(move |resp| {
            let owned_path = owned_path.clone();
            async move {
                let resp = resp.ok()?;
                let event = resp.events().first()?;
                let kv = event.kv()?;
                match event.event_type() {
                    EventType::Put => Some(PathEvent::DataChanged {
                        path: owned_path,
                        version: kv.mod_revision(),
                    }),
                    EventType::Delete => Some(PathEvent::Deleted { path: owned_path }),
                }
            }
        });
        Ok(Box::pin(mapped))
    }

    async fn watch_children(&self, path: &str) -> Result<BoxStream<'static, ChildEvent>> {
        let mut client = self.client.clone();
        let prefix = format!("{path}/");
        let (_watcher, stream) = client
            .watch(
                prefix.clone().as_str(),
                Some(WatchOptions::new().with_prefix()),
            )
            .await
            .map_err(|e| Self::transient(path, e))?;
        let parent = PathBuf::from(path);
        let mapped = stream.filter_map(move |resp| {
            let parent = parent.clone();
            let prefix = prefix.clone();
            async move {
                let resp = resp.ok()?;
                let event = resp.events().first()?;
                let kv = event.kv()?;
                let key = kv.key_str().ok()?;
                let child = key.strip_prefix(&prefix)?.split('/').next()?.to_string();
                match event.event_type() {
                    EventType::Put => Some(ChildEvent::ChildAdded { parent, child }),
                    EventType::Delete => Some(ChildEvent::ChildRemoved { parent, child }),
                }
            }
        });
        Ok(Box::pin(mapped))
    }
}

fn read_actual_revision(resp: &etcd_client::TxnResponse) -> Option<i64> {
    use etcd_client::TxnOpResponse;
    resp.op_responses().into_iter().find_map(|op| match op {
        TxnOpResponse::Get(get_resp) => get_resp.kvs().first().map(|kv| kv.mod_revision()),
        _ => None,
    })
}
