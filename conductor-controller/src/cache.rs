/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The Cluster Data Cache. Reads a consistent snapshot of
//! cluster metadata, batching reads through the store's multi-get. If
//! any required subtree fails to load, the snapshot is marked
//! incomplete and the caller aborts the pipeline run with no side
//! effects.

use crate::snapshot::ClusterSnapshot;
use conductor_common::error::{ConductorError, Result};
use conductor_common::model::{
    ClusterConfig, CurrentState, IdealState, InstanceConfig, LiveInstance, Message,
    StateModelDefinition,
};
use conductor_common::paths;
use conductor_store::batch::batch_delete;
use conductor_store::{typed, CoordinationStore};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces immutable `ClusterSnapshot`s on demand. Holds no mutable
/// cross-refresh state beyond the cluster name itself; version-based
/// incremental refresh is left as a future optimization (every refresh
/// here is a full reload).
pub struct ClusterDataCache {
    cluster: String,
}

impl ClusterDataCache {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
        }
    }

    pub async fn refresh(&self, store: &dyn CoordinationStore) -> Result<Arc<ClusterSnapshot>> {
        let cluster = self.cluster.as_str();

        let cluster_config = self.load_cluster_config(store, cluster).await?;
        let instance_configs = self.load_instance_configs(store, cluster).await?;
        let live_instances = self.load_live_instances(store, cluster).await?;
        self.gc_stale_sessions(store, &live_instances).await;
        let ideal_states = self.load_ideal_states(store, cluster).await?;
        let state_model_defs = self.load_state_model_defs(store, cluster).await?;
        let current_states = self
            .load_current_states(store, cluster, &live_instances, &ideal_states)
            .await?;
        let pending_messages = self
            .load_pending_messages(store, cluster, &instance_configs, &live_instances)
            .await?;

        debug!(
            cluster,
            resources = ideal_states.len(),
            instances = instance_configs.len(),
            live = live_instances.len(),
            "cluster data cache refreshed"
        );

        Ok(Arc::new(ClusterSnapshot {
            cluster_config: Some(cluster_config),
            instance_configs,
            live_instances,
            ideal_states,
            state_model_defs,
            current_states,
            pending_messages,
        }))
    }

    async fn load_cluster_config(
        &self,
        store: &dyn CoordinationStore,
        cluster: &str,
    ) -> Result<ClusterConfig> {
        let path = paths::cluster_config_path(cluster);
        match typed::get_typed::<ClusterConfig>(store, &path).await {
            Ok(v) => Ok(v.data),
            Err(ConductorError::StoreNotFound(_)) => Ok(ClusterConfig::new(cluster)),
            Err(e) => {
                warn!(path, error = %e, "failed to load cluster config");
                Err(ConductorError::SnapshotIncomplete(PathBuf::from(path)))
            }
        }
    }

    async fn load_instance_configs(
        &self,
        store: &dyn CoordinationStore,
        cluster: &str,
    ) -> Result<HashMap<String, InstanceConfig>> {
        let root = paths::participant_configs_root(cluster);
        let names = self.children_or_incomplete(store, &root).await?;
        let paths: Vec<String> = names
            .iter()
            .map(|n| paths::participant_config_path(cluster, n))
            .collect();
        let values = typed::batch_get_typed::<InstanceConfig>(store, &paths)
            .await
            .map_err(|_| ConductorError::SnapshotIncomplete(PathBuf::from(root)))?;
        Ok(values
            .into_iter()
            .flatten()
            .map(|v| (v.data.instance_name.clone(), v.data))
            .collect())
    }

    async fn load_live_instances(
        &self,
        store: &dyn CoordinationStore,
        cluster: &str,
    ) -> Result<HashMap<String, LiveInstance>> {
        let root = paths::live_instances_root(cluster);
        let names = match store.get_children(&root).await {
            Ok(n) => n,
            Err(ConductorError::StoreNotFound(_)) => Vec::new(),
            Err(_) => return Err(ConductorError::SnapshotIncomplete(PathBuf::from(root))),
        };
        let paths: Vec<String> = names
            .iter()
            .map(|n| paths::live_instance_path(cluster, n))
            .collect();
        let values = typed::batch_get_typed::<LiveInstance>(store, &paths)
            .await
            .map_err(|_| ConductorError::SnapshotIncomplete(PathBuf::from(root)))?;
        Ok(values
            .into_iter()
            .flatten()
            .map(|v| (v.data.instance_name.clone(), v.data))
            .collect())
    }

    /// Deletes CurrentState records left behind under a session an
    /// instance no longer reports under, once it has moved on to a new
    /// one. Best-effort: a failed sweep is logged and otherwise ignored,
    /// since this is housekeeping rather than a snapshot-correctness
    /// concern, and the next refresh sweeps again.
    async fn gc_stale_sessions(&self, store: &dyn CoordinationStore, live_instances: &HashMap<String, LiveInstance>) {
        for live in live_instances.values() {
            let sessions_root = paths::current_states_sessions_root(&self.cluster, &live.instance_name);
            let sessions = match store.get_children(&sessions_root).await {
                Ok(s) => s,
                Err(_) => continue,
            };
            for session in sessions {
                if session == live.session_id {
                    continue;
                }
                let session_root = paths::current_states_root(&self.cluster, &live.instance_name, &session);
                let resources = match store.get_children(&session_root).await {
                    Ok(r) => r,
                    Err(_) => continue,
                };
                let mut stale_paths: Vec<String> = resources.iter().map(|r| format!("{session_root}/{r}")).collect();
                stale_paths.push(session_root);
                for (path, result) in stale_paths.iter().zip(batch_delete(store, &stale_paths).await) {
                    if let Err(e) = result {
                        warn!(path, error = %e, "failed to garbage-collect stale-session CurrentState record");
                    }
                }
            }
        }
    }

    async fn load_ideal_states(
        &self,
        store: &dyn CoordinationStore,
        cluster: &str,
    ) -> Result<HashMap<String, IdealState>> {
        let root = paths::ideal_states_root(cluster);
        let names = self.children_or_incomplete(store, &root).await?;
        let paths: Vec<String> = names
            .iter()
            .map(|n| paths::ideal_state_path(cluster, n))
            .collect();
        let values = typed::batch_get_typed::<IdealState>(store, &paths)
            .await
            .map_err(|_| ConductorError::SnapshotIncomplete(PathBuf::from(root)))?;
        Ok(values
            .into_iter()
            .flatten()
            .map(|v| (v.data.resource_name.clone(), v.data))
            .collect())
    }

    async fn load_state_model_defs(
        &self,
        store: &dyn CoordinationStore,
        cluster: &str,
    ) -> Result<HashMap<String, StateModelDefinition>> {
        let root = paths::state_model_defs_root(cluster);
        let names = self.children_or_incomplete(store, &root).await?;
        let paths: Vec<String> = names
            .iter()
            .map(|n| paths::state_model_def_path(cluster, n))
            .collect();
        let values = typed::batch_get_typed::<StateModelDefinition>(store, &paths)
            .await
            .map_err(|_| ConductorError::SnapshotIncomplete(PathBuf::from(root)))?;
        Ok(values
            .into_iter()
            .flatten()
            .map(|v| (v.data.name.clone(), v.data))
            .collect())
    }

    async fn load_current_states(
        &self,
        store: &dyn CoordinationStore,
        cluster: &str,
        live_instances: &HashMap<String, LiveInstance>,
        ideal_states: &HashMap<String, IdealState>,
    ) -> Result<HashMap<(String, String), CurrentState>> {
        let mut keyed_paths = Vec::new();
        for live in live_instances.values() {
            for resource in ideal_states.keys() {
                let path = paths::current_state_path(
                    cluster,
                    &live.instance_name,
                    &live.session_id,
                    resource,
                );
                keyed_paths.push(((live.instance_name.clone(), resource.clone()), path));
            }
        }
        let paths: Vec<String> = keyed_paths.iter().map(|(_, p)| p.clone()).collect();
        let values = typed::batch_get_typed::<CurrentState>(store, &paths)
            .await
            .map_err(|_| ConductorError::SnapshotIncomplete(PathBuf::from("CURRENTSTATES")))?;

        let mut out = HashMap::new();
        for ((key, _path), value) in keyed_paths.into_iter().zip(values.into_iter()) {
            if let Some(v) = value {
                out.insert(key, v.data);
            }
        }
        Ok(out)
    }

    async fn load_pending_messages(
        &self,
        store: &dyn CoordinationStore,
        cluster: &str,
        instance_configs: &HashMap<String, InstanceConfig>,
        live_instances: &HashMap<String, LiveInstance>,
    ) -> Result<HashMap<String, Vec<Message>>> {
        let mut out = HashMap::new();
        let mut instances: Vec<&str> = instance_configs
            .keys()
            .chain(live_instances.keys())
            .map(|s| s.as_str())
            .collect();
        instances.sort();
        instances.dedup();

        for instance in instances {
            let root = paths::messages_root(cluster, instance);
            let ids = match store.get_children(&root).await {
                Ok(ids) => ids,
                Err(ConductorError::StoreNotFound(_)) => Vec::new(),
                Err(_) => return Err(ConductorError::SnapshotIncomplete(PathBuf::from(root))),
            };
            let paths: Vec<String> = ids
                .iter()
                .map(|id| paths::message_path(cluster, instance, id))
                .collect();
            let values = typed::batch_get_typed::<Message>(store, &paths)
                .await
                .map_err(|_| ConductorError::SnapshotIncomplete(PathBuf::from(root)))?;
            let messages: Vec<Message> = values.into_iter().flatten().map(|v| v.data).collect();
            if !messages.is_empty() {
                out.insert(instance.to_string(), messages);
            }
        }
        Ok(out)
    }

    async fn children_or_incomplete(
        &self,
        store: &dyn CoordinationStore,
        root: &str,
    ) -> Result<Vec<String>> {
        match store.get_children(root).await {
            Ok(names) => Ok(names),
            Err(ConductorError::StoreNotFound(_)) => Ok(Vec::new()),
            Err(e) => {
                warn!(root, error = %e, "required subtree failed to load");
                Err(ConductorError::SnapshotIncomplete(PathBuf::from(root)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_store::memory::InMemoryStore;
    use conductor_store::typed::create_recursive_typed;

    #[tokio::test]
    async fn refresh_gcs_current_states_from_a_stale_session_but_keeps_the_live_one() {
        let store = InMemoryStore::new();
        create_recursive_typed(
            &store,
            &paths::live_instance_path("c1", "i1"),
            &LiveInstance::new("i1", "s2"),
        )
        .await
        .unwrap();
        create_recursive_typed(
            &store,
            &paths::current_state_path("c1", "i1", "s1", "R"),
            &CurrentState::new("i1", "s1", "R", "OnlineOffline-with-Master"),
        )
        .await
        .unwrap();
        create_recursive_typed(
            &store,
            &paths::current_state_path("c1", "i1", "s2", "R"),
            &CurrentState::new("i1", "s2", "R", "OnlineOffline-with-Master"),
        )
        .await
        .unwrap();

        let cache = ClusterDataCache::new("c1");
        cache.refresh(&store).await.unwrap();

        assert!(!store.exists(&paths::current_state_path("c1", "i1", "s1", "R")).await.unwrap());
        assert!(store.exists(&paths::current_state_path("c1", "i1", "s2", "R")).await.unwrap());
    }
}
