/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Administrative operations expressed as store writes and exposed as
//! plain library functions rather than a REST/CLI surface: creating a
//! cluster materializes the path skeleton, adding a resource writes
//! IdealState and registers its state model if absent, and
//! enabling/disabling an instance toggles a flag in InstanceConfig.

use crate::pipeline::PipelineTrigger;
use conductor_common::error::{ConductorError, Result};
use conductor_common::model::{ClusterConfig, IdealState, InstanceConfig, StateModelDefinition};
use conductor_common::paths;
use conductor_store::client::CoordinationStore;
use conductor_store::typed::{create_recursive_typed, get_typed, set_typed};

/// Materializes `CONFIGS/CLUSTER/{cluster}` and the empty container
/// paths (`CONFIGS/PARTICIPANT`, `CONFIGS/RESOURCE`, `LIVEINSTANCES`,
/// `IDEALSTATES`, `STATEMODELDEFS`, `INSTANCES`) a fresh cluster needs.
/// Fails if the cluster config already exists. `trigger`, when given,
/// requests a pipeline run once the cluster skeleton is in place.
pub async fn create_cluster(store: &dyn CoordinationStore, cluster: &str, trigger: Option<&PipelineTrigger>) -> Result<()> {
    let config = ClusterConfig::new(cluster);
    create_recursive_typed(store, &paths::cluster_config_path(cluster), &config).await?;
    for root in [
        paths::participant_configs_root(cluster),
        paths::resource_configs_root(cluster),
        paths::live_instances_root(cluster),
        paths::ideal_states_root(cluster),
        paths::state_model_defs_root(cluster),
        paths::instances_root(cluster),
    ] {
        match store.create_recursive(&root, Vec::new()).await {
            Ok(_) => {}
            Err(ConductorError::StoreNotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    if let Some(trigger) = trigger {
        trigger.fire();
    }
    Ok(())
}

/// Writes `IDEALSTATES/{resource}` and registers `state_model` under
/// `STATEMODELDEFS/{state_model.name}` if no definition by that name
/// exists yet. The ideal state itself is always overwritten with the
/// caller's version. `trigger`, when given, requests a pipeline run so
/// the new or changed resource is picked up without waiting on the poll
/// timer.
pub async fn add_resource(
    store: &dyn CoordinationStore,
    cluster: &str,
    ideal_state: &IdealState,
    state_model: &StateModelDefinition,
    trigger: Option<&PipelineTrigger>,
) -> Result<()> {
    let model_path = paths::state_model_def_path(cluster, &state_model.name);
    if !store.exists(&model_path).await? {
        match create_recursive_typed(store, &model_path, state_model).await {
            Ok(_) => {}
            Err(ConductorError::StoreVersionConflict { .. }) => {
                // Raced with another writer registering the same model; fine either way.
            }
            Err(e) => return Err(e),
        }
    }

    let is_path = paths::ideal_state_path(cluster, &ideal_state.resource_name);
    match get_typed::<IdealState>(store, &is_path).await {
        Ok(existing) => {
            set_typed(store, &is_path, ideal_state, existing.version).await?;
        }
        Err(_) => {
            create_recursive_typed(store, &is_path, ideal_state).await?;
        }
    }
    if let Some(trigger) = trigger {
        trigger.fire();
    }
    Ok(())
}

/// Flips `InstanceConfig.enabled` for a participant, creating the
/// config with the flag already set if the instance isn't registered
/// yet (e.g. enabling ahead of the participant's first liveness report).
/// Per the enable/disable contract, a successful flip always requests a
/// pipeline run when `trigger` is given, rather than waiting on the poll
/// timer or on a store change-notification that a plain `set` on an
/// existing key never emits.
pub async fn set_instance_enabled(
    store: &dyn CoordinationStore,
    cluster: &str,
    instance: &str,
    enabled: bool,
    trigger: Option<&PipelineTrigger>,
) -> Result<()> {
    let path = paths::participant_config_path(cluster, instance);
    match get_typed::<InstanceConfig>(store, &path).await {
        Ok(mut existing) => {
            existing.data.enabled = enabled;
            set_typed(store, &path, &existing.data, existing.version).await?;
        }
        Err(_) => {
            let mut config = InstanceConfig::new(instance);
            config.enabled = enabled;
            create_recursive_typed(store, &path, &config).await?;
        }
    }
    if let Some(trigger) = trigger {
        trigger.fire();
    }
    Ok(())
}
