/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Canonical coordination-store paths. Centralizing path
//! construction here keeps the cache, dispatcher, and executor from
//! drifting apart on layout.

/// `/{cluster}`
pub fn cluster_root(cluster: &str) -> String {
    format!("/{cluster}")
}

pub fn cluster_config_path(cluster: &str) -> String {
    format!("{}/CONFIGS/CLUSTER/{}", cluster_root(cluster), cluster)
}

pub fn participant_config_path(cluster: &str, instance: &str) -> String {
    format!("{}/CONFIGS/PARTICIPANT/{}", cluster_root(cluster), instance)
}

pub fn resource_config_path(cluster: &str, resource: &str) -> String {
    format!("{}/CONFIGS/RESOURCE/{}", cluster_root(cluster), resource)
}

pub fn resource_configs_root(cluster: &str) -> String {
    format!("{}/CONFIGS/RESOURCE", cluster_root(cluster))
}

pub fn participant_configs_root(cluster: &str) -> String {
    format!("{}/CONFIGS/PARTICIPANT", cluster_root(cluster))
}

pub fn live_instance_path(cluster: &str, instance: &str) -> String {
    format!("{}/LIVEINSTANCES/{}", cluster_root(cluster), instance)
}

pub fn live_instances_root(cluster: &str) -> String {
    format!("{}/LIVEINSTANCES", cluster_root(cluster))
}

pub fn ideal_state_path(cluster: &str, resource: &str) -> String {
    format!("{}/IDEALSTATES/{}", cluster_root(cluster), resource)
}

pub fn ideal_states_root(cluster: &str) -> String {
    format!("{}/IDEALSTATES", cluster_root(cluster))
}

pub fn current_state_path(cluster: &str, instance: &str, session: &str, resource: &str) -> String {
    format!(
        "{}/INSTANCES/{}/CURRENTSTATES/{}/{}",
        cluster_root(cluster),
        instance,
        session,
        resource
    )
}

pub fn current_states_root(cluster: &str, instance: &str, session: &str) -> String {
    format!(
        "{}/INSTANCES/{}/CURRENTSTATES/{}",
        cluster_root(cluster),
        instance,
        session
    )
}

/// `/{cluster}/INSTANCES/{instance}/CURRENTSTATES`: parent of every
/// session this instance has ever reported under, current or stale.
pub fn current_states_sessions_root(cluster: &str, instance: &str) -> String {
    format!("{}/INSTANCES/{}/CURRENTSTATES", cluster_root(cluster), instance)
}

pub fn instances_root(cluster: &str) -> String {
    format!("{}/INSTANCES", cluster_root(cluster))
}

pub fn message_path(cluster: &str, instance: &str, msg_id: &str) -> String {
    format!(
        "{}/INSTANCES/{}/MESSAGES/{}",
        cluster_root(cluster),
        instance,
        msg_id
    )
}

pub fn messages_root(cluster: &str, instance: &str) -> String {
    format!("{}/INSTANCES/{}/MESSAGES", cluster_root(cluster), instance)
}

pub fn external_view_path(cluster: &str, resource: &str) -> String {
    format!("{}/EXTERNALVIEW/{}", cluster_root(cluster), resource)
}

pub fn state_model_def_path(cluster: &str, name: &str) -> String {
    format!("{}/STATEMODELDEFS/{}", cluster_root(cluster), name)
}

pub fn state_model_defs_root(cluster: &str) -> String {
    format!("{}/STATEMODELDEFS", cluster_root(cluster))
}

pub fn controller_leader_path(cluster: &str) -> String {
    format!("{}/CONTROLLER/LEADER", cluster_root(cluster))
}
