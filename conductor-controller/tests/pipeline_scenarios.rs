/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! End-to-end pipeline scenarios driven entirely through the public
//! admin/pipeline surface against an in-memory store, simulating the
//! participant side by hand between runs.

use conductor_common::model::{
    CurrentState, ExternalView, IdealState, LiveInstance, Message, RebalanceMode, ThrottleConfig, ThrottleScope,
};
use conductor_common::paths;
use conductor_controller::monitor::NoopMonitor;
use conductor_controller::pipeline::PipelineDriver;
use conductor_controller::rebalance::RebalancerRegistry;
use conductor_controller::admin;
use conductor_store::client::CoordinationStore;
use conductor_store::memory::InMemoryStore;
use conductor_store::typed::{create_recursive_typed, get_typed, set_typed};
use std::sync::Arc;
use tokio::sync::watch;

async fn live_instance(store: &dyn CoordinationStore, cluster: &str, name: &str, session: &str) {
    admin::set_instance_enabled(store, cluster, name, true, None).await.unwrap();
    create_recursive_typed(store, &paths::live_instance_path(cluster, name), &LiveInstance::new(name, session))
        .await
        .unwrap();
}

async fn remove_live_instance(store: &dyn CoordinationStore, cluster: &str, name: &str) {
    store.delete(&paths::live_instance_path(cluster, name)).await.ok();
}

/// Writes a `CurrentState` on behalf of a participant, as if its
/// executor had just completed a transition.
async fn report_current_state(
    store: &dyn CoordinationStore,
    cluster: &str,
    instance: &str,
    session: &str,
    resource: &str,
    state_model: &str,
    partition_states: &[(&str, &str)],
) {
    let path = paths::current_state_path(cluster, instance, session, resource);
    let mut cs = CurrentState::new(instance, session, resource, state_model);
    for (partition, state) in partition_states {
        cs.partition_state.insert(partition.to_string(), state.to_string());
    }
    match get_typed::<CurrentState>(store, &path).await {
        Ok(existing) => {
            set_typed(store, &path, &cs, existing.version).await.unwrap();
        }
        Err(_) => {
            create_recursive_typed(store, &path, &cs).await.unwrap();
        }
    }
}

async fn messages_for(store: &dyn CoordinationStore, cluster: &str, instance: &str) -> Vec<Message> {
    let root = paths::messages_root(cluster, instance);
    let ids = match store.get_children(&root).await {
        Ok(ids) => ids,
        Err(_) => return Vec::new(),
    };
    let mut out = Vec::new();
    for id in ids {
        let path = paths::message_path(cluster, instance, &id);
        if let Ok(v) = get_typed::<Message>(store, &path).await {
            out.push(v.data);
        }
    }
    out
}

async fn setup_three_instance_master_slave(store: &dyn CoordinationStore, cluster: &str) {
    admin::create_cluster(store, cluster, None).await.unwrap();
    for name in ["i1", "i2", "i3"] {
        live_instance(store, cluster, name, "s1").await;
    }
    let mut ideal_state = IdealState::new("R", "OnlineOffline-with-Master");
    ideal_state.num_partitions = 1;
    ideal_state.replica_count = 3;
    ideal_state.rebalance_mode = RebalanceMode::SemiAuto;
    ideal_state.preference_lists.insert("R_0".to_string(), vec!["i1".into(), "i2".into(), "i3".into()]);
    let model = conductor_statemodel::builtin::online_offline_with_master();
    admin::add_resource(store, cluster, &ideal_state, &model, None).await.unwrap();
}

fn driver(cluster: &str, store: Arc<dyn CoordinationStore>) -> PipelineDriver {
    PipelineDriver::new(cluster, store, RebalancerRegistry::new(), Arc::new(NoopMonitor))
}

#[tokio::test]
async fn s1_single_partition_master_election() {
    let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
    setup_three_instance_master_slave(store.as_ref(), "c1").await;
    let (_tx, rx) = watch::channel(false);
    let d = driver("c1", Arc::clone(&store));

    let report = d.run_once(1_000, &rx).await.unwrap();
    assert_eq!(report.messages_created, 3);
    for name in ["i1", "i2", "i3"] {
        let messages = messages_for(store.as_ref(), "c1", name).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from_state, "OFFLINE");
        assert_eq!(messages[0].to_state, "SLAVE");
    }

    for name in ["i1", "i2", "i3"] {
        report_current_state(store.as_ref(), "c1", name, "s1", "R", "OnlineOffline-with-Master", &[("R_0", "SLAVE")]).await;
        for m in messages_for(store.as_ref(), "c1", name).await {
            store.delete(&paths::message_path("c1", name, &m.msg_id)).await.unwrap();
        }
    }

    let report = d.run_once(2_000, &rx).await.unwrap();
    assert_eq!(report.messages_created, 1);
    let i1_messages = messages_for(store.as_ref(), "c1", "i1").await;
    assert_eq!(i1_messages.len(), 1);
    assert_eq!(i1_messages[0].from_state, "SLAVE");
    assert_eq!(i1_messages[0].to_state, "MASTER");
    assert!(messages_for(store.as_ref(), "c1", "i2").await.is_empty());
    assert!(messages_for(store.as_ref(), "c1", "i3").await.is_empty());
}

#[tokio::test]
async fn s2_master_failover_promotes_next_in_preference_order() {
    let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
    setup_three_instance_master_slave(store.as_ref(), "c1").await;

    report_current_state(store.as_ref(), "c1", "i1", "s1", "R", "OnlineOffline-with-Master", &[("R_0", "MASTER")]).await;
    report_current_state(store.as_ref(), "c1", "i2", "s1", "R", "OnlineOffline-with-Master", &[("R_0", "SLAVE")]).await;
    report_current_state(store.as_ref(), "c1", "i3", "s1", "R", "OnlineOffline-with-Master", &[("R_0", "SLAVE")]).await;

    remove_live_instance(store.as_ref(), "c1", "i1").await;

    let (_tx, rx) = watch::channel(false);
    let d = driver("c1", Arc::clone(&store));
    let report = d.run_once(1_000, &rx).await.unwrap();
    assert_eq!(report.messages_created, 1);

    let i2_messages = messages_for(store.as_ref(), "c1", "i2").await;
    assert_eq!(i2_messages.len(), 1);
    assert_eq!(i2_messages[0].from_state, "SLAVE");
    assert_eq!(i2_messages[0].to_state, "MASTER");
    assert!(messages_for(store.as_ref(), "c1", "i3").await.is_empty());
}

#[tokio::test]
async fn s3_per_instance_throttle_caps_concurrent_transitions() {
    let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
    admin::create_cluster(store.as_ref(), "c1", None).await.unwrap();
    live_instance(store.as_ref(), "c1", "i1", "s1").await;

    let mut ideal_state = IdealState::new("R", "OnlineOffline-with-Master");
    ideal_state.num_partitions = 10;
    ideal_state.replica_count = 1;
    ideal_state.rebalance_mode = RebalanceMode::SemiAuto;
    for partition in ideal_state.partition_names() {
        ideal_state.preference_lists.insert(partition, vec!["i1".to_string()]);
    }
    let model = conductor_statemodel::builtin::online_offline_with_master();
    admin::add_resource(store.as_ref(), "c1", &ideal_state, &model, None).await.unwrap();

    let cluster_config_path = paths::cluster_config_path("c1");
    let mut cluster_config = get_typed::<conductor_common::model::ClusterConfig>(store.as_ref(), &cluster_config_path)
        .await
        .unwrap();
    cluster_config
        .data
        .throttles
        .insert("i1".to_string(), vec![ThrottleConfig { max_concurrent_transitions: 2, scope: ThrottleScope::Any }]);
    set_typed(store.as_ref(), &cluster_config_path, &cluster_config.data, cluster_config.version)
        .await
        .unwrap();

    let (_tx, rx) = watch::channel(false);
    let d = driver("c1", Arc::clone(&store));
    let report = d.run_once(1_000, &rx).await.unwrap();
    assert_eq!(report.messages_created, 2);
    assert_eq!(messages_for(store.as_ref(), "c1", "i1").await.len(), 2);
}

#[tokio::test]
async fn s4_unknown_state_is_treated_as_needing_recovery_with_no_shortest_path() {
    let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
    setup_three_instance_master_slave(store.as_ref(), "c1").await;

    report_current_state(store.as_ref(), "c1", "i1", "s1", "R", "OnlineOffline-with-Master", &[("R_0", "OFFLINE")]).await;
    // i2 reports a state the model doesn't know about.
    report_current_state(store.as_ref(), "c1", "i2", "s1", "R", "OnlineOffline-with-Master", &[("R_0", "BOGUS")]).await;
    report_current_state(store.as_ref(), "c1", "i3", "s1", "R", "OnlineOffline-with-Master", &[("R_0", "OFFLINE")]).await;

    let (_tx, rx) = watch::channel(false);
    let d = driver("c1", Arc::clone(&store));
    let report = d.run_once(1_000, &rx).await.unwrap();

    // i1 and i3 still get their normal OFFLINE->SLAVE transition.
    assert_eq!(messages_for(store.as_ref(), "c1", "i1").await.len(), 1);
    assert_eq!(messages_for(store.as_ref(), "c1", "i3").await.len(), 1);
    // i2 has no legal path out of an unrecognized state, so no message is
    // generated for it, but the pipeline run as a whole still succeeds.
    assert!(messages_for(store.as_ref(), "c1", "i2").await.is_empty());
    assert_eq!(report.messages_created, 2);
}

#[tokio::test]
async fn s6_delayed_rebalance_grace_period() {
    let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
    admin::create_cluster(store.as_ref(), "c1", None).await.unwrap();

    let cluster_config_path = paths::cluster_config_path("c1");
    let mut cluster_config = get_typed::<conductor_common::model::ClusterConfig>(store.as_ref(), &cluster_config_path)
        .await
        .unwrap();
    cluster_config.data.delay_rebalance_time_ms = 30_000;
    set_typed(store.as_ref(), &cluster_config_path, &cluster_config.data, cluster_config.version)
        .await
        .unwrap();

    // A fourth instance (i4) sits outside the replica count while i1-i3
    // hold the three replicas, so it's the one a permanent loss of i3
    // promotes into service.
    for name in ["i1", "i2", "i3", "i4"] {
        live_instance(store.as_ref(), "c1", name, "s1").await;
    }
    let mut ideal_state = IdealState::new("R", "OnlineOffline-with-Master");
    ideal_state.num_partitions = 1;
    ideal_state.replica_count = 3;
    ideal_state.rebalance_mode = RebalanceMode::SemiAuto;
    ideal_state
        .preference_lists
        .insert("R_0".to_string(), vec!["i1".into(), "i2".into(), "i3".into(), "i4".into()]);
    let model = conductor_statemodel::builtin::online_offline_with_master();
    admin::add_resource(store.as_ref(), "c1", &ideal_state, &model, None).await.unwrap();

    for name in ["i2", "i3"] {
        report_current_state(store.as_ref(), "c1", name, "s1", "R", "OnlineOffline-with-Master", &[("R_0", "SLAVE")]).await;
    }
    report_current_state(store.as_ref(), "c1", "i1", "s1", "R", "OnlineOffline-with-Master", &[("R_0", "MASTER")]).await;

    let d = driver("c1", Arc::clone(&store));
    let (_tx, rx) = watch::channel(false);
    // Establish a baseline run at t=0 so the tracker has no stale offline
    // bookkeeping from before i3 ever went live.
    d.run_once(0, &rx).await.unwrap();
    for name in ["i1", "i2", "i3", "i4"] {
        for m in messages_for(store.as_ref(), "c1", name).await {
            store.delete(&paths::message_path("c1", name, &m.msg_id)).await.unwrap();
        }
    }

    remove_live_instance(store.as_ref(), "c1", "i3").await;

    // Within the grace period: i3 is still treated as live, so it keeps
    // its replica slot and i4 is not promoted.
    d.run_once(10_000, &rx).await.unwrap();
    assert!(messages_for(store.as_ref(), "c1", "i1").await.is_empty());
    assert!(messages_for(store.as_ref(), "c1", "i2").await.is_empty());
    assert!(messages_for(store.as_ref(), "c1", "i4").await.is_empty());

    // Past the grace period: i3 is genuinely gone, so i4 is promoted into
    // its replica slot.
    let report = d.run_once(31_000, &rx).await.unwrap();
    assert_eq!(report.messages_created, 1);
    let i4_messages = messages_for(store.as_ref(), "c1", "i4").await;
    assert_eq!(i4_messages.len(), 1);
    assert_eq!(i4_messages[0].to_state, "SLAVE");
}

#[tokio::test]
async fn external_view_reflects_only_observed_partitions() {
    let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryStore::new());
    setup_three_instance_master_slave(store.as_ref(), "c1").await;
    report_current_state(store.as_ref(), "c1", "i1", "s1", "R", "OnlineOffline-with-Master", &[("R_0", "SLAVE")]).await;

    let (_tx, rx) = watch::channel(false);
    let d = driver("c1", Arc::clone(&store));
    d.run_once(1_000, &rx).await.unwrap();

    let view = get_typed::<ExternalView>(store.as_ref(), &paths::external_view_path("c1", "R")).await.unwrap();
    assert_eq!(view.data.partition_instance_state.get("R_0").and_then(|m| m.get("i1")), Some(&"SLAVE".to_string()));
}
