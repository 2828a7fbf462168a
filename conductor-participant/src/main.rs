/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! `conductor-agentd`: registers this process as a live instance and
//! runs its inbound message loop against a live coordination store.

use clap::Parser;
use conductor_common::config;
use conductor_common::paths;
use conductor_participant::executor::Executor;
use conductor_participant::factory::HandlerRegistryBuilder;
use conductor_store::typed::create_recursive_typed;
use conductor_store::EtcdStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const KNOWN_STATE_MODELS: &[&str] = &["OnlineOffline-with-Master", "LeaderStandby", "OnlineOffline"];

#[derive(Parser, Debug)]
#[command(name = "conductor-agentd", about = "Cluster management participant agent")]
struct Args {
    /// This participant's instance name, registered under INSTANCES/{name}.
    #[arg(long)]
    instance: String,

    /// Overrides the cluster name from the process settings file.
    #[arg(long)]
    cluster: Option<String>,

    /// Overrides the etcd endpoint from the process settings file.
    #[arg(long)]
    store_endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let settings = config::get_settings();
    let cluster = args.cluster.unwrap_or_else(|| settings.cluster_name.clone());
    let endpoint = args.store_endpoint.unwrap_or_else(|| settings.store.endpoint.clone());

    let store: Arc<dyn conductor_store::CoordinationStore> = Arc::new(EtcdStore::connect(&[endpoint]).await?);

    let session_id = Uuid::new_v4().to_string();
    let live_instance = conductor_common::model::LiveInstance::new(args.instance.clone(), session_id.clone());
    create_recursive_typed(store.as_ref(), &paths::live_instance_path(&cluster, &args.instance), &live_instance).await?;
    tracing::info!(instance = %args.instance, session = %session_id, "registered live instance");

    let factories = HandlerRegistryBuilder::new().build(KNOWN_STATE_MODELS);
    let executor = Arc::new(Executor::new(
        Arc::clone(&store),
        cluster,
        args.instance,
        session_id,
        factories,
        settings.worker_pool_size,
    ));

    let poll_interval = Duration::from_millis(settings.poll_interval_ms);
    loop {
        if let Err(e) = executor.poll_once().await {
            tracing::error!(error = %e, "message poll failed");
        }
        tokio::time::sleep(poll_interval).await;
    }
}
