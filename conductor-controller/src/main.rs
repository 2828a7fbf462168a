/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! `conductord`: runs the pipeline loop for one cluster against a
//! live coordination store.

use clap::Parser;
use conductor_common::config;
use conductor_controller::monitor::TracingMonitor;
use conductor_controller::pipeline::PipelineDriver;
use conductor_controller::rebalance::RebalancerRegistry;
use conductor_store::EtcdStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "conductord", about = "Cluster management controller")]
struct Args {
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

    let store: Arc<dyn conductor_store::CoordinationStore> =
        Arc::new(EtcdStore::connect(&[endpoint]).await?);
    let driver = Arc::new(PipelineDriver::new(
        cluster,
        store,
        RebalancerRegistry::new(),
        Arc::new(TracingMonitor),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poll_interval = Duration::from_millis(settings.poll_interval_ms);

    driver.spawn_watchers();
    let run_handle = tokio::spawn(driver.run_forever(poll_interval, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    shutdown_tx.send(true).ok();
    run_handle.await?;

    Ok(())
}
