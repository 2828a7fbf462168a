/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Process-level settings for the `conductord` and `conductor-agentd`
//! binaries: a YAML config file with a hardcoded fallback, lazily
//! parsed once into a process-wide singleton.

use crate::error::{ConductorError, Result};
use serde::Deserialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessSettings {
    pub cluster_name: String,
    pub store: StoreSettings,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_endpoint")]
    pub endpoint: String,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_worker_pool_size() -> usize {
    16
}

fn default_store_endpoint() -> String {
    "127.0.0.1:2379".to_string()
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            cluster_name: "default-cluster".to_string(),
            store: StoreSettings {
                endpoint: default_store_endpoint(),
            },
            poll_interval_ms: default_poll_interval_ms(),
            worker_pool_size: default_worker_pool_size(),
        }
    }
}

static SETTINGS: OnceLock<ProcessSettings> = OnceLock::new();

fn parse_settings(path: &str) -> Result<ProcessSettings> {
    let built = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .build()
        .map_err(|e| ConductorError::ConfigInvalid {
            subject: path.to_string(),
            reason: e.to_string(),
        })?;

    match built.try_deserialize::<ProcessSettings>() {
        Ok(settings) => Ok(settings),
        Err(_) => Ok(ProcessSettings::default()),
    }
}

/// Load (or retrieve the already-loaded) process settings from
/// `/etc/conductor/settings.yaml`, falling back to defaults when the
/// file is absent or incomplete.
pub fn get_settings() -> &'static ProcessSettings {
    SETTINGS.get_or_init(|| {
        parse_settings("/etc/conductor/settings.yaml").unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_defaults_when_file_missing() {
        let settings = parse_settings("/nonexistent/conductor-settings").unwrap();
        assert_eq!(settings.cluster_name, "default-cluster");
        assert_eq!(settings.store.endpoint, "127.0.0.1:2379");
        assert_eq!(settings.poll_interval_ms, 5_000);
    }
}
