/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! JSON-typed convenience wrappers over the raw-bytes
//! `CoordinationStore`. Every entity in `conductor_common::model`
//! derives `Serialize`/`Deserialize`; nothing above this module deals
//! with raw bytes directly.

use crate::client::CoordinationStore;
use crate::versioned::Versioned;
use conductor_common::error::{ConductorError, Result};
use serde::{de::DeserializeOwned, Serialize};

pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn CoordinationStore,
    path: &str,
) -> Result<Versioned<T>> {
    let raw = store.get(path).await?;
    let data: T = serde_json::from_slice(&raw.data)
        .map_err(|e| ConductorError::Other(anyhow::anyhow!("decode {path}: {e}")))?;
    Ok(Versioned::new(data, raw.version))
}

pub async fn set_typed<T: Serialize + Sync>(
    store: &dyn CoordinationStore,
    path: &str,
    value: &T,
    expected_version: i64,
) -> Result<i64> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| ConductorError::Other(anyhow::anyhow!("encode {path}: {e}")))?;
    store.set(path, bytes, expected_version).await
}

pub async fn create_typed<T: Serialize + Sync>(
    store: &dyn CoordinationStore,
    path: &str,
    value: &T,
) -> Result<i64> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| ConductorError::Other(anyhow::anyhow!("encode {path}: {e}")))?;
    store.create(path, bytes).await
}

pub async fn create_recursive_typed<T: Serialize + Sync>(
    store: &dyn CoordinationStore,
    path: &str,
    value: &T,
) -> Result<Vec<std::path::PathBuf>> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| ConductorError::Other(anyhow::anyhow!("encode {path}: {e}")))?;
    store.create_recursive(path, bytes).await
}

/// Batch-read and decode every path, skipping (not erroring on) paths
/// that do not exist.
pub async fn batch_get_typed<T: DeserializeOwned>(
    store: &dyn CoordinationStore,
    paths: &[String],
) -> Result<Vec<Option<Versioned<T>>>> {
    let raw = store.batch_get(paths).await?;
    raw.into_iter()
        .zip(paths.iter())
        .map(|(slot, path)| match slot {
            None => Ok(None),
            Some(v) => {
                let data: T = serde_json::from_slice(&v.data).map_err(|e| {
                    ConductorError::Other(anyhow::anyhow!("decode {path}: {e}"))
                })?;
                Ok(Some(Versioned::new(data, v.version)))
            }
        })
        .collect()
}
