/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Error kinds used across the controller pipeline and the participant
//! executor. These are distinct from the underlying transport/storage
//! exception types per the error handling design: each kind maps to a
//! specific propagation rule (local retry, stage abort, or partition
//! quarantine).

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ConductorError>;

#[derive(thiserror::Error, Debug)]
pub enum ConductorError {
    /// Connection loss or timeout talking to the coordination store.
    /// Retried at the store-adapter level; surfaced only once retries
    /// are exhausted.
    #[error("store transient error on {path}: {source}")]
    StoreTransient {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// An optimistic write lost a version race. `update()` retries this
    /// transparently; it is surfaced only when its retry budget runs out.
    #[error("version conflict on {path}: expected {expected}, found {actual}")]
    StoreVersionConflict {
        path: PathBuf,
        expected: i64,
        actual: i64,
    },

    /// The path does not exist. Interpreted as "needs create" where that
    /// is semantically valid (see `CoordinationStore::update`), otherwise
    /// propagated as-is.
    #[error("no such path: {0}")]
    StoreNotFound(PathBuf),

    /// One or more required subtrees failed to load during a cache
    /// refresh. The pipeline run that triggered the refresh aborts with
    /// no side effects.
    #[error("snapshot incomplete: missing {0}")]
    SnapshotIncomplete(PathBuf),

    /// A state-model transition method threw. The affected partition is
    /// marked ERROR in CurrentState; the message is deleted regardless.
    #[error("handler for ({resource}, {partition}) failed transition {from} -> {to}: {source}")]
    HandlerException {
        resource: String,
        partition: String,
        from: String,
        to: String,
        #[source]
        source: anyhow::Error,
    },

    /// A handler did not return within its timeout plus grace period.
    #[error("handler for ({resource}, {partition}) timed out transitioning {from} -> {to}")]
    HandlerTimeout {
        resource: String,
        partition: String,
        from: String,
        to: String,
    },

    /// A computed transition is not an edge in the state model's
    /// transition table. Fatal assertion: the pipeline aborts and no
    /// messages are dispatched for the offending run.
    #[error("state model '{state_model}' has no transition {from} -> {to}")]
    StateModelViolation {
        state_model: String,
        from: String,
        to: String,
    },

    /// A cluster, resource, or instance configuration failed validation.
    /// Reported to the admin surface; the affected resource is skipped.
    #[error("invalid config for {subject}: {reason}")]
    ConfigInvalid { subject: String, reason: String },

    /// Catch-all for boundary glue (config loading, serialization, etc.)
    /// that does not warrant its own variant.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConductorError {
    /// Whether this error is eligible for the store adapter's bounded
    /// local retry: only `StoreVersionConflict` and `StoreTransient`
    /// qualify.
    pub fn is_locally_retryable(&self) -> bool {
        matches!(
            self,
            ConductorError::StoreTransient { .. } | ConductorError::StoreVersionConflict { .. }
        )
    }
}
