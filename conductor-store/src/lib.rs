/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The coordination-store adapter: a typed, versioned KV
//! interface over the external hierarchical store, with an in-memory
//! reference implementation for tests and an etcd-backed implementation
//! for production use.

pub mod batch;
pub mod client;
#[cfg(feature = "etcd")]
pub mod etcd;
pub mod memory;
pub mod typed;
pub mod versioned;

pub use client::{BatchOutcome, ChildEvent, CoordinationStore, PathEvent};
#[cfg(feature = "etcd")]
pub use etcd::EtcdStore;
pub use memory::InMemoryStore;
pub use versioned::{Stat, Versioned, UNCONDITIONAL};
