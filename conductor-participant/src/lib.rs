/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The participant half of the cluster-management system: the keyed
//! dispatcher that bounds and serializes in-flight transitions, and the
//! executor that runs a participant's inbound message loop against a
//! registry of state-model handler factories. `conductor-agentd`
//! (`src/main.rs`) wires these into a running binary.

pub mod dispatcher;
pub mod executor;
pub mod factory;
