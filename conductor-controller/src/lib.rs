/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The controller half of the cluster-management system: the eight
//! pipeline stages, the four rebalancer variants, the throttle engine,
//! message generation and dispatch, and the administrative surface.
//! `conductord` (`src/main.rs`) wires these into a running binary.

pub mod admin;
pub mod cache;
pub mod current_state_agg;
pub mod dispatch;
pub mod external_view;
pub mod message_gen;
pub mod monitor;
pub mod pipeline;
pub mod rebalance;
pub mod resource;
pub mod snapshot;
pub mod throttle;
