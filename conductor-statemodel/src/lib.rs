/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! State model definitions, the participant handler contract, and the
//! registry tying state-model names to both.

pub mod builtin;
pub mod handler;
pub mod registry;

pub use handler::{NotificationContext, StateModelHandler, StateModelHandlerFactory};
pub use registry::StateModelRegistry;
