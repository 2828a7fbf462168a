/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::{Deserialize, Serialize};

/// `LIVEINSTANCES/{instance}`. Ephemeral: created on
/// participant session start, deleted on disconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveInstance {
    pub instance_name: String,
    pub session_id: String,
    pub controller_epoch: u64,
}

impl LiveInstance {
    pub fn new(instance_name: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            session_id: session_id.into(),
            controller_epoch: 0,
        }
    }
}
