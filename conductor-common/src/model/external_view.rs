/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `EXTERNALVIEW/{resource}`: the aggregated, eventually
/// consistent public view, written by the controller from aggregated
/// current state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExternalView {
    pub resource_name: String,
    pub partition_instance_state: HashMap<String, HashMap<String, String>>,
}

impl ExternalView {
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            partition_instance_state: HashMap::new(),
        }
    }
}
