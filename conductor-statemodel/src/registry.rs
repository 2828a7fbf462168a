/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::handler::StateModelHandlerFactory;
use conductor_common::model::StateModelDefinition;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps state-model names to both their declarative definition and (on
/// the participant side) the factory that builds handler instances for
/// them.
#[derive(Default)]
pub struct StateModelRegistry {
    definitions: HashMap<String, StateModelDefinition>,
    factories: HashMap<String, Arc<dyn StateModelHandlerFactory>>,
}

impl StateModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_definition(&mut self, def: StateModelDefinition) {
        self.definitions.insert(def.name.clone(), def);
    }

    pub fn register_factory(&mut self, name: impl Into<String>, factory: Arc<dyn StateModelHandlerFactory>) {
        self.factories.insert(name.into(), factory);
    }

    pub fn definition(&self, name: &str) -> Option<&StateModelDefinition> {
        self.definitions.get(name)
    }

    pub fn factory(&self, name: &str) -> Option<Arc<dyn StateModelHandlerFactory>> {
        self.factories.get(name).cloned()
    }

    /// Populate the registry's definitions with every built-in model.
    /// Factories are always application-supplied, so this never touches
    /// `self.factories`.
    pub fn with_builtin_definitions() -> Self {
        let mut registry = Self::new();
        registry.register_definition(crate::builtin::online_offline_with_master());
        registry.register_definition(crate::builtin::leader_standby());
        registry.register_definition(crate::builtin::online_offline());
        registry
    }
}
