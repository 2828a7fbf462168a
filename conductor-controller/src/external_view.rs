/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Aggregates each resource's observed CurrentStates into the public,
//! eventually-consistent ExternalView and writes it to the store.
//! Within one pipeline run the view is monotonic with respect to the
//! snapshot it was computed from; across runs a temporary regression
//! (an instance's replica briefly missing) is possible and tolerated.

use crate::current_state_agg::ResourceAggregate;
use crate::resource::ResourceView;
use conductor_common::error::Result;
use conductor_common::model::ExternalView;
use conductor_common::paths;
use conductor_store::client::CoordinationStore;
use conductor_store::typed::{create_recursive_typed, get_typed, set_typed};

/// Folds a resource's aggregate into the shape the store keeps:
/// partition -> instance -> observed state. Partitions with no replica
/// reporting a state yet are omitted rather than written as empty.
pub fn build(resource: &ResourceView<'_>, aggregate: &ResourceAggregate) -> ExternalView {
    let mut view = ExternalView::new(resource.ideal_state.resource_name.clone());
    for (partition, replicas) in &aggregate.partitions {
        let mut by_instance = std::collections::HashMap::new();
        for (instance, observation) in replicas {
            if let Some(state) = &observation.current_state {
                by_instance.insert(instance.clone(), state.clone());
            }
        }
        if !by_instance.is_empty() {
            view.partition_instance_state.insert(partition.clone(), by_instance);
        }
    }
    view
}

pub async fn publish(store: &dyn CoordinationStore, cluster: &str, view: &ExternalView) -> Result<()> {
    let path = paths::external_view_path(cluster, &view.resource_name);
    match get_typed::<ExternalView>(store, &path).await {
        Ok(existing) => {
            set_typed(store, &path, view, existing.version).await?;
        }
        Err(_) => {
            create_recursive_typed(store, &path, view).await?;
        }
    }
    Ok(())
}
