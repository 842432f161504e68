use std::collections::BTreeMap;

use anyhow::Error;
use async_trait::async_trait;
use bollard::{container::ListContainersOptions, Docker};
use itertools::Itertools;
use map_macro::hash_map;

use crate::domain::{
    component::merge_observation,
    labels,
    model::{Component, Platform, RunningModes},
    port::ContainerEngine,
};

pub struct DockerContainerEngine {
    pub docker: Docker,
}

#[async_trait]
impl ContainerEngine for DockerContainerEngine {
    async fn list_components(&self) -> Result<Vec<Component>, Error> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters: hash_map! {
                    // Presence filter: only containers carrying the
                    // component identity label can be attributed.
                    "label" => vec![labels::KUBERNETES_INSTANCE]
                },
                ..Default::default()
            }))
            .await?;

        let mut components = Vec::new();
        for container in containers {
            let container_labels: BTreeMap<String, String> = container
                .labels
                .unwrap_or_default()
                .into_iter()
                .collect();
            let Some(name) = labels::component_name(&container_labels) else {
                continue;
            };

            let mut running_in = RunningModes::new();
            if let Some(mode) = labels::mode(&container_labels) {
                running_in.insert(mode);
            }
            merge_observation(
                &mut components,
                Component {
                    name,
                    // Containers only carry labels, no annotations.
                    component_type: labels::project_type(Some(&container_labels), None),
                    managed_by: labels::managed_by(&container_labels).unwrap_or_default(),
                    managed_by_version: labels::managed_by_version(&container_labels)
                        .unwrap_or_default(),
                    running_in,
                    platform: Some(Platform::Docker),
                },
            );
        }
        Ok(components
            .into_iter()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect())
    }
}
