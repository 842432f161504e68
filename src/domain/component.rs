//! Component aggregation: rebuilding the list of logical components from
//! whatever resources are visible, whether or not this tool created them.

use anyhow::{Context, Error};
use log::debug;
use thiserror::Error as ThisError;

use super::labels;
use super::model::{
    Component, ConnectionData, DevfileInfo, Platform, Rule, RunningMode, RunningModes,
};
use super::port::{ClusterClient, ClusterError, ContainerEngine, RawConnection, ResourceRecord};

/// Kinds that are catalog records rather than deployable components.
const EXCLUDED_KINDS: [&str; 1] = ["PackageManifest"];

/// Raised when a component query matches no resource at all. Distinct from
/// a component whose resources exist but carry no mode label yet.
#[derive(Debug, ThisError)]
#[error("no component found with name {name:?} in namespace {namespace:?}")]
pub struct NoComponentFound {
    pub name: String,
    pub namespace: String,
}

/// Merges one observation into the accumulator. Same name means same
/// component: modes union, and the first non-absent type and managed-by win
/// and are never downgraded by a later absent observation.
pub fn merge_observation(components: &mut Vec<Component>, observed: Component) {
    if let Some(existing) = components.iter_mut().find(|c| c.name == observed.name) {
        existing.running_in.extend(observed.running_in.iter().copied());
        if existing.component_type.is_none() && observed.component_type.is_some() {
            existing.component_type = observed.component_type;
        }
        if existing.managed_by.is_empty() && !observed.managed_by.is_empty() {
            existing.managed_by = observed.managed_by;
        }
    } else {
        components.push(observed);
    }
}

/// Pure fold behind [`list_all_cluster_components`]: resources without an
/// identity label are skipped, excluded kinds dropped, the rest merged by
/// name in first-seen order.
pub fn cluster_components_from_records(records: &[ResourceRecord]) -> Vec<Component> {
    let mut components = Vec::new();
    for record in records {
        if EXCLUDED_KINDS.contains(&record.kind.as_str()) {
            continue;
        }
        // No identity label: the resource cannot be attributed to any
        // component (most likely operator-installed) and would be noise.
        let Some(name) = labels::component_name(&record.labels) else {
            continue;
        };

        let mut running_in = RunningModes::new();
        if let Some(mode) = labels::mode(&record.labels) {
            running_in.insert(mode);
        }
        merge_observation(
            &mut components,
            Component {
                name,
                component_type: labels::project_type(None, Some(&record.annotations)),
                managed_by: labels::managed_by(&record.labels).unwrap_or_default(),
                managed_by_version: labels::managed_by_version(&record.labels)
                    .unwrap_or_default(),
                running_in,
                platform: Some(Platform::Cluster),
            },
        );
    }
    components
}

/// All components visible on the cluster, deduplicated by name.
pub async fn list_all_cluster_components(
    client: &dyn ClusterClient,
    namespace: &str,
) -> Result<Vec<Component>, Error> {
    let records = client
        .list_resource_records(namespace, "")
        .await
        .context("unable to list cluster resources required to find components")?;
    Ok(cluster_components_from_records(&records))
}

/// Cluster components, container-engine components, and the component
/// implied by the current project directory, merged by name. Returns the
/// list and the name of the local component (empty when there is none).
pub async fn list_all_components(
    client: Option<&dyn ClusterClient>,
    engine: Option<&dyn ContainerEngine>,
    namespace: &str,
    devfile: Option<&DevfileInfo>,
    local_name: &str,
) -> Result<(Vec<Component>, String), Error> {
    let mut all = Vec::new();
    if let Some(client) = client {
        all.extend(list_all_cluster_components(client, namespace).await?);
    }
    if let Some(engine) = engine {
        all.extend(engine.list_components().await?);
    }

    let mut component_in_devfile = String::new();
    if !local_name.is_empty() {
        if !all.iter().any(|c| c.name == local_name) {
            all.push(Component {
                name: local_name.to_string(),
                component_type: devfile.and_then(DevfileInfo::component_type),
                managed_by: String::new(),
                managed_by_version: String::new(),
                running_in: RunningModes::new(),
                platform: None,
            });
        }
        component_in_devfile = local_name.to_string();
    }
    Ok((all, component_in_devfile))
}

async fn resources_for_component(
    client: &dyn ClusterClient,
    name: &str,
    app: &str,
    namespace: &str,
) -> Result<Vec<ResourceRecord>, ClusterError> {
    let selector = labels::selector(name, app, None);
    let records = client.list_resource_records(namespace, &selector).await?;
    Ok(records
        .into_iter()
        .filter(|r| !EXCLUDED_KINDS.contains(&r.kind.as_str()))
        .collect())
}

/// Modes a named component is currently deployed in. No matching resource
/// at all raises [`NoComponentFound`]; resources without mode labels yield
/// a valid empty set.
pub async fn get_running_modes(
    client: &dyn ClusterClient,
    name: &str,
    app: &str,
) -> Result<RunningModes, Error> {
    let namespace = client.current_namespace();
    let records = resources_for_component(client, name, app, &namespace).await?;
    if records.is_empty() {
        return Err(NoComponentFound {
            name: name.to_string(),
            namespace,
        }
        .into());
    }

    let mut modes = RunningModes::new();
    for record in &records {
        if let Some(mode) = labels::mode(&record.labels) {
            modes.insert(mode);
        }
    }
    Ok(modes)
}

/// Best-effort reconstruction of descriptor metadata from cluster labels
/// and annotations, for components that have no local descriptor. Every
/// field starts absent (serialized as "Unknown") and takes the first
/// non-empty value observed. Never a source of truth once a local
/// descriptor exists.
pub async fn devfile_info_from_cluster(
    client: &dyn ClusterClient,
    name: &str,
    app: &str,
) -> Result<DevfileInfo, Error> {
    let namespace = client.current_namespace();
    let records = match resources_for_component(client, name, app, &namespace).await {
        Ok(records) => records,
        Err(err) => {
            debug!("unable to list resources of component {}: {}", name, err);
            return Ok(DevfileInfo::default());
        }
    };

    let mut info = DevfileInfo::default();
    for record in &records {
        if info.name.is_none() {
            info.name = labels::component_name(&record.labels);
        }
        if info.project_type.is_none() {
            info.project_type =
                labels::project_type(Some(&record.labels), Some(&record.annotations));
        }
    }
    Ok(info)
}

fn project_connections(raw: Vec<RawConnection>) -> Vec<ConnectionData> {
    raw.into_iter()
        .filter(|connection| {
            if connection.owned {
                // Created by a higher-level controller, not by our deploy
                // action; reporting it would double-count.
                debug!("skipping {} created/owned by another resource", connection.name);
                false
            } else {
                true
            }
        })
        .map(|connection| ConnectionData {
            rules: normalize_rules(connection.rules),
            name: connection.name,
        })
        .collect()
}

/// A connection always exposes at least one rule: no declared rules means
/// "everything", one wildcard rule. An empty host likewise reads as any.
fn normalize_rules(rules: Vec<super::port::RawRule>) -> Vec<Rule> {
    if rules.is_empty() {
        return vec![Rule {
            host: "*".to_string(),
            paths: vec!["/*".to_string()],
        }];
    }
    rules
        .into_iter()
        .map(|rule| Rule {
            host: if rule.host.is_empty() {
                "*".to_string()
            } else {
                rule.host
            },
            paths: rule.paths,
        })
        .collect()
}

/// Ingresses and Routes created by this component's deploy mode, projected
/// into one shape. Routes are only consulted on clusters that support the
/// kind; a failing support probe reads as unsupported.
pub async fn list_routes_and_ingresses(
    client: &dyn ClusterClient,
    name: &str,
    app: &str,
) -> Result<(Vec<ConnectionData>, Vec<ConnectionData>), Error> {
    let selector = labels::selector(name, app, Some(RunningMode::Deploy));
    let namespace = client.current_namespace();

    let ingresses = project_connections(client.list_ingresses(&namespace, &selector).await?);

    let route_supported = match client.is_route_supported().await {
        Ok(supported) => supported,
        Err(err) => {
            debug!("unable to detect route support: {}", err);
            false
        }
    };
    if !route_supported {
        return Ok((ingresses, vec![]));
    }

    let routes = project_connections(client.list_routes(&namespace, &selector).await?);
    Ok((ingresses, routes))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::port::RawRule;
    use crate::domain::testing::MockCluster;

    fn record(kind: &str, labels: &[(&str, &str)], annotations: &[(&str, &str)]) -> ResourceRecord {
        let to_map = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        ResourceRecord {
            kind: kind.to_string(),
            name: "some-resource".to_string(),
            labels: to_map(labels),
            annotations: to_map(annotations),
        }
    }

    fn app1_records() -> Vec<ResourceRecord> {
        vec![
            record(
                "Deployment",
                &[
                    (labels::KUBERNETES_INSTANCE, "app1"),
                    (labels::KUBERNETES_PART_OF, "app"),
                    (labels::MODE, "dev"),
                ],
                &[],
            ),
            record(
                "Service",
                &[
                    (labels::KUBERNETES_INSTANCE, "app1"),
                    (labels::KUBERNETES_PART_OF, "app"),
                    (labels::MODE, "deploy"),
                ],
                &[(labels::PROJECT_TYPE, "nodejs")],
            ),
        ]
    }

    #[test]
    fn same_name_resources_merge_into_one_component() {
        let components = cluster_components_from_records(&app1_records());
        assert_eq!(components.len(), 1);
        let component = &components[0];
        assert_eq!(component.name, "app1");
        assert_eq!(component.component_type.as_deref(), Some("nodejs"));
        assert_eq!(
            component.running_in,
            RunningModes::from([RunningMode::Dev, RunningMode::Deploy])
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let records = app1_records();
        let once = cluster_components_from_records(&records);
        let twice = cluster_components_from_records(
            &records
                .iter()
                .chain(records.iter())
                .cloned()
                .collect::<Vec<_>>(),
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn resolved_type_is_never_downgraded() {
        let records = vec![
            record(
                "Deployment",
                &[(labels::KUBERNETES_INSTANCE, "app1")],
                &[(labels::PROJECT_TYPE, "nodejs")],
            ),
            record("Service", &[(labels::KUBERNETES_INSTANCE, "app1")], &[]),
        ];
        let components = cluster_components_from_records(&records);
        assert_eq!(components[0].component_type.as_deref(), Some("nodejs"));
    }

    #[test]
    fn managed_by_takes_the_first_non_empty_observation() {
        let records = vec![
            record("Service", &[(labels::KUBERNETES_INSTANCE, "app1")], &[]),
            record(
                "Deployment",
                &[
                    (labels::KUBERNETES_INSTANCE, "app1"),
                    (labels::KUBERNETES_MANAGED_BY, "devrig"),
                ],
                &[],
            ),
            record(
                "Ingress",
                &[
                    (labels::KUBERNETES_INSTANCE, "app1"),
                    (labels::KUBERNETES_MANAGED_BY, "helm"),
                ],
                &[],
            ),
        ];
        let components = cluster_components_from_records(&records);
        assert_eq!(components[0].managed_by, "devrig");
    }

    #[test]
    fn mode_union_is_order_independent() {
        let mut records = app1_records();
        records.reverse();
        let components = cluster_components_from_records(&records);
        assert_eq!(
            components[0].running_in,
            RunningModes::from([RunningMode::Dev, RunningMode::Deploy])
        );
    }

    #[test]
    fn unattributable_and_catalog_resources_are_skipped() {
        let records = vec![
            record("Deployment", &[(labels::KUBERNETES_MANAGED_BY, "helm")], &[]),
            record(
                "PackageManifest",
                &[(labels::KUBERNETES_INSTANCE, "app1")],
                &[],
            ),
        ];
        assert!(cluster_components_from_records(&records).is_empty());
    }

    #[test]
    fn first_seen_order_is_stable() {
        let records = vec![
            record("Deployment", &[(labels::KUBERNETES_INSTANCE, "b")], &[]),
            record("Deployment", &[(labels::KUBERNETES_INSTANCE, "a")], &[]),
            record("Service", &[(labels::KUBERNETES_INSTANCE, "b")], &[]),
        ];
        let names: Vec<_> = cluster_components_from_records(&records)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn local_component_is_not_duplicated() {
        let mut cluster = MockCluster::default();
        cluster.records = app1_records();

        let devfile = DevfileInfo {
            language: Some("javascript".to_string()),
            ..Default::default()
        };
        let (components, in_devfile) =
            list_all_components(Some(&cluster), None, "default", Some(&devfile), "app1")
                .await
                .unwrap();
        assert_eq!(in_devfile, "app1");
        assert_eq!(components.len(), 1);

        let (components, _) =
            list_all_components(Some(&cluster), None, "default", Some(&devfile), "app2")
                .await
                .unwrap();
        assert_eq!(components.len(), 2);
        let local = components.iter().find(|c| c.name == "app2").unwrap();
        assert_eq!(local.component_type.as_deref(), Some("javascript"));
        assert_eq!(local.platform, None);
    }

    #[tokio::test]
    async fn running_modes_of_unknown_component_is_a_typed_error() {
        let cluster = MockCluster::default();
        let err = get_running_modes(&cluster, "ghost", "app").await.unwrap_err();
        let not_found = err.downcast_ref::<NoComponentFound>().unwrap();
        assert_eq!(not_found.name, "ghost");
    }

    #[tokio::test]
    async fn running_modes_may_be_empty_for_existing_component() {
        let mut cluster = MockCluster::default();
        cluster.records = vec![record(
            "Deployment",
            &[
                (labels::KUBERNETES_INSTANCE, "app1"),
                (labels::KUBERNETES_PART_OF, "app"),
            ],
            &[],
        )];
        let modes = get_running_modes(&cluster, "app1", "app").await.unwrap();
        assert!(modes.is_empty());
    }

    #[tokio::test]
    async fn devfile_info_fills_first_observation_and_defaults_to_unknown() {
        let mut cluster = MockCluster::default();
        cluster.records = app1_records();

        let info = devfile_info_from_cluster(&cluster, "app1", "app").await.unwrap();
        assert_eq!(info.name.as_deref(), Some("app1"));
        assert_eq!(info.project_type.as_deref(), Some("nodejs"));
        assert_eq!(info.language, None);

        let serialized = serde_json::to_value(&info).unwrap();
        assert_eq!(serialized["language"], "Unknown");
        assert_eq!(serialized["projectType"], "nodejs");
    }

    #[test]
    fn owned_connections_are_excluded() {
        let raw = vec![
            RawConnection {
                name: "mine".to_string(),
                owned: false,
                rules: vec![],
            },
            RawConnection {
                name: "generated".to_string(),
                owned: true,
                rules: vec![],
            },
        ];
        let projected = project_connections(raw);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].name, "mine");
    }

    #[test]
    fn empty_rules_normalize_to_a_single_wildcard() {
        let rules = normalize_rules(vec![]);
        assert_eq!(
            rules,
            vec![Rule {
                host: "*".to_string(),
                paths: vec!["/*".to_string()],
            }]
        );

        let rules = normalize_rules(vec![RawRule {
            host: String::new(),
            paths: vec!["/api".to_string()],
        }]);
        assert_eq!(rules[0].host, "*");
        assert_eq!(rules[0].paths, vec!["/api"]);
    }

    #[tokio::test]
    async fn routes_are_skipped_when_unsupported() {
        let mut cluster = MockCluster::default();
        cluster.ingresses = vec![RawConnection {
            name: "front".to_string(),
            owned: false,
            rules: vec![],
        }];
        cluster.routes = vec![RawConnection {
            name: "front-route".to_string(),
            owned: false,
            rules: vec![],
        }];
        cluster.route_supported = false;

        let (ingresses, routes) = list_routes_and_ingresses(&cluster, "front", "app")
            .await
            .unwrap();
        assert_eq!(ingresses.len(), 1);
        assert!(routes.is_empty());

        cluster.route_supported = true;
        let (_, routes) = list_routes_and_ingresses(&cluster, "front", "app")
            .await
            .unwrap();
        assert_eq!(routes.len(), 1);
    }
}
