use anyhow::anyhow;
use axum::async_trait;
use futures::future::join_all;
use k8s_openapi::api::{apps::v1::Deployment, core::v1::Secret, networking::v1::Ingress};
use kube::{
    api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams},
    discovery::{verbs, Discovery, Scope},
    Client, ResourceExt,
};
use log::debug;
use serde::Deserialize;

use crate::domain::{
    binding::{OperatorBinding, SpecBinding},
    model::ServiceInstance,
    port::{ClusterClient, ClusterError, RawConnection, RawRule, ResourceRecord, ResourceRef},
};

const BINDING_OPERATOR_GROUP: &str = "binding.operators.coreos.com";
const BINDING_OPERATOR_VERSION: &str = "v1alpha1";
const BINDING_SPEC_GROUP: &str = "servicebinding.io";
const BINDING_SPEC_VERSION: &str = "v1alpha3";
const ROUTE_GROUP: &str = "route.openshift.io";
const ROUTE_VERSION: &str = "v1";

pub struct KubeClusterClient {
    pub client: Client,
    pub namespace: String,
}

fn operator_binding_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk(BINDING_OPERATOR_GROUP, BINDING_OPERATOR_VERSION, "ServiceBinding")
}

fn operator_binding_resource() -> ApiResource {
    ApiResource::from_gvk(&operator_binding_gvk())
}

fn spec_binding_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        BINDING_SPEC_GROUP,
        BINDING_SPEC_VERSION,
        "ServiceBinding",
    ))
}

fn route_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(ROUTE_GROUP, ROUTE_VERSION, "Route"))
}

fn map_kube_error(kind: &str, name: &str, error: kube::Error) -> ClusterError {
    match error {
        kube::Error::Api(response) if response.code == 404 => ClusterError::not_found(kind, name),
        kube::Error::Api(response) if response.code == 403 => {
            ClusterError::Forbidden(response.message)
        }
        error => ClusterError::Other(error.into()),
    }
}

fn from_dynamic<T>(kind: &str, object: &DynamicObject) -> Result<T, ClusterError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|source| ClusterError::Malformed {
            kind: kind.to_string(),
            source,
        })
}

impl KubeClusterClient {
    async fn discover(&self, groups: Option<&[&str]>) -> Result<Discovery, ClusterError> {
        let discovery = Discovery::new(self.client.clone());
        let discovery = match groups {
            Some(groups) => discovery.filter(groups),
            None => discovery,
        };
        discovery
            .run()
            .await
            .map_err(|error| ClusterError::Other(error.into()))
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    fn current_namespace(&self) -> String {
        self.namespace.clone()
    }

    async fn list_resource_records(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<ResourceRecord>, ClusterError> {
        let discovery = self.discover(None).await?;
        let params = if selector.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(selector)
        };

        let resources: Vec<ApiResource> = discovery
            .groups()
            .flat_map(|group| group.recommended_resources())
            .filter(|(_, caps)| {
                caps.scope == Scope::Namespaced && caps.supports_operation(verbs::LIST)
            })
            .map(|(resource, _)| resource)
            .collect();

        // One list call per kind, concurrently. join_all keeps the input
        // order, so the first-seen merge order downstream stays stable.
        let lists = join_all(resources.iter().map(|resource| {
            let api: Api<DynamicObject> =
                Api::namespaced_with(self.client.clone(), namespace, resource);
            let params = params.clone();
            async move { api.list(&params).await }
        }))
        .await;

        let mut records = Vec::new();
        for (resource, result) in resources.iter().zip(lists) {
            let list = match result {
                Ok(list) => list,
                Err(kube::Error::Api(response)) if response.code == 404 || response.code == 403 => {
                    debug!("skipping kind {}: {}", resource.kind, response.message);
                    continue;
                }
                Err(error) => return Err(ClusterError::Other(error.into())),
            };
            for item in list.items {
                records.push(ResourceRecord {
                    kind: resource.kind.clone(),
                    name: item.name_any(),
                    labels: item.labels().clone(),
                    annotations: item.annotations().clone(),
                });
            }
        }
        Ok(records)
    }

    async fn is_binding_operator_installed(&self) -> Result<bool, ClusterError> {
        let discovery = self.discover(Some(&[BINDING_OPERATOR_GROUP])).await?;
        Ok(discovery.resolve_gvk(&operator_binding_gvk()).is_some())
    }

    async fn bindable_kind_refs(&self) -> Result<Vec<ResourceRef>, ClusterError> {
        let resource = ApiResource::from_gvk(&GroupVersionKind::gvk(
            BINDING_OPERATOR_GROUP,
            BINDING_OPERATOR_VERSION,
            "BindableKinds",
        ));
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
        let object = api
            .get("bindable-kinds")
            .await
            .map_err(|error| map_kube_error("BindableKinds", "bindable-kinds", error))?;

        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct BindableKindEntry {
            group: String,
            version: String,
            kind: String,
        }
        let entries: Vec<BindableKindEntry> = match object.data.get("status") {
            Some(status) if !status.is_null() => serde_json::from_value(status.clone())
                .map_err(|source| ClusterError::Malformed {
                    kind: "BindableKinds".to_string(),
                    source,
                })?,
            // No status yet: the operator has not reconciled anything.
            _ => Vec::new(),
        };

        let discovery = self.discover(None).await?;
        let mut refs = Vec::new();
        for entry in entries {
            let gvk = GroupVersionKind::gvk(&entry.group, &entry.version, &entry.kind);
            match discovery.resolve_gvk(&gvk) {
                Some((resource, _)) => refs.push(ResourceRef {
                    group: entry.group,
                    version: entry.version,
                    kind: entry.kind,
                    plural: resource.plural,
                }),
                None => debug!("no rest mapping for bindable kind {}, skipping", gvk.kind),
            }
        }
        Ok(refs)
    }

    async fn list_service_instances(
        &self,
        namespace: &str,
        resource: &ResourceRef,
    ) -> Result<Vec<ServiceInstance>, ClusterError> {
        let api_resource = ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk(&resource.group, &resource.version, &resource.kind),
            &resource.plural,
        );
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &api_resource);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|error| map_kube_error(&resource.kind, "", error))?;
        Ok(list
            .items
            .into_iter()
            .map(|item| ServiceInstance {
                name: item.name_any(),
                kind: resource.kind.clone(),
                group: resource.group.clone(),
            })
            .collect())
    }

    async fn get_operator_binding(&self, name: &str) -> Result<OperatorBinding, ClusterError> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &self.namespace, &operator_binding_resource());
        let object = api
            .get(name)
            .await
            .map_err(|error| map_kube_error("ServiceBinding", name, error))?;
        from_dynamic("ServiceBinding", &object)
    }

    async fn get_spec_binding(&self, name: &str) -> Result<SpecBinding, ClusterError> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &self.namespace, &spec_binding_resource());
        let object = api
            .get(name)
            .await
            .map_err(|error| map_kube_error("ServiceBinding", name, error))?;
        from_dynamic("ServiceBinding", &object)
    }

    async fn list_bindings_from_all_groups(
        &self,
    ) -> Result<(Vec<SpecBinding>, Vec<OperatorBinding>), ClusterError> {
        let params = ListParams::default();
        let spec_api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &self.namespace, &spec_binding_resource());
        let operator_api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &self.namespace, &operator_binding_resource());

        // A 404 on the list path means the CRD of that variant is not
        // installed; only both variants missing counts as unregistered.
        let spec_list = match spec_api.list(&params).await {
            Ok(list) => Some(list),
            Err(kube::Error::Api(response)) if response.code == 404 => None,
            Err(error) => return Err(map_kube_error("ServiceBinding", "", error)),
        };
        let operator_list = match operator_api.list(&params).await {
            Ok(list) => Some(list),
            Err(kube::Error::Api(response)) if response.code == 404 => None,
            Err(error) => return Err(map_kube_error("ServiceBinding", "", error)),
        };
        if spec_list.is_none() && operator_list.is_none() {
            return Err(ClusterError::KindNotRegistered("ServiceBinding".to_string()));
        }

        let mut specs = Vec::new();
        for item in spec_list.map(|l| l.items).unwrap_or_default() {
            specs.push(from_dynamic("ServiceBinding", &item)?);
        }
        let mut operators = Vec::new();
        for item in operator_list.map(|l| l.items).unwrap_or_default() {
            operators.push(from_dynamic("ServiceBinding", &item)?);
        }
        Ok((specs, operators))
    }

    async fn get_deployment_name(&self, selector: &str) -> Result<String, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &self.namespace);
        let deployments = api
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|error| map_kube_error("Deployment", selector, error))?;
        let mut items = deployments.items;
        match items.len() {
            0 => Err(ClusterError::not_found("Deployment", selector)),
            1 => Ok(items.remove(0).name_any()),
            n => Err(ClusterError::Other(anyhow!(
                "expected a single Deployment matching {}, found {}",
                selector,
                n
            ))),
        }
    }

    async fn secret_keys(&self, name: &str, namespace: &str) -> Result<Vec<String>, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get(name)
            .await
            .map_err(|error| map_kube_error("Secret", name, error))?;
        Ok(secret.data.unwrap_or_default().into_keys().collect())
    }

    async fn list_ingresses(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<RawConnection>, ClusterError> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|error| map_kube_error("Ingress", selector, error))?;
        Ok(list
            .items
            .into_iter()
            .map(|ingress| RawConnection {
                name: ingress.name_any(),
                owned: !ingress.owner_references().is_empty(),
                rules: ingress
                    .spec
                    .and_then(|spec| spec.rules)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|rule| RawRule {
                        host: rule.host.unwrap_or_default(),
                        paths: rule
                            .http
                            .map(|http| {
                                http.paths
                                    .into_iter()
                                    .map(|path| path.path.unwrap_or_default())
                                    .collect()
                            })
                            .unwrap_or_default(),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn is_route_supported(&self) -> Result<bool, ClusterError> {
        let discovery = self.discover(Some(&[ROUTE_GROUP])).await?;
        Ok(discovery.has_group(ROUTE_GROUP))
    }

    async fn list_routes(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<RawConnection>, ClusterError> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &route_resource());
        let list = api
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|error| map_kube_error("Route", selector, error))?;
        Ok(list
            .items
            .into_iter()
            .map(|route| RawConnection {
                name: route.name_any(),
                owned: !route.owner_references().is_empty(),
                rules: vec![RawRule {
                    host: route.data["spec"]["host"].as_str().unwrap_or_default().to_string(),
                    paths: vec![route.data["spec"]["path"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string()],
                }],
            })
            .collect())
    }
}
