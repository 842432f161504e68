//! In-memory cluster accessor for domain tests.

use std::collections::HashMap;

use async_trait::async_trait;

use super::binding::{OperatorBinding, SpecBinding};
use super::model::ServiceInstance;
use super::port::{ClusterClient, ClusterError, RawConnection, ResourceRecord, ResourceRef};

pub struct MockCluster {
    pub namespace: String,
    pub records: Vec<ResourceRecord>,
    pub operator_bindings: HashMap<String, OperatorBinding>,
    pub spec_bindings: HashMap<String, SpecBinding>,
    /// Secret name to data key names.
    pub secrets: HashMap<String, Vec<String>>,
    pub deployments: Vec<String>,
    pub binding_kinds_registered: bool,
    pub binding_operator_installed: bool,
    pub bindable_refs: Vec<ResourceRef>,
    /// Plurals whose instance listing answers Forbidden.
    pub forbidden_plurals: Vec<String>,
    /// Instances keyed by resource plural.
    pub instances: HashMap<String, Vec<ServiceInstance>>,
    pub ingresses: Vec<RawConnection>,
    pub routes: Vec<RawConnection>,
    pub route_supported: bool,
}

impl Default for MockCluster {
    fn default() -> Self {
        MockCluster {
            namespace: "default".to_string(),
            records: vec![],
            operator_bindings: HashMap::new(),
            spec_bindings: HashMap::new(),
            secrets: HashMap::new(),
            deployments: vec![],
            binding_kinds_registered: true,
            binding_operator_installed: false,
            bindable_refs: vec![],
            forbidden_plurals: vec![],
            instances: HashMap::new(),
            ingresses: vec![],
            routes: vec![],
            route_supported: true,
        }
    }
}

fn matches_selector(record: &ResourceRecord, selector: &str) -> bool {
    if selector.is_empty() {
        return true;
    }
    selector.split(',').all(|requirement| {
        match requirement.split_once('=') {
            Some((key, value)) => record.labels.get(key).map(String::as_str) == Some(value),
            None => false,
        }
    })
}

#[async_trait]
impl ClusterClient for MockCluster {
    fn current_namespace(&self) -> String {
        self.namespace.clone()
    }

    async fn list_resource_records(
        &self,
        _namespace: &str,
        selector: &str,
    ) -> Result<Vec<ResourceRecord>, ClusterError> {
        Ok(self
            .records
            .iter()
            .filter(|record| matches_selector(record, selector))
            .cloned()
            .collect())
    }

    async fn is_binding_operator_installed(&self) -> Result<bool, ClusterError> {
        Ok(self.binding_operator_installed)
    }

    async fn bindable_kind_refs(&self) -> Result<Vec<ResourceRef>, ClusterError> {
        Ok(self.bindable_refs.clone())
    }

    async fn list_service_instances(
        &self,
        _namespace: &str,
        resource: &ResourceRef,
    ) -> Result<Vec<ServiceInstance>, ClusterError> {
        if self.forbidden_plurals.contains(&resource.plural) {
            return Err(ClusterError::Forbidden(format!(
                "cannot list {} in the namespace",
                resource.plural
            )));
        }
        Ok(self.instances.get(&resource.plural).cloned().unwrap_or_default())
    }

    async fn get_operator_binding(&self, name: &str) -> Result<OperatorBinding, ClusterError> {
        self.operator_bindings
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::not_found("ServiceBinding", name))
    }

    async fn get_spec_binding(&self, name: &str) -> Result<SpecBinding, ClusterError> {
        self.spec_bindings
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::not_found("ServiceBinding", name))
    }

    async fn list_bindings_from_all_groups(
        &self,
    ) -> Result<(Vec<SpecBinding>, Vec<OperatorBinding>), ClusterError> {
        if !self.binding_kinds_registered {
            return Err(ClusterError::KindNotRegistered("ServiceBinding".to_string()));
        }
        Ok((
            self.spec_bindings.values().cloned().collect(),
            self.operator_bindings.values().cloned().collect(),
        ))
    }

    async fn get_deployment_name(&self, selector: &str) -> Result<String, ClusterError> {
        self.deployments
            .first()
            .cloned()
            .ok_or_else(|| ClusterError::not_found("Deployment", selector))
    }

    async fn secret_keys(&self, name: &str, _namespace: &str) -> Result<Vec<String>, ClusterError> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::not_found("Secret", name))
    }

    async fn list_ingresses(
        &self,
        _namespace: &str,
        _selector: &str,
    ) -> Result<Vec<RawConnection>, ClusterError> {
        Ok(self.ingresses.clone())
    }

    async fn is_route_supported(&self) -> Result<bool, ClusterError> {
        Ok(self.route_supported)
    }

    async fn list_routes(
        &self,
        _namespace: &str,
        _selector: &str,
    ) -> Result<Vec<RawConnection>, ClusterError> {
        Ok(self.routes.clone())
    }
}
