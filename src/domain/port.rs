use std::collections::BTreeMap;

use anyhow::Error;
use async_trait::async_trait;
use thiserror::Error as ThisError;

use super::binding::{OperatorBinding, SpecBinding};
use super::model::{Component, ForwardedPort, ServiceInstance};

/// Errors surfaced by a [`ClusterClient`]. The first three variants are
/// sentinels the domain matches on per call site; everything else travels
/// opaquely through `Other`.
#[derive(Debug, ThisError)]
pub enum ClusterError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("kind {0} is not registered on the cluster")]
    KindNotRegistered(String),
    #[error("malformed {kind} resource: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Other(#[from] Error),
}

impl ClusterError {
    pub fn not_found(kind: &str, name: &str) -> ClusterError {
        ClusterError::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }
}

/// Labels and annotations of one arbitrary resource, the only thing the
/// aggregator needs to see from a discovery-wide scan.
#[derive(Debug, Clone, Default)]
pub struct ResourceRecord {
    pub kind: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

/// A group/version/kind with its resolved resource plural, the product of a
/// RESTMapping lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
}

/// An Ingress or Route as fetched, before owner filtering and rule
/// normalization.
#[derive(Debug, Clone, Default)]
pub struct RawConnection {
    pub name: String,
    pub owned: bool,
    pub rules: Vec<RawRule>,
}

#[derive(Debug, Clone, Default)]
pub struct RawRule {
    pub host: String,
    pub paths: Vec<String>,
}

/// Capability set over the cluster: list/get resources of arbitrary and
/// well-known kinds, probe API registration, resolve RESTMappings. No
/// cluster client type crosses this boundary.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    fn current_namespace(&self) -> String;

    /// Every listable namespaced resource matching the selector, of any
    /// kind. An empty selector matches everything, labeled or not.
    async fn list_resource_records(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<ResourceRecord>, ClusterError>;

    async fn is_binding_operator_installed(&self) -> Result<bool, ClusterError>;

    /// RESTMapping-resolved refs for every kind declared bindable.
    async fn bindable_kind_refs(&self) -> Result<Vec<ResourceRef>, ClusterError>;

    async fn list_service_instances(
        &self,
        namespace: &str,
        resource: &ResourceRef,
    ) -> Result<Vec<ServiceInstance>, ClusterError>;

    async fn get_operator_binding(&self, name: &str) -> Result<OperatorBinding, ClusterError>;

    async fn get_spec_binding(&self, name: &str) -> Result<SpecBinding, ClusterError>;

    /// All bindings of both API variants in the current namespace. Fails
    /// with [`ClusterError::KindNotRegistered`] when neither CRD is
    /// installed.
    async fn list_bindings_from_all_groups(
        &self,
    ) -> Result<(Vec<SpecBinding>, Vec<OperatorBinding>), ClusterError>;

    /// Name of the single Deployment matching the selector.
    async fn get_deployment_name(&self, selector: &str) -> Result<String, ClusterError>;

    /// Data keys of a named secret.
    async fn secret_keys(&self, name: &str, namespace: &str) -> Result<Vec<String>, ClusterError>;

    async fn list_ingresses(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<RawConnection>, ClusterError>;

    async fn is_route_supported(&self) -> Result<bool, ClusterError>;

    async fn list_routes(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<RawConnection>, ClusterError>;
}

/// Capability set over a local container engine.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Components reconstructed from container labels, deduplicated by name.
    async fn list_components(&self) -> Result<Vec<Component>, Error>;
}

/// Per-working-directory session state. A missing backing file reads as the
/// empty state; any other read failure propagates.
pub trait RunStateStore {
    fn forwarded_ports(&self) -> Result<Vec<ForwardedPort>, Error>;

    /// Full-document overwrite: callers supply the complete desired set.
    fn set_forwarded_ports(&self, ports: &[ForwardedPort]) -> Result<(), Error>;

    /// Clears the forwarded-port state without deleting the file, marking a
    /// clean session end.
    fn save_exit(&self) -> Result<(), Error>;
}
