use std::collections::BTreeMap;

use anyhow::Error;

use model::{
    Component, ConnectionData, DevfileInfo, ForwardedPort, RunningModes, ServiceBinding,
    ServiceInstance,
};
use port::{ClusterClient, ClusterError, ContainerEngine, RunStateStore};

pub mod binding;
pub mod component;
pub mod labels;
pub mod model;
pub mod port;
#[cfg(test)]
pub(crate) mod testing;

/// The unified view over everything the tool can observe: the cluster, the
/// local container engine, the local project directory and its session
/// state. Cluster and engine are optional; operations degrade to the
/// sources that are present.
pub struct InspectionService {
    pub cluster: Option<Box<dyn ClusterClient + Send + Sync>>,
    pub engine: Option<Box<dyn ContainerEngine + Send + Sync>>,
    pub state: Box<dyn RunStateStore + Send + Sync>,
    /// Application the local component belongs to.
    pub app: String,
    /// Name of the component implied by the working directory.
    pub local_name: String,
    /// Local project descriptor metadata, when one exists.
    pub devfile: Option<DevfileInfo>,
}

impl InspectionService {
    fn cluster(&self) -> Option<&dyn ClusterClient> {
        match &self.cluster {
            Some(cluster) => Some(cluster.as_ref()),
            None => None,
        }
    }

    fn engine(&self) -> Option<&dyn ContainerEngine> {
        match &self.engine {
            Some(engine) => Some(engine.as_ref()),
            None => None,
        }
    }

    fn namespace(&self) -> String {
        self.cluster()
            .map(|cluster| cluster.current_namespace())
            .unwrap_or_default()
    }
}

pub async fn list_components(
    service: &InspectionService,
) -> Result<(Vec<Component>, String), Error> {
    component::list_all_components(
        service.cluster(),
        service.engine(),
        &service.namespace(),
        service.devfile.as_ref(),
        &service.local_name,
    )
    .await
}

pub async fn running_modes(service: &InspectionService, name: &str) -> Result<RunningModes, Error> {
    match service.cluster() {
        Some(cluster) => component::get_running_modes(cluster, name, &service.app).await,
        None => Ok(RunningModes::new()),
    }
}

pub async fn connections(
    service: &InspectionService,
    name: &str,
) -> Result<(Vec<ConnectionData>, Vec<ConnectionData>), Error> {
    match service.cluster() {
        Some(cluster) => component::list_routes_and_ingresses(cluster, name, &service.app).await,
        None => Ok((vec![], vec![])),
    }
}

pub async fn devfile_info(service: &InspectionService, name: &str) -> Result<DevfileInfo, Error> {
    match service.cluster() {
        Some(cluster) => component::devfile_info_from_cluster(cluster, name, &service.app).await,
        None => Ok(DevfileInfo::default()),
    }
}

pub async fn get_binding(service: &InspectionService, name: &str) -> Result<ServiceBinding, Error> {
    match service.cluster() {
        Some(cluster) => Ok(binding::binding(cluster, name).await?),
        None => Err(ClusterError::not_found("ServiceBinding", name).into()),
    }
}

pub async fn service_instances(
    service: &InspectionService,
) -> Result<BTreeMap<String, ServiceInstance>, Error> {
    match service.cluster() {
        Some(cluster) => binding::service_instances(cluster, &cluster.current_namespace()).await,
        None => Ok(BTreeMap::new()),
    }
}

pub fn forwarded_ports(service: &InspectionService) -> Result<Vec<ForwardedPort>, Error> {
    service.state.forwarded_ports()
}
