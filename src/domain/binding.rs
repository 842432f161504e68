//! Service-binding resolution over two competing API schema variants.
//!
//! The binding resource exists mid-migration in two groups:
//! `binding.operators.coreos.com/v1alpha1` (the operator variant, with an
//! explicit file/env toggle) and `servicebinding.io/v1alpha3` (the spec
//! variant, env-declaration based). Callers never see which one is in play:
//! every operation normalizes into the canonical [`ServiceBinding`] shape.

use std::collections::BTreeMap;

use anyhow::{bail, Error};
use log::debug;
use serde::Deserialize;

use super::labels;
use super::model::{BoundWorkload, ServiceBinding, ServiceBindingStatus, ServiceInstance};
use super::port::{ClusterClient, ClusterError};

/// The one status condition whose `"True"` value signals readiness. Absent
/// and non-`"True"` conditions are identical: not ready.
pub const INJECTION_READY: &str = "InjectionReady";

/// Mount prefix under which a ready binding projects its secret keys as
/// files. Left unexpanded: the variable is resolved inside the container.
pub const SERVICE_BINDING_ROOT: &str = "${SERVICE_BINDING_ROOT}";

const DEPLOYMENT_GROUP: &str = "apps";
const DEPLOYMENT_VERSION: &str = "v1";
const DEPLOYMENT_KIND: &str = "Deployment";

// Wire shapes of the two variants. The field layouts are fixed by the
// external CRD contracts, hence plain deserialize structs, not an
// extensible hierarchy.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BindingMeta {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetRef {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub resource: String,
    pub name: String,
}

/// Variant A, `binding.operators.coreos.com/v1alpha1`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OperatorBinding {
    pub metadata: BindingMeta,
    pub spec: OperatorBindingSpec,
    pub status: OperatorBindingStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorBindingSpec {
    pub application: TargetRef,
    pub services: Vec<TargetRef>,
    pub bind_as_files: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorBindingStatus {
    pub conditions: Vec<Condition>,
    /// Name of the generated secret, set by the binding controller.
    pub secret: String,
}

/// Variant B, `servicebinding.io/v1alpha3`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpecBinding {
    pub metadata: BindingMeta,
    pub spec: SpecBindingSpec,
    pub status: SpecBindingStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecBindingSpec {
    pub workload: WorkloadRef,
    pub env: Vec<EnvMapping>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkloadRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnvMapping {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecBindingStatus {
    pub conditions: Vec<Condition>,
    pub binding: Option<SecretRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretRef {
    pub name: String,
}

fn condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    conditions
        .iter()
        .any(|c| c.condition_type == condition_type && c.status == "True")
}

fn canonical_from_operator(binding: &OperatorBinding) -> ServiceBinding {
    let application = &binding.spec.application;
    let workload = (!application.name.is_empty()).then(|| BoundWorkload {
        name: application.name.clone(),
        kind: application.kind.clone(),
        api_version: if application.group.is_empty() {
            application.version.clone()
        } else {
            format!("{}/{}", application.group, application.version)
        },
    });
    ServiceBinding {
        name: binding.metadata.name.clone(),
        bind_as_files: binding.spec.bind_as_files,
        workload,
        status: None,
    }
}

fn canonical_from_spec(binding: &SpecBinding) -> ServiceBinding {
    let workload = &binding.spec.workload;
    ServiceBinding {
        name: binding.metadata.name.clone(),
        // The spec variant has no file toggle; it always projects env vars.
        bind_as_files: false,
        workload: (!workload.name.is_empty()).then(|| BoundWorkload {
            name: workload.name.clone(),
            kind: workload.kind.clone(),
            api_version: workload.api_version.clone(),
        }),
        status: None,
    }
}

fn binding_file_path(binding_name: &str, key: &str) -> String {
    format!("{}/{}/{}", SERVICE_BINDING_ROOT, binding_name, key)
}

/// Returns the binding with the given name, from either API variant. The
/// operator variant is consulted first; only a NotFound outcome falls
/// through to the spec variant. Both absent resolves to the typed
/// [`ClusterError::NotFound`] sentinel, which callers must not treat as a
/// failure.
pub async fn binding(
    client: &dyn ClusterClient,
    name: &str,
) -> Result<ServiceBinding, ClusterError> {
    match client.get_operator_binding(name).await {
        Ok(operator) => {
            let mut sb = canonical_from_operator(&operator);
            sb.status = status_from_operator(client, &operator.metadata.name).await?;
            return Ok(sb);
        }
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err),
    }

    match client.get_spec_binding(name).await {
        Ok(spec) => {
            let mut sb = canonical_from_spec(&spec);
            sb.status = status_from_spec(client, &spec.metadata.name).await?;
            Ok(sb)
        }
        Err(err) if err.is_not_found() => Err(ClusterError::not_found("ServiceBinding", name)),
        Err(err) => Err(err),
    }
}

/// Status of an operator-variant binding: `None` while absent or not ready.
/// Once ready, the secret named by the status must exist; its keys project
/// either as file paths or as env var names depending on the toggle.
pub async fn status_from_operator(
    client: &dyn ClusterClient,
    name: &str,
) -> Result<Option<ServiceBindingStatus>, ClusterError> {
    let binding = match client.get_operator_binding(name).await {
        Ok(binding) => binding,
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err),
    };

    if !condition_true(&binding.status.conditions, INJECTION_READY) {
        return Ok(None);
    }

    let keys = client
        .secret_keys(&binding.status.secret, &client.current_namespace())
        .await?;

    if binding.spec.bind_as_files {
        Ok(Some(ServiceBindingStatus {
            binding_files: keys.iter().map(|k| binding_file_path(name, k)).collect(),
            binding_env_vars: vec![],
        }))
    } else {
        Ok(Some(ServiceBindingStatus {
            binding_files: vec![],
            binding_env_vars: keys,
        }))
    }
}

/// Status of a spec-variant binding: `None` while absent, not ready, or
/// missing its generated-secret ref. The projection is env vars, named by
/// the declared env mappings when any exist, by the secret keys otherwise.
pub async fn status_from_spec(
    client: &dyn ClusterClient,
    name: &str,
) -> Result<Option<ServiceBindingStatus>, ClusterError> {
    let binding = match client.get_spec_binding(name).await {
        Ok(binding) => binding,
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err),
    };

    if !condition_true(&binding.status.conditions, INJECTION_READY) {
        return Ok(None);
    }

    let Some(secret) = binding.status.binding.as_ref() else {
        return Ok(None);
    };
    let keys = client
        .secret_keys(&secret.name, &client.current_namespace())
        .await?;

    let env_vars = if binding.spec.env.is_empty() {
        keys
    } else {
        binding.spec.env.iter().map(|e| e.name.clone()).collect()
    };
    Ok(Some(ServiceBindingStatus {
        binding_files: vec![],
        binding_env_vars: env_vars,
    }))
}

/// True when every binding targeting the component's Deployment reports
/// injection readiness. Vacuously true when the Deployment does not exist
/// yet (nothing can be bound to it) or when the binding kinds are not
/// registered on the cluster (there are no bindings to wait for).
pub async fn all_injections_ready(
    client: &dyn ClusterClient,
    component_name: &str,
    app: &str,
) -> Result<bool, ClusterError> {
    let selector = labels::selector(component_name, app, None);
    let deployment_name = match client.get_deployment_name(&selector).await {
        Ok(name) => name,
        Err(err) if err.is_not_found() => return Ok(true),
        Err(err) => return Err(err),
    };

    let (spec_bindings, operator_bindings) = match client.list_bindings_from_all_groups().await {
        Ok(lists) => lists,
        Err(ClusterError::KindNotRegistered(kind)) => {
            debug!("binding kind {} not registered, nothing to wait for", kind);
            return Ok(true);
        }
        Err(err) => return Err(err),
    };

    for binding in &operator_bindings {
        let target = &binding.spec.application;
        if target.group != DEPLOYMENT_GROUP
            || target.version != DEPLOYMENT_VERSION
            || (target.kind != DEPLOYMENT_KIND && target.resource != "deployments")
        {
            continue;
        }
        if target.name != deployment_name {
            continue;
        }
        if !condition_true(&binding.status.conditions, INJECTION_READY) {
            return Ok(false);
        }
    }

    for binding in &spec_bindings {
        let workload = &binding.spec.workload;
        if workload.api_version != format!("{}/{}", DEPLOYMENT_GROUP, DEPLOYMENT_VERSION)
            || workload.kind != DEPLOYMENT_KIND
        {
            continue;
        }
        if workload.name != deployment_name {
            continue;
        }
        if !condition_true(&binding.status.conditions, INJECTION_READY) {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Bindable service instances visible in the namespace, keyed by their
/// display name. Sources that answer NotFound or Forbidden (a namespace
/// mid-deletion, a kind the user cannot list) contribute zero instances
/// instead of failing the scan.
pub async fn service_instances(
    client: &dyn ClusterClient,
    namespace: &str,
) -> Result<BTreeMap<String, ServiceInstance>, Error> {
    if !client.is_binding_operator_installed().await? {
        bail!(
            "Service Binding Operator is not installed on the cluster, \
             please ensure it is installed before listing bindable services"
        );
    }

    let refs = client.bindable_kind_refs().await?;
    let mut instances = BTreeMap::new();
    for resource in &refs {
        let found = match client.list_service_instances(namespace, resource).await {
            Ok(found) => found,
            Err(err @ (ClusterError::NotFound { .. } | ClusterError::Forbidden(_))) => {
                debug!("skipping bindable kind {}: {}", resource.kind, err);
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        for instance in found {
            instances.insert(instance.display_key(), instance);
        }
    }
    Ok(instances)
}
