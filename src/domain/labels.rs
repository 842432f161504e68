//! Label and annotation keys shared with whatever wrote the resources.
//! These are a versioned wire protocol, not configuration: the aggregator
//! can only attribute resources written with exactly these keys.

use std::collections::BTreeMap;

use crate::domain::model::RunningMode;

/// Component identity. Resources without this label cannot be attributed to
/// any component and are skipped.
pub const KUBERNETES_INSTANCE: &str = "app.kubernetes.io/instance";
/// Tool or controller owning the resource; absent on foreign resources.
pub const KUBERNETES_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const KUBERNETES_MANAGED_BY_VERSION: &str = "app.kubernetes.io/managed-by-version";
/// Application a component belongs to.
pub const KUBERNETES_PART_OF: &str = "app.kubernetes.io/part-of";
/// Mode the resource was deployed in (dev, deploy, debug).
pub const MODE: &str = "devrig.dev/mode";
/// Project type of the component, written as an annotation.
pub const PROJECT_TYPE: &str = "devrig.dev/project-type";

type KeyValues = BTreeMap<String, String>;

fn non_empty(map: &KeyValues, key: &str) -> Option<String> {
    map.get(key).filter(|v| !v.is_empty()).cloned()
}

pub fn component_name(labels: &KeyValues) -> Option<String> {
    non_empty(labels, KUBERNETES_INSTANCE)
}

pub fn managed_by(labels: &KeyValues) -> Option<String> {
    non_empty(labels, KUBERNETES_MANAGED_BY)
}

pub fn managed_by_version(labels: &KeyValues) -> Option<String> {
    non_empty(labels, KUBERNETES_MANAGED_BY_VERSION)
}

pub fn mode(labels: &KeyValues) -> Option<RunningMode> {
    non_empty(labels, MODE).and_then(|value| RunningMode::from_label(&value))
}

/// Project type, read from the annotation first and from a label of the
/// same key as a fallback (container engines only carry labels).
pub fn project_type(labels: Option<&KeyValues>, annotations: Option<&KeyValues>) -> Option<String> {
    annotations
        .and_then(|a| non_empty(a, PROJECT_TYPE))
        .or_else(|| labels.and_then(|l| non_empty(l, PROJECT_TYPE)))
}

/// Builds the label selector matching one component of one application,
/// optionally restricted to a single mode.
pub fn selector(name: &str, app: &str, mode: Option<RunningMode>) -> String {
    let mut parts = vec![
        format!("{}={}", KUBERNETES_INSTANCE, name),
        format!("{}={}", KUBERNETES_PART_OF, app),
    ];
    if let Some(mode) = mode {
        parts.push(format!("{}={}", MODE, mode));
    }
    parts.join(",")
}
