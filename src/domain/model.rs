use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Literal emitted on the wire when a value was never observed. The model
/// itself keeps `Option<String>`; only the serializer produces this string.
pub const UNKNOWN: &str = "Unknown";

pub fn ser_or_unknown<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.as_deref().unwrap_or(UNKNOWN))
}

pub fn de_unknown<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    if value.is_empty() || value == UNKNOWN {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

/// One of the operational states a component can be observed in. A component
/// can run in several modes at once, hence [`RunningModes`] is a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunningMode {
    Dev,
    Deploy,
    Debug,
}

impl RunningMode {
    /// Parses a mode label value, case-insensitively. Values outside the
    /// known set are ignored by callers.
    pub fn from_label(value: &str) -> Option<RunningMode> {
        match value.to_lowercase().as_str() {
            "dev" => Some(RunningMode::Dev),
            "deploy" => Some(RunningMode::Deploy),
            "debug" => Some(RunningMode::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for RunningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunningMode::Dev => write!(f, "dev"),
            RunningMode::Deploy => write!(f, "deploy"),
            RunningMode::Debug => write!(f, "debug"),
        }
    }
}

pub type RunningModes = BTreeSet<RunningMode>;

/// Where a component was observed running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Cluster,
    Docker,
}

/// A logical unit of deployment, reconstructed from resource labels. The
/// name is the deduplication key: two resources carrying the same instance
/// label are the same component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    #[serde(
        rename = "type",
        serialize_with = "ser_or_unknown",
        deserialize_with = "de_unknown",
        default
    )]
    pub component_type: Option<String>,
    /// Empty means the resource was not created by any known tool.
    #[serde(default)]
    pub managed_by: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub managed_by_version: String,
    #[serde(default)]
    pub running_in: RunningModes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

/// Canonical service binding, independent of which API variant backs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBinding {
    pub name: String,
    pub bind_as_files: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload: Option<BoundWorkload>,
    /// `None` while the binding does not exist on the cluster or is not yet
    /// ready. This is a valid terminal state, not a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceBindingStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundWorkload {
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
}

/// Projection of a ready binding: exactly one of the two lists is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binding_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binding_env_vars: Vec<String>,
}

/// A bindable service instance discovered on the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance {
    pub name: String,
    pub kind: String,
    pub group: String,
}

impl ServiceInstance {
    /// Display key, `<name> (<kind>.<group>)`.
    pub fn display_key(&self) -> String {
        format!("{} ({}.{})", self.name, self.kind, self.group)
    }
}

/// Uniform projection of an Ingress or a Route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionData {
    pub name: String,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub host: String,
    pub paths: Vec<String>,
}

/// Ephemeral record of one forwarded port, persisted in the run state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedPort {
    pub container_name: String,
    pub local_address: String,
    pub local_port: u16,
    pub container_port: u16,
}

/// Minimal project descriptor metadata, either parsed from a local
/// descriptor by an external collaborator or reconstructed from cluster
/// labels. Absent fields serialize as the `"Unknown"` literal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevfileInfo {
    #[serde(serialize_with = "ser_or_unknown", deserialize_with = "de_unknown", default)]
    pub name: Option<String>,
    #[serde(serialize_with = "ser_or_unknown", deserialize_with = "de_unknown", default)]
    pub display_name: Option<String>,
    #[serde(serialize_with = "ser_or_unknown", deserialize_with = "de_unknown", default)]
    pub project_type: Option<String>,
    #[serde(serialize_with = "ser_or_unknown", deserialize_with = "de_unknown", default)]
    pub language: Option<String>,
    #[serde(serialize_with = "ser_or_unknown", deserialize_with = "de_unknown", default)]
    pub version: Option<String>,
    #[serde(serialize_with = "ser_or_unknown", deserialize_with = "de_unknown", default)]
    pub description: Option<String>,
}

impl DevfileInfo {
    /// Component type declared by the descriptor: the project type, or the
    /// language as a fallback.
    pub fn component_type(&self) -> Option<String> {
        self.project_type.clone().or_else(|| self.language.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_component_type_serializes_as_the_unknown_literal() {
        let component = Component {
            name: "app1".to_string(),
            component_type: None,
            managed_by: String::new(),
            managed_by_version: String::new(),
            running_in: RunningModes::from([RunningMode::Dev]),
            platform: Some(Platform::Cluster),
        };
        let value = serde_json::to_value(&component).unwrap();
        assert_eq!(value["type"], "Unknown");
        assert_eq!(value["runningIn"], serde_json::json!(["dev"]));
        assert_eq!(value["platform"], "cluster");

        let back: Component = serde_json::from_value(value).unwrap();
        assert_eq!(back.component_type, None);
    }
}
