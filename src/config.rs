use anyhow::{Context, Error};
use config::Config;

#[derive(Debug, serde_derive::Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub docker_socket: String,
    pub listen_address: String,
    /// Namespace to inspect; defaults to the one of the kube context.
    pub namespace: Option<String>,
    /// Application the local component belongs to.
    pub app: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            docker_socket: "/var/run/docker.sock".to_string(),
            listen_address: "0.0.0.0:3000".to_string(),
            namespace: None,
            app: "app".to_string(),
        }
    }
}

pub fn load_config() -> Result<AppConfig, Error> {
    let config = Config::builder()
        .add_source(config::Environment::with_prefix("devrig"))
        .build()
        .context("Can't load configuration")?;

    config
        .try_deserialize()
        .context("Can't deserialize AppConfig from loaded configuration")
}
