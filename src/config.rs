//! Daemon-level settings for the image manager

use crate::{
    errors::ImageError,
    image::{Registry, Repository},
    registry::{DefaultRegistry, DEFAULT_NAMESPACE, DEFAULT_REGISTRY},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Loading the image list at startup gives up after this long
pub const DEFAULT_BOOTSTRAP_DEADLINE: Duration = Duration::from_secs(600);

/// Image manager configuration, as found in the daemon's config file
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    pub default_registry: String,
    /// Namespace for single-component names on the default registry. Empty
    /// disables the namespace.
    pub default_registry_namespace: String,
    pub registry_mirrors: Vec<String>,
    pub bootstrap_deadline_secs: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            default_registry: DEFAULT_REGISTRY.to_owned(),
            default_registry_namespace: DEFAULT_NAMESPACE.to_owned(),
            registry_mirrors: vec![],
            bootstrap_deadline_secs: DEFAULT_BOOTSTRAP_DEADLINE.as_secs(),
        }
    }
}

impl ManagerConfig {
    /// Parse a JSON config, taking defaults for any missing field
    ///
    /// ```
    /// # use imagemgr::ManagerConfig;
    /// let config = ManagerConfig::from_json(r#"{"registry_mirrors": ["mirror.example.com"]}"#).unwrap();
    /// assert_eq!(config.default_registry, "registry.hub.docker.com");
    /// assert_eq!(config.registry_mirrors, vec!["mirror.example.com"]);
    /// ```
    pub fn from_json(text: &str) -> Result<Self, ImageError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validate the registry settings
    pub fn registry(&self) -> Result<DefaultRegistry, ImageError> {
        let network_name = Registry::parse(&self.default_registry)?;
        let library_prefix = if self.default_registry_namespace.is_empty() {
            None
        } else {
            Some(Repository::parse(&self.default_registry_namespace)?)
        };
        Ok(DefaultRegistry {
            network_name,
            mirrors: self.registry_mirrors.clone(),
            library_prefix,
        })
    }

    pub fn bootstrap_deadline(&self) -> Duration {
        Duration::from_secs(self.bootstrap_deadline_secs)
    }
}
