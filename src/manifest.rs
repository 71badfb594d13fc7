//! OCI manifest and image configuration, as stored by the content store
//!
//! Reference: <https://github.com/opencontainers/image-spec/blob/main/config.md>

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An image manifest: the config blob and the layers, bottom-most first
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Manifest {
    pub config: Link,
    pub layers: Vec<Link>,
}

/// A content descriptor pointing at a blob in the content store
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Link {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub size: u64,
    pub digest: String,
}

pub mod media_types {
    pub const MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
    pub const RUNTIME_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
    pub const LAYER_TAR_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
}

/// The parsed image configuration blob
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub created: Option<DateTime<Utc>>,
    pub author: String,
    pub architecture: String,
    pub os: String,
    pub config: ImageConfig,
    pub rootfs: Filesystem,
    pub history: Vec<HistoryEntry>,
}

/// Execution defaults for containers created from an image
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ImageConfig {
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Env")]
    pub env: Vec<String>,
    #[serde(rename = "Cmd")]
    pub cmd: Vec<String>,
    #[serde(rename = "WorkingDir")]
    pub working_dir: String,
    #[serde(rename = "Entrypoint")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(rename = "Labels")]
    pub labels: Option<std::collections::BTreeMap<String, String>>,
}

pub const FS_TYPE: &str = "layers";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Filesystem {
    #[serde(rename = "type")]
    pub fs_type: String,
    pub diff_ids: Vec<String>,
}

/// One build step, which may or may not have produced a layer
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HistoryEntry {
    pub created: Option<DateTime<Utc>>,
    pub created_by: String,
    pub author: String,
    pub comment: String,
    pub empty_layer: bool,
}
