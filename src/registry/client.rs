//! Contract for the remote content store client
//!
//! The image manager never talks to a registry or to the content store
//! directly. Everything that moves bytes goes through a [ContentClient],
//! which is expected to be a thin wrapper around the real content store.

use crate::{
    context::Context,
    errors::ImageError,
    image::{ContentDigest, Reference},
    manifest::{Link, Manifest, RuntimeConfig},
    registry::{AuthConfig, ProgressSender},
};
use async_trait::async_trait;
use std::{fmt, sync::Arc};
use tokio::io::AsyncRead;

/// Byte stream used to move image archives in and out of the content store
pub type ImageArchive = Box<dyn AsyncRead + Send + Unpin>;

/// Shared client trait object
pub type DynContentClient = Arc<dyn ContentClient>;

/// An image record as the content store knows it
#[derive(Clone, PartialEq)]
pub struct RemoteImage {
    /// The name the image is recorded under in the content store
    pub name: String,
    /// Descriptor of the image's manifest
    pub target: Link,
    /// Digest of the config blob; this is the image ID
    pub config_digest: ContentDigest,
    /// Total size of the image content in bytes
    pub size: u64,
    /// The parsed config blob
    pub config: RuntimeConfig,
    /// The manifest for the current platform
    pub manifest: Manifest,
}

impl RemoteImage {
    /// Digest of the manifest this image record points at
    pub fn manifest_digest(&self) -> Result<ContentDigest, ImageError> {
        ContentDigest::parse(&self.target.digest)
    }
}

impl fmt::Debug for RemoteImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteImage({} -> {})", self.name, self.config_digest)
    }
}

#[async_trait]
pub trait ContentClient: Send + Sync {
    /// Fetch an image, trying each candidate name in order
    ///
    /// The candidates come from
    /// [DefaultRegistry::lookup_references](crate::registry::DefaultRegistry::lookup_references),
    /// mirrors first. `reference` is fully qualified, and the returned record
    /// is named after it.
    async fn pull_image(
        &self,
        ctx: &Context,
        reference: &Reference,
        candidates: &[String],
        auth: Option<&AuthConfig>,
        progress: ProgressSender,
    ) -> Result<RemoteImage, ImageError>;

    async fn push_image(
        &self,
        ctx: &Context,
        reference: &Reference,
        auth: Option<&AuthConfig>,
        progress: ProgressSender,
    ) -> Result<(), ImageError>;

    /// Look up an image record by the exact name it is stored under
    async fn get_image(&self, ctx: &Context, reference: &Reference)
        -> Result<RemoteImage, ImageError>;

    async fn list_images(&self, ctx: &Context) -> Result<Vec<RemoteImage>, ImageError>;

    async fn remove_image(&self, ctx: &Context, reference: &Reference) -> Result<(), ImageError>;

    /// Record an additional image name pointing at an existing manifest
    async fn create_image_reference(
        &self,
        ctx: &Context,
        name: &Reference,
        target: &Link,
    ) -> Result<(), ImageError>;

    /// Size in bytes of a blob in the content store
    async fn blob_size(&self, ctx: &Context, digest: &ContentDigest) -> Result<u64, ImageError>;

    /// Import every image in an archive, returning the records created
    async fn import_images(
        &self,
        ctx: &Context,
        name: &str,
        archive: ImageArchive,
    ) -> Result<Vec<RemoteImage>, ImageError>;

    async fn export_image(
        &self,
        ctx: &Context,
        reference: &Reference,
    ) -> Result<ImageArchive, ImageError>;
}
