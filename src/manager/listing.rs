//! Image details and filtered listing

use crate::{
    context::Context,
    errors::ImageError,
    image::{ContentDigest, ReferenceKind},
    manager::{
        filter::{ImageFilter, ReferencePattern},
        ImageManager,
    },
    manifest::ImageConfig,
    registry::DefaultRegistry,
    store::ImageMetadata,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one local image, as reported to API clients
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ImageInfo {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "RepoTags")]
    pub repo_tags: Vec<String>,
    #[serde(rename = "RepoDigests")]
    pub repo_digests: Vec<String>,
    #[serde(rename = "Architecture")]
    pub architecture: String,
    #[serde(rename = "Os")]
    pub os: String,
    /// RFC 3339, empty if the image has no creation time
    #[serde(rename = "CreatedAt")]
    pub created_at: String,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "Config")]
    pub config: ImageConfig,
    #[serde(rename = "RootFS")]
    pub rootfs: ImageRootFs,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ImageRootFs {
    #[serde(rename = "Type")]
    pub fs_type: String,
    #[serde(rename = "Layers")]
    pub layers: Vec<String>,
}

/// Keep only the references matching at least one pattern
fn filter_references(
    patterns: &[ReferencePattern],
    default_registry: &DefaultRegistry,
    references: Vec<String>,
) -> Vec<String> {
    if patterns.is_empty() {
        return references;
    }
    references
        .into_iter()
        .filter(|reference| {
            patterns
                .iter()
                .any(|pattern| pattern.matches_familiar(default_registry, reference))
        })
        .collect()
}

/// Is `created` strictly between the `since` and `before` bounds?
pub(super) fn created_between(
    created: Option<DateTime<Utc>>,
    since: Option<Option<DateTime<Utc>>>,
    before: Option<Option<DateTime<Utc>>>,
) -> bool {
    before.map(|before| created < before).unwrap_or(true)
        && since.map(|since| created > since).unwrap_or(true)
}

impl ImageManager {
    /// Look up an image by ID, short ID, or reference
    pub async fn get_image(&self, ctx: &Context, id_or_ref: &str) -> Result<ImageInfo, ImageError> {
        let resolved = self.check_reference(ctx, id_or_ref)?;
        self.image_info(&resolved.id)
    }

    fn image_info(&self, id: &ContentDigest) -> Result<ImageInfo, ImageError> {
        let metadata = self.store.get_metadata(id)?;
        Ok(self.metadata_to_info(metadata))
    }

    fn metadata_to_info(&self, metadata: ImageMetadata) -> ImageInfo {
        let mut repo_tags = vec![];
        let mut repo_digests = vec![];
        for reference in self.store.get_references(&metadata.id) {
            match reference.kind() {
                ReferenceKind::Tagged => repo_tags.push(reference.to_string()),
                ReferenceKind::CanonicalDigested => repo_digests.push(reference.to_string()),
                _ => (),
            }
        }
        let ImageMetadata { id, size, config } = metadata;
        ImageInfo {
            id: id.to_string(),
            repo_tags,
            repo_digests,
            architecture: config.architecture,
            os: config.os,
            created_at: config
                .created
                .map(|created| created.to_rfc3339_opts(SecondsFormat::Nanos, true))
                .unwrap_or_default(),
            size,
            config: config.config,
            rootfs: ImageRootFs {
                fs_type: config.rootfs.fs_type,
                layers: config.rootfs.diff_ids,
            },
        }
    }

    /// Creation time of the image a `before` or `since` filter names
    fn filter_bound(
        &self,
        ctx: &Context,
        image: Option<&String>,
    ) -> Result<Option<Option<DateTime<Utc>>>, ImageError> {
        match image {
            None => Ok(None),
            Some(image) => {
                let resolved = self.check_reference(ctx, image)?;
                Ok(Some(self.store.get_metadata(&resolved.id)?.config.created))
            }
        }
    }

    /// List local images, optionally filtered
    ///
    /// With reference patterns, each image's tags and digests are narrowed to
    /// the ones that match, and images left with neither are dropped.
    pub async fn list_images(
        &self,
        ctx: &Context,
        filter: &ImageFilter,
    ) -> Result<Vec<ImageInfo>, ImageError> {
        let before = self.filter_bound(ctx, filter.before.as_ref())?;
        let since = self.filter_bound(ctx, filter.since.as_ref())?;
        let patterns = filter.reference_patterns()?;

        let mut images = vec![];
        for metadata in self.store.list_metadata() {
            if !created_between(metadata.config.created, since, before) {
                continue;
            }
            if self.store.get_primary_references(&metadata.id).is_empty() {
                log::warn!(
                    "skipping image {} while listing, it has no primary reference",
                    metadata.id
                );
                continue;
            }
            let mut info = self.metadata_to_info(metadata);
            if patterns.is_empty() {
                images.push(info);
                continue;
            }
            info.repo_digests =
                filter_references(&patterns, &self.default_registry, info.repo_digests);
            info.repo_tags = filter_references(&patterns, &self.default_registry, info.repo_tags);
            if !info.repo_tags.is_empty() || !info.repo_digests.is_empty() {
                images.push(info);
            }
        }
        Ok(images)
    }
}
