//! The image manager: name resolution, pull, tag, and removal
//!
//! The manager sits between an API layer and the remote content store
//! client. It owns the [ReferenceStore] which answers every name lookup,
//! and keeps it in step with what the content store holds.

#[cfg(test)]
mod tests;

mod builder;
mod filter;
mod history;
mod listing;

pub use builder::ImageManagerBuilder;
pub use filter::{ImageFilter, ReferencePattern, FILTER_BEFORE, FILTER_REFERENCE, FILTER_SINCE};
pub use history::{reconstruct_history, HistoryItem, MISSING_ID};
pub use listing::{ImageInfo, ImageRootFs};

use crate::{
    context::Context,
    errors::ImageError,
    events::{EventSink, ImageAction, PostPullHook},
    image::{ContentDigest, Reference, Tag},
    manifest::ImageConfig,
    registry::{
        self, AuthConfig, DefaultRegistry, DynContentClient, ImageArchive, ProgressMessage,
        ProgressStream, RemoteImage, SearchResultItem,
    },
    store::{ImageMetadata, ReferenceStore},
};
use reqwest::header::HeaderValue;
use std::{sync::Arc, time::Duration};
use tokio::io::AsyncWrite;

/// Outcome of resolving a user-supplied image name or ID
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedReference {
    /// The image ID
    pub id: ContentDigest,
    /// The reference that matched in the store
    pub actual: Reference,
    /// The image's name of record for that match
    pub primary: Reference,
}

impl ResolvedReference {
    /// Did the lookup name the image itself, rather than one of its names?
    pub fn is_identity(&self) -> bool {
        self.actual.is_name_only() || self.id.as_str().starts_with(self.actual.as_str())
    }
}

/// Image manager for one daemon
pub struct ImageManager {
    default_registry: DefaultRegistry,
    client: DynContentClient,
    store: ReferenceStore,
    events: Arc<dyn EventSink>,
    post_pull: Option<Arc<dyn PostPullHook>>,
    http: reqwest::Client,
    bootstrap_deadline: Duration,
}

/// Do all references share one locator?
fn unique_locator(references: &[Reference]) -> bool {
    match references.split_first() {
        None => true,
        Some((first, rest)) => rest.iter().all(|r| r.locator() == first.locator()),
    }
}

/// Parse the target of a tag operation, which may not carry a digest
fn parse_tag_reference(target: &str) -> Result<Reference, ImageError> {
    let reference = Reference::parse(target)
        .map_err(|err| ImageError::InvalidParam(err.to_string()))?
        .with_default_tag_if_missing();
    if reference.is_digested() {
        return Err(ImageError::InvalidParam(format!(
            "target tag reference {} can't contain a digest",
            reference
        )));
    }
    Ok(reference)
}

/// Report a failure on the progress stream, then close it
async fn finish_progress<T>(
    stream: ProgressStream,
    result: Result<T, ImageError>,
) -> Result<T, ImageError> {
    match result {
        Ok(value) => {
            stream.close().await?;
            Ok(value)
        }
        Err(err) => {
            stream.write(ProgressMessage::from_error(&err)).await;
            if let Err(close_err) = stream.close().await {
                log::warn!("failed to close progress stream: {}", close_err);
            }
            Err(err)
        }
    }
}

impl ImageManager {
    /// Start configuring a new image manager
    pub fn builder() -> ImageManagerBuilder {
        ImageManagerBuilder::new()
    }

    /// Return the default `User-Agent` used for registry searches
    pub fn default_user_agent() -> HeaderValue {
        static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
        HeaderValue::from_static(USER_AGENT)
    }

    pub fn default_registry(&self) -> &DefaultRegistry {
        &self.default_registry
    }

    /// The local reference index
    pub fn store(&self) -> &ReferenceStore {
        &self.store
    }

    /// Fully qualified names a partial reference may refer to, in the order
    /// they should be tried
    pub fn lookup_image_references(&self, reference: &str) -> Vec<String> {
        self.default_registry.lookup_references(reference)
    }

    /// Resolve an image ID, short ID, or reference
    ///
    /// The input is first looked up as given, since it may be an ID. On a
    /// miss it is looked up again with the default registry and namespace
    /// added.
    pub fn check_reference(
        &self,
        _ctx: &Context,
        id_or_ref: &str,
    ) -> Result<ResolvedReference, ImageError> {
        let reference = Reference::parse(id_or_ref)?;
        let (id, actual) = match self.store.search(&reference) {
            Ok(found) => found,
            Err(err) if err.is_not_found() => {
                let qualified = self.default_registry.qualify(id_or_ref);
                if qualified == id_or_ref {
                    return Err(err);
                }
                self.store.search(&Reference::parse(&qualified)?)?
            }
            Err(err) => return Err(err),
        };

        let identity = actual.is_name_only() || id.as_str().starts_with(actual.as_str());
        let primary = if identity {
            match self.store.get_primary_references(&id).into_iter().next() {
                Some(primary) => primary,
                None => {
                    log::error!("image {} is referenced but has no primary reference", id);
                    return Err(ImageError::NotFound(format!(
                        "primary reference for image {}",
                        id
                    )));
                }
            }
        } else {
            self.store.get_primary_reference(&actual)?
        };
        Ok(ResolvedReference {
            id,
            actual,
            primary,
        })
    }

    /// Primary references of an image
    pub fn list_references(&self, _ctx: &Context, id: &ContentDigest) -> Vec<Reference> {
        self.store.get_primary_references(id)
    }

    /// Resolve a name locally, then fetch the content store's record for it
    async fn fetch_image(&self, ctx: &Context, id_or_ref: &str) -> Result<RemoteImage, ImageError> {
        let resolved = self.check_reference(ctx, id_or_ref)?;
        self.client.get_image(ctx, &resolved.primary).await
    }

    /// Runtime configuration of an image, straight from the content store
    pub async fn get_oci_image_config(
        &self,
        ctx: &Context,
        image: &str,
    ) -> Result<ImageConfig, ImageError> {
        let reference = Reference::parse(image)?;
        Ok(self.client.get_image(ctx, &reference).await?.config.config)
    }

    /// Pull an image, reporting progress as JSON lines on `out`
    ///
    /// Untagged names mean the default tag, and a digest takes precedence
    /// over a tag. The progress stream is closed before this returns, with a
    /// final error message if the pull failed. Cancelling `ctx` aborts the
    /// transfer.
    pub async fn pull_image<W>(
        &self,
        ctx: &Context,
        reference: &str,
        auth: Option<&AuthConfig>,
        out: W,
    ) -> Result<(), ImageError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let target = Reference::parse(reference)?;
        let candidates = self.lookup_image_references(reference);
        let target = target.with_default_tag_if_missing().trim_tag_for_digest();
        // The content store records the image under its fully qualified name
        let target = Reference::parse(&self.default_registry.qualify(target.as_str()))?;
        log::info!("pulling {} from {:?}", target, candidates);

        let pull_ctx = ctx.child();
        let stream = ProgressStream::new(out);
        let result = tokio::select! {
            result = self.client.pull_image(&pull_ctx, &target, &candidates, auth, stream.sender()) => result,
            _ = pull_ctx.cancelled() => Err(ImageError::Cancelled),
        };
        let result = finish_progress(stream, result).await;
        pull_ctx.cancel();
        let image = result?;

        // The snapshotter selection must not leak past the pull itself
        let ctx = ctx.clean_snapshotter();
        if let Some(hook) = &self.post_pull {
            if let Err(err) = hook
                .post_pull(&ctx, ctx.current_snapshotter(), &image)
                .await
            {
                log::error!("post pull hook failed for {}: {}", image.name, err);
                return Err(err);
            }
        }

        self.store_image_reference(&image)?;
        self.events
            .log(&ctx, &image.name, target.as_str(), ImageAction::Pull);
        Ok(())
    }

    /// Push an image, reporting progress as JSON lines on `out`
    ///
    /// An empty or missing `tag` pushes the name as given, with the default
    /// tag if it has neither tag nor digest.
    pub async fn push_image<W>(
        &self,
        ctx: &Context,
        name: &str,
        tag: Option<&str>,
        auth: Option<&AuthConfig>,
        out: W,
    ) -> Result<(), ImageError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let reference = Reference::parse(name)?;
        let reference = match tag {
            Some(tag) if !tag.is_empty() => reference.with_tag(&Tag::parse(tag)?),
            _ => reference.with_default_tag_if_missing(),
        };
        log::info!("pushing {}", reference);

        let stream = ProgressStream::new(out);
        let result = tokio::select! {
            result = self.client.push_image(ctx, &reference, auth, stream.sender()) => result,
            _ = ctx.cancelled() => Err(ImageError::Cancelled),
        };
        finish_progress(stream, result).await?;
        self.events
            .log(ctx, reference.as_str(), name, ImageAction::Push);
        Ok(())
    }

    /// Add a name to an existing image
    ///
    /// The new name is a primary reference in its own right, recorded both
    /// here and in the content store, so it outlives the source name.
    pub async fn add_tag(&self, ctx: &Context, source: &str, target: &str) -> Result<(), ImageError> {
        let tag_ref = parse_tag_reference(&self.default_registry.qualify(target))?;
        self.validate_tag_reference(&tag_ref)?;

        let image = self.fetch_image(ctx, source).await?;
        self.add_references(&image.config_digest, &tag_ref, &image.manifest_digest()?)?;
        self.client
            .create_image_reference(ctx, &tag_ref, &image.target)
            .await?;
        self.events
            .log(ctx, tag_ref.as_str(), source, ImageAction::Tag);
        Ok(())
    }

    /// A tag may not take over a name which is already some image's primary
    /// reference
    fn validate_tag_reference(&self, reference: &Reference) -> Result<(), ImageError> {
        match self.store.get_primary_reference(reference) {
            Ok(primary) if &primary == reference => Err(ImageError::InvalidParam(format!(
                "tag reference {} is already in use",
                reference
            ))),
            _ => Ok(()),
        }
    }

    /// Remove an image, or one name of an image
    ///
    /// Naming the image by ID removes every primary reference, which
    /// requires `force` if they don't all share one locator. Naming it by
    /// reference removes only that reference, and only touches the content
    /// store if it was a primary reference. There is no rollback: a failure
    /// part way leaves the earlier steps done.
    pub async fn remove_image(
        &self,
        ctx: &Context,
        id_or_ref: &str,
        force: bool,
    ) -> Result<(), ImageError> {
        let resolved = self.check_reference(ctx, id_or_ref)?;
        let result = self.remove_resolved(ctx, id_or_ref, &resolved, force).await;
        if self.store.evict_if_unreferenced(&resolved.id) {
            log::info!("image {} has no names left", resolved.id);
        }
        result
    }

    async fn remove_resolved(
        &self,
        ctx: &Context,
        id_or_ref: &str,
        resolved: &ResolvedReference,
        force: bool,
    ) -> Result<(), ImageError> {
        let id = &resolved.id;
        if resolved.is_identity() {
            let primaries = self.store.get_primary_references(id);
            if !force && !unique_locator(&primaries) {
                let names: Vec<&str> = primaries.iter().map(Reference::as_str).collect();
                return Err(ImageError::Conflict(format!(
                    "unable to remove image {:?} without force, it is referenced by {}",
                    id_or_ref,
                    names.join(", ")
                )));
            }
            for reference in &primaries {
                self.client.remove_image(ctx, reference).await?;
                self.store.remove_reference(id, reference);
                self.events
                    .log(ctx, reference.as_str(), id_or_ref, ImageAction::Delete);
            }
            return Ok(());
        }

        let named = resolved.actual.trim_tag_for_digest();
        if named == resolved.primary {
            self.client.remove_image(ctx, &named).await?;
            self.store.remove_reference(id, &named);
            self.events
                .log(ctx, named.as_str(), id_or_ref, ImageAction::Delete);
        } else {
            self.store.remove_reference(id, &named);
            self.events
                .log(ctx, named.as_str(), named.as_str(), ImageAction::Untag);
        }
        Ok(())
    }

    /// Register a primary reference and, for a tagged reference, its
    /// `name@digest` alias
    fn add_references(
        &self,
        id: &ContentDigest,
        reference: &Reference,
        manifest: &ContentDigest,
    ) -> Result<(), ImageError> {
        if let Some(displaced) = self.store.add_reference(id, reference, reference)? {
            if self.store.evict_if_unreferenced(&displaced) {
                log::info!("image {} lost its last name to {}", displaced, reference);
            }
        }
        if reference.is_tagged() {
            let alias = reference.with_digest(manifest);
            match self.store.add_reference(id, reference, &alias) {
                Ok(_) => (),
                Err(err) if err.is_conflict() => {
                    log::warn!("not adding alias {} for image {}: {}", alias, id, err)
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Record an image from the content store in the local index
    ///
    /// Metadata is cached only once every reference is in place.
    pub fn store_image_reference(&self, image: &RemoteImage) -> Result<(), ImageError> {
        let reference = Reference::parse(&image.name)?;
        self.add_references(&image.config_digest, &reference, &image.manifest_digest()?)?;
        self.store.cache_metadata(
            &image.config_digest,
            ImageMetadata {
                id: image.config_digest.clone(),
                size: image.size,
                config: image.config.clone(),
            },
        );
        Ok(())
    }

    /// Load every image the content store knows about
    ///
    /// Runs once when the manager is built. Images that can't be indexed are
    /// logged and skipped.
    pub async fn bootstrap(&self) -> Result<(), ImageError> {
        let ctx = Context::new();
        let images =
            match tokio::time::timeout(self.bootstrap_deadline, self.client.list_images(&ctx))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    ctx.cancel();
                    return Err(ImageError::BootstrapTimeout(self.bootstrap_deadline));
                }
            };
        let mut loaded = 0;
        for image in &images {
            match self.store_image_reference(image) {
                Ok(()) => loaded += 1,
                Err(err) => log::warn!("failed to load image {:?} into the local store: {}", image, err),
            }
        }
        log::info!("loaded {} of {} images", loaded, images.len());
        Ok(())
    }

    /// Search a registry for repositories
    pub async fn search_images(
        &self,
        ctx: &Context,
        term: &str,
        registry: Option<&str>,
        auth: Option<&AuthConfig>,
    ) -> Result<Vec<SearchResultItem>, ImageError> {
        tokio::select! {
            result = registry::search_images(&self.http, &self.default_registry, term, registry, auth) => result,
            _ = ctx.cancelled() => Err(ImageError::Cancelled),
        }
    }

    /// Import images from an archive and index them
    pub async fn load_image(
        &self,
        ctx: &Context,
        name: &str,
        archive: ImageArchive,
    ) -> Result<(), ImageError> {
        let images = self.client.import_images(ctx, name, archive).await?;
        for image in &images {
            self.store_image_reference(image)?;
            self.events.log(ctx, &image.name, name, ImageAction::Load);
        }
        Ok(())
    }

    /// Export an image as an archive
    pub async fn save_image(&self, ctx: &Context, id_or_ref: &str) -> Result<ImageArchive, ImageError> {
        let resolved = self.check_reference(ctx, id_or_ref)?;
        self.client.export_image(ctx, &resolved.primary).await
    }
}
