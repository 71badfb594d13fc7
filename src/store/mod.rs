//! In-memory index of image references over the content store
//!
//! Every image is keyed by its [ContentDigest]. Each image has a list of
//! references, and every reference remembers the primary reference it was
//! registered for. A primary reference is its own primary; searchable
//! aliases point at the primary they were derived from. Removing a primary
//! takes its aliases with it, so an image with any references left always
//! has at least one primary.
//!
//! All state lives behind one lock. Each operation takes the lock once, so
//! compound updates are never observed half done.


use crate::{
    errors::ImageError,
    image::{ContentDigest, Reference},
    manifest::RuntimeConfig,
};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Cached facts about one image, as loaded from the content store
#[derive(Clone, Debug, PartialEq)]
pub struct ImageMetadata {
    pub id: ContentDigest,
    pub size: u64,
    pub config: RuntimeConfig,
}

/// One reference registered for an image
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceEntry {
    pub reference: Reference,
    /// The primary reference this entry belongs to
    pub primary: Reference,
}

impl ReferenceEntry {
    pub fn is_primary(&self) -> bool {
        self.reference == self.primary
    }
}

#[derive(Default)]
struct StoreState {
    // Entries keep insertion order
    refs_by_id: HashMap<ContentDigest, Vec<ReferenceEntry>>,
    id_by_ref: HashMap<Reference, ContentDigest>,
    metadata: HashMap<ContentDigest, ImageMetadata>,
}

impl StoreState {
    fn entry(&self, id: &ContentDigest, reference: &Reference) -> Option<&ReferenceEntry> {
        self.refs_by_id
            .get(id)
            .and_then(|entries| entries.iter().find(|e| &e.reference == reference))
    }

    fn has_primary(&self, id: &ContentDigest, reference: &Reference) -> bool {
        self.entry(id, reference)
            .map(ReferenceEntry::is_primary)
            .unwrap_or(false)
    }

    fn insert(&mut self, id: &ContentDigest, reference: &Reference, primary: &Reference) {
        self.refs_by_id
            .entry(id.clone())
            .or_insert_with(Vec::new)
            .push(ReferenceEntry {
                reference: reference.clone(),
                primary: primary.clone(),
            });
        self.id_by_ref.insert(reference.clone(), id.clone());
    }

    fn promote(&mut self, id: &ContentDigest, reference: &Reference) {
        if let Some(entries) = self.refs_by_id.get_mut(id) {
            for entry in entries.iter_mut() {
                if &entry.reference == reference {
                    entry.primary = reference.clone();
                }
            }
        }
    }

    fn remove(&mut self, id: &ContentDigest, reference: &Reference) {
        if self.id_by_ref.get(reference) != Some(id) {
            return;
        }
        let was_primary = self.has_primary(id, reference);
        let entries = match self.refs_by_id.get_mut(id) {
            Some(entries) => entries,
            None => return,
        };
        let (removed, kept): (Vec<ReferenceEntry>, Vec<ReferenceEntry>) =
            entries.drain(..).partition(|e| {
                &e.reference == reference || (was_primary && &e.primary == reference)
            });
        *entries = kept;
        if entries.is_empty() {
            self.refs_by_id.remove(id);
        }
        for entry in removed {
            log::debug!("removing reference {} from image {}", entry.reference, id);
            self.id_by_ref.remove(&entry.reference);
        }
    }

    fn search_id_prefix(&self, prefix: &str) -> Result<Option<ContentDigest>, ImageError> {
        let mut matches = self
            .refs_by_id
            .keys()
            .filter(|id| id.matches_id_prefix(prefix));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(Some(id.clone())),
            (Some(_), Some(_)) => Err(ImageError::AmbiguousReference(prefix.to_owned())),
            (None, _) => Ok(None),
        }
    }
}

/// Thread-safe index of references and cached image metadata
#[derive(Default)]
pub struct ReferenceStore {
    state: RwLock<StoreState>,
}

impl ReferenceStore {
    pub fn new() -> Self {
        ReferenceStore::default()
    }

    /// Register `stored` as a reference to the image `id`
    ///
    /// When `candidate` equals `stored`, the new reference is primary.
    /// Otherwise it is a searchable alias of `candidate`, which must already
    /// be a primary reference of the same image.
    ///
    /// A primary reference that currently names a different image is moved
    /// to this one, along with the loss of its aliases on the old image. The
    /// displaced image ID is returned so the caller can evict its metadata
    /// if that image has no primary references left. An alias can't be moved
    /// this way; it fails with [ImageError::Conflict].
    pub fn add_reference(
        &self,
        id: &ContentDigest,
        candidate: &Reference,
        stored: &Reference,
    ) -> Result<Option<ContentDigest>, ImageError> {
        let mut state = self.state.write();
        let primary = candidate == stored;
        if !primary && !state.has_primary(id, candidate) {
            return Err(ImageError::NotFound(format!(
                "primary reference {} for image {}",
                candidate, id
            )));
        }
        match state.id_by_ref.get(stored).cloned() {
            Some(existing) if &existing == id => {
                if primary && !state.has_primary(id, stored) {
                    log::debug!("promoting {} to a primary reference of {}", stored, id);
                    state.promote(id, stored);
                }
                Ok(None)
            }
            Some(existing) if primary => {
                log::info!("moving reference {} from image {} to {}", stored, existing, id);
                state.remove(&existing, stored);
                state.insert(id, stored, stored);
                Ok(Some(existing))
            }
            Some(existing) => Err(ImageError::Conflict(format!(
                "reference {} already refers to image {}",
                stored, existing
            ))),
            None => {
                log::debug!("adding reference {} to image {}", stored, id);
                state.insert(id, stored, candidate);
                Ok(None)
            }
        }
    }

    /// Remove a reference from an image, if it is registered there
    ///
    /// Removing a primary reference also removes the aliases derived from
    /// it. Metadata is left alone; see [ReferenceStore::evict_if_unreferenced].
    pub fn remove_reference(&self, id: &ContentDigest, reference: &Reference) {
        self.state.write().remove(id, reference);
    }

    /// Find the image a reference names
    ///
    /// Tries, in order: an exact reference match, a full or abbreviated image
    /// ID, and for name-only references the same name with the default tag.
    /// Returns the image ID and the reference that actually matched.
    pub fn search(&self, reference: &Reference) -> Result<(ContentDigest, Reference), ImageError> {
        let state = self.state.read();
        if let Some(id) = state.id_by_ref.get(reference) {
            return Ok((id.clone(), reference.clone()));
        }
        if let Some(id) = state.search_id_prefix(reference.as_str())? {
            return Ok((id, reference.clone()));
        }
        if reference.is_name_only() {
            let tagged = reference.with_default_tag_if_missing();
            if let Some(id) = state.id_by_ref.get(&tagged) {
                return Ok((id.clone(), tagged));
            }
        }
        Err(ImageError::NotFound(format!("image {}", reference)))
    }

    /// The primary reference a registered reference belongs to
    pub fn get_primary_reference(&self, reference: &Reference) -> Result<Reference, ImageError> {
        let state = self.state.read();
        state
            .id_by_ref
            .get(reference)
            .and_then(|id| state.entry(id, reference))
            .map(|entry| entry.primary.clone())
            .ok_or_else(|| ImageError::NotFound(format!("reference {}", reference)))
    }

    /// Primary references of an image, in the order they were added
    pub fn get_primary_references(&self, id: &ContentDigest) -> Vec<Reference> {
        match self.state.read().refs_by_id.get(id) {
            Some(entries) => entries
                .iter()
                .filter(|e| e.is_primary())
                .map(|e| e.reference.clone())
                .collect(),
            None => vec![],
        }
    }

    /// Every reference of an image, primary or not, in the order they were
    /// added
    pub fn get_references(&self, id: &ContentDigest) -> Vec<Reference> {
        match self.state.read().refs_by_id.get(id) {
            Some(entries) => entries.iter().map(|e| e.reference.clone()).collect(),
            None => vec![],
        }
    }

    /// Images with at least one reference
    pub fn image_ids(&self) -> Vec<ContentDigest> {
        let mut ids: Vec<ContentDigest> = self.state.read().refs_by_id.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn cache_metadata(&self, id: &ContentDigest, metadata: ImageMetadata) {
        self.state.write().metadata.insert(id.clone(), metadata);
    }

    pub fn get_metadata(&self, id: &ContentDigest) -> Result<ImageMetadata, ImageError> {
        self.state
            .read()
            .metadata
            .get(id)
            .cloned()
            .ok_or_else(|| ImageError::NotFound(format!("cached metadata for image {}", id)))
    }

    pub fn evict_metadata(&self, id: &ContentDigest) {
        if self.state.write().metadata.remove(id).is_some() {
            log::debug!("evicted cached metadata for image {}", id);
        }
    }

    /// Evict an image's metadata if it has no primary references left
    ///
    /// Returns true if the image is now unreferenced.
    pub fn evict_if_unreferenced(&self, id: &ContentDigest) -> bool {
        let mut state = self.state.write();
        let referenced = state
            .refs_by_id
            .get(id)
            .map(|entries| entries.iter().any(ReferenceEntry::is_primary))
            .unwrap_or(false);
        if !referenced && state.metadata.remove(id).is_some() {
            log::debug!("image {} has no primary references, evicted its metadata", id);
        }
        !referenced
    }

    /// All cached metadata, ordered by image ID
    pub fn list_metadata(&self) -> Vec<ImageMetadata> {
        let mut list: Vec<ImageMetadata> = self.state.read().metadata.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }
}
