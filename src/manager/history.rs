//! Image build history, rebuilt from the config blob and manifest layers

use crate::{
    context::Context,
    errors::ImageError,
    image::ContentDigest,
    manager::ImageManager,
    manifest::HistoryEntry,
};
use serde::{Deserialize, Serialize};

/// Placeholder ID for history items other than the newest
pub const MISSING_ID: &str = "<missing>";

/// One build step of an image, newest first
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct HistoryItem {
    #[serde(rename = "ID")]
    pub id: String,
    /// Unix time in nanoseconds, or zero if unknown
    #[serde(rename = "Created")]
    pub created: i64,
    #[serde(rename = "CreatedBy")]
    pub created_by: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Comment")]
    pub comment: String,
    #[serde(rename = "EmptyLayer")]
    pub empty_layer: bool,
    #[serde(rename = "Size")]
    pub size: u64,
}

/// Pair each build step with the size of the layer it produced
///
/// `history` and `layer_sizes` are both ordered bottom-most first, and every
/// history entry that isn't an empty layer must own exactly one layer. The
/// result is ordered newest first. Only the newest item gets a real ID.
pub fn reconstruct_history(
    id: &ContentDigest,
    history: &[HistoryEntry],
    layer_sizes: &[u64],
) -> Result<Vec<HistoryItem>, ImageError> {
    let mut layers = layer_sizes.iter().rev();
    let mut items = Vec::with_capacity(history.len());
    for (i, entry) in history.iter().rev().enumerate() {
        let size = if entry.empty_layer {
            0
        } else {
            match layers.next() {
                Some(size) => *size,
                None => {
                    return Err(ImageError::Integrity(format!(
                        "image {} has fewer manifest layers than non-empty history entries",
                        id
                    )))
                }
            }
        };
        items.push(HistoryItem {
            id: if i == 0 {
                id.to_string()
            } else {
                MISSING_ID.to_owned()
            },
            created: entry
                .created
                .and_then(|created| created.timestamp_nanos_opt())
                .unwrap_or(0),
            created_by: entry.created_by.clone(),
            author: entry.author.clone(),
            comment: entry.comment.clone(),
            empty_layer: entry.empty_layer,
            size,
        });
    }
    if layers.next().is_some() {
        return Err(ImageError::Integrity(format!(
            "image {} has more manifest layers than non-empty history entries",
            id
        )));
    }
    Ok(items)
}

impl ImageManager {
    /// The build history of an image, newest step first
    pub async fn image_history(
        &self,
        ctx: &Context,
        id_or_ref: &str,
    ) -> Result<Vec<HistoryItem>, ImageError> {
        let image = self.fetch_image(ctx, id_or_ref).await?;
        let layers = &image.manifest.layers;
        let diff_ids = &image.config.rootfs.diff_ids;
        if layers.len() != diff_ids.len() {
            return Err(ImageError::Integrity(format!(
                "image {} has {} manifest layers but {} rootfs diff ids",
                image.config_digest,
                layers.len(),
                diff_ids.len()
            )));
        }
        let mut sizes = Vec::with_capacity(layers.len());
        for layer in layers {
            let digest = ContentDigest::parse(&layer.digest)?;
            sizes.push(self.client.blob_size(ctx, &digest).await?);
        }
        reconstruct_history(&image.config_digest, &image.config.history, &sizes)
    }
}
