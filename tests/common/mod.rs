//! In-memory content store shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use imagemgr::{
    context::Context,
    events::{EventSink, ImageAction, PostPullHook},
    image::{ContentDigest, Reference},
    manifest::{media_types, Filesystem, HistoryEntry, Link, Manifest, RuntimeConfig, FS_TYPE},
    registry::{ContentClient, ImageArchive, ProgressMessage, ProgressSender, RemoteImage},
    AuthConfig, ImageError, ImageManager,
};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap},
    io::Cursor,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

pub const CAPTURE_BUFFER: usize = 64 * 1024;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build an image with one non-empty history step per layer
pub fn image(name: &str, seed: &str, created_secs: i64, layer_sizes: &[u64]) -> RemoteImage {
    let history = layer_sizes
        .iter()
        .enumerate()
        .map(|(i, _)| (format!("RUN step {}", i), false))
        .collect::<Vec<_>>();
    image_with_history(name, seed, created_secs, layer_sizes, &history)
}

pub fn image_with_history(
    name: &str,
    seed: &str,
    created_secs: i64,
    layer_sizes: &[u64],
    history: &[(String, bool)],
) -> RemoteImage {
    let created = Utc.timestamp_opt(created_secs, 0).unwrap();
    let layers: Vec<Link> = layer_sizes
        .iter()
        .enumerate()
        .map(|(i, size)| Link {
            media_type: media_types::LAYER_TAR_GZIP.to_owned(),
            size: *size,
            digest: layer_digest(seed, i).to_string(),
        })
        .collect();
    let config = RuntimeConfig {
        created: Some(created),
        author: "tests".to_owned(),
        architecture: "amd64".to_owned(),
        os: "linux".to_owned(),
        rootfs: Filesystem {
            fs_type: FS_TYPE.to_owned(),
            diff_ids: (0..layer_sizes.len())
                .map(|i| ContentDigest::from_content(format!("{} diff {}", seed, i).as_bytes()))
                .map(|d| d.to_string())
                .collect(),
        },
        history: history
            .iter()
            .map(|(created_by, empty_layer)| HistoryEntry {
                created: Some(created),
                created_by: created_by.clone(),
                empty_layer: *empty_layer,
                ..HistoryEntry::default()
            })
            .collect(),
        ..RuntimeConfig::default()
    };
    let config_digest = config_digest(seed);
    RemoteImage {
        name: name.to_owned(),
        target: Link {
            media_type: media_types::MANIFEST.to_owned(),
            size: 512,
            digest: manifest_digest(seed).to_string(),
        },
        size: layer_sizes.iter().sum(),
        manifest: Manifest {
            config: Link {
                media_type: media_types::RUNTIME_CONFIG.to_owned(),
                size: 256,
                digest: config_digest.to_string(),
            },
            layers,
        },
        config_digest,
        config,
    }
}

pub fn config_digest(seed: &str) -> ContentDigest {
    ContentDigest::from_content(format!("{} config", seed).as_bytes())
}

pub fn manifest_digest(seed: &str) -> ContentDigest {
    ContentDigest::from_content(format!("{} manifest", seed).as_bytes())
}

pub fn layer_digest(seed: &str, index: usize) -> ContentDigest {
    ContentDigest::from_content(format!("{} layer {}", seed, index).as_bytes())
}

/// A fake content store with a fake registry behind it
#[derive(Default)]
pub struct FakeContentStore {
    /// Image records, by name
    images: Mutex<BTreeMap<String, RemoteImage>>,
    /// Images available to pull, by fully qualified candidate name
    registry: Mutex<HashMap<String, RemoteImage>>,
    blobs: Mutex<HashMap<ContentDigest, u64>>,
    pulls: Mutex<Vec<(String, Vec<String>)>>,
    pushes: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
    hang_pulls: AtomicBool,
    hang_listing: AtomicBool,
}

impl FakeContentStore {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeContentStore::default())
    }

    fn add_blobs(&self, image: &RemoteImage) {
        let mut blobs = self.blobs.lock();
        for layer in &image.manifest.layers {
            blobs.insert(ContentDigest::parse(&layer.digest).unwrap(), layer.size);
        }
    }

    /// Put an image record straight into the content store
    pub fn insert(&self, image: RemoteImage) {
        self.add_blobs(&image);
        self.images.lock().insert(image.name.clone(), image);
    }

    /// Make an image available to pull under a candidate name
    pub fn publish(&self, candidate: &str, image: RemoteImage) {
        self.registry.lock().insert(candidate.to_owned(), image);
    }

    pub fn forget_blob(&self, digest: &ContentDigest) {
        self.blobs.lock().remove(digest);
    }

    pub fn hang_pulls(&self) {
        self.hang_pulls.store(true, Ordering::SeqCst);
    }

    pub fn hang_listing(&self) {
        self.hang_listing.store(true, Ordering::SeqCst);
    }

    pub fn image_names(&self) -> Vec<String> {
        self.images.lock().keys().cloned().collect()
    }

    pub fn pulls(&self) -> Vec<(String, Vec<String>)> {
        self.pulls.lock().clone()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.pushes.lock().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().clone()
    }
}

#[async_trait]
impl ContentClient for FakeContentStore {
    async fn pull_image(
        &self,
        ctx: &Context,
        reference: &Reference,
        candidates: &[String],
        _auth: Option<&AuthConfig>,
        progress: ProgressSender,
    ) -> Result<RemoteImage, ImageError> {
        self.pulls
            .lock()
            .push((reference.to_string(), candidates.to_vec()));
        progress
            .send(ProgressMessage::status(reference.as_str(), "Pulling"))
            .await;
        if self.hang_pulls.load(Ordering::SeqCst) {
            ctx.cancelled().await;
            return Err(ImageError::Cancelled);
        }
        let found = candidates
            .iter()
            .find_map(|candidate| self.registry.lock().get(candidate).cloned());
        let mut image = match found {
            Some(image) => image,
            None => return Err(ImageError::RemoteNotFound(reference.to_string())),
        };
        image.name = reference.to_string();
        progress
            .send(ProgressMessage::progress(
                image.target.digest.as_str(),
                "Downloading",
                image.size,
                image.size,
            ))
            .await;
        self.insert(image.clone());
        Ok(image)
    }

    async fn push_image(
        &self,
        _ctx: &Context,
        reference: &Reference,
        _auth: Option<&AuthConfig>,
        progress: ProgressSender,
    ) -> Result<(), ImageError> {
        if !self.images.lock().contains_key(reference.as_str()) {
            return Err(ImageError::RemoteNotFound(reference.to_string()));
        }
        progress
            .send(ProgressMessage::status(reference.as_str(), "Pushed"))
            .await;
        self.pushes.lock().push(reference.to_string());
        Ok(())
    }

    async fn get_image(
        &self,
        _ctx: &Context,
        reference: &Reference,
    ) -> Result<RemoteImage, ImageError> {
        self.images
            .lock()
            .get(reference.as_str())
            .cloned()
            .ok_or_else(|| ImageError::RemoteNotFound(reference.to_string()))
    }

    async fn list_images(&self, ctx: &Context) -> Result<Vec<RemoteImage>, ImageError> {
        if self.hang_listing.load(Ordering::SeqCst) {
            ctx.cancelled().await;
            return Err(ImageError::Cancelled);
        }
        Ok(self.images.lock().values().cloned().collect())
    }

    async fn remove_image(&self, _ctx: &Context, reference: &Reference) -> Result<(), ImageError> {
        match self.images.lock().remove(reference.as_str()) {
            Some(_) => {
                self.removed.lock().push(reference.to_string());
                Ok(())
            }
            None => Err(ImageError::RemoteNotFound(reference.to_string())),
        }
    }

    async fn create_image_reference(
        &self,
        _ctx: &Context,
        name: &Reference,
        target: &Link,
    ) -> Result<(), ImageError> {
        let mut images = self.images.lock();
        let source = images
            .values()
            .find(|image| image.target.digest == target.digest)
            .cloned()
            .ok_or_else(|| ImageError::RemoteNotFound(target.digest.clone()))?;
        images.insert(
            name.to_string(),
            RemoteImage {
                name: name.to_string(),
                ..source
            },
        );
        Ok(())
    }

    async fn blob_size(&self, _ctx: &Context, digest: &ContentDigest) -> Result<u64, ImageError> {
        self.blobs
            .lock()
            .get(digest)
            .copied()
            .ok_or_else(|| ImageError::RemoteNotFound(digest.to_string()))
    }

    /// The archive format is one published candidate name per line
    async fn import_images(
        &self,
        _ctx: &Context,
        _name: &str,
        mut archive: ImageArchive,
    ) -> Result<Vec<RemoteImage>, ImageError> {
        let mut text = String::new();
        archive.read_to_string(&mut text).await?;
        let mut imported = vec![];
        for line in text.lines().filter(|line| !line.is_empty()) {
            let mut image = self
                .registry
                .lock()
                .get(line)
                .cloned()
                .ok_or_else(|| ImageError::RemoteNotFound(line.to_owned()))?;
            image.name = line.to_owned();
            self.insert(image.clone());
            imported.push(image);
        }
        Ok(imported)
    }

    async fn export_image(
        &self,
        _ctx: &Context,
        reference: &Reference,
    ) -> Result<ImageArchive, ImageError> {
        if !self.images.lock().contains_key(reference.as_str()) {
            return Err(ImageError::RemoteNotFound(reference.to_string()));
        }
        Ok(Box::new(Cursor::new(format!("{}\n", reference).into_bytes())))
    }
}

/// Event sink which remembers everything
#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<(String, String, ImageAction)>>,
}

impl RecordingEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingEvents::default())
    }

    pub fn events(&self) -> Vec<(String, String, ImageAction)> {
        self.events.lock().clone()
    }

    pub fn actions(&self) -> Vec<ImageAction> {
        self.events.lock().iter().map(|(_, _, action)| *action).collect()
    }
}

impl EventSink for RecordingEvents {
    fn log(&self, _ctx: &Context, name: &str, reference: &str, action: ImageAction) {
        self.events
            .lock()
            .push((name.to_owned(), reference.to_owned(), action));
    }
}

/// Post-pull hook which remembers the snapshotter and image name it saw
#[derive(Default)]
pub struct RecordingHook {
    pub calls: Mutex<Vec<(Option<String>, String, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl PostPullHook for RecordingHook {
    async fn post_pull(
        &self,
        ctx: &Context,
        snapshotter: &str,
        image: &RemoteImage,
    ) -> Result<(), ImageError> {
        self.calls.lock().push((
            ctx.snapshotter().map(str::to_owned),
            snapshotter.to_owned(),
            image.name.clone(),
        ));
        if self.fail.load(Ordering::SeqCst) {
            Err(ImageError::InvalidParam("rejected by hook".to_owned()))
        } else {
            Ok(())
        }
    }
}

/// Manager with the built-in defaults over a fake store
pub async fn manager(store: &Arc<FakeContentStore>) -> ImageManager {
    ImageManager::builder()
        .build(store.clone())
        .await
        .expect("build image manager")
}

pub async fn manager_with_events(
    store: &Arc<FakeContentStore>,
    events: &Arc<RecordingEvents>,
) -> ImageManager {
    ImageManager::builder()
        .event_sink(events.clone())
        .build(store.clone())
        .await
        .expect("build image manager")
}

/// A sink for progress messages, and a task that reads them back
pub fn capture() -> (DuplexStream, tokio::task::JoinHandle<Vec<ProgressMessage>>) {
    let (writer, mut reader) = tokio::io::duplex(CAPTURE_BUFFER);
    let reading = tokio::spawn(async move {
        let mut text = String::new();
        reader.read_to_string(&mut text).await.unwrap();
        text.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    });
    (writer, reading)
}

/// Write something to a duplex stream and close it
pub async fn archive(contents: &str) -> ImageArchive {
    let (mut writer, reader) = tokio::io::duplex(CAPTURE_BUFFER);
    writer.write_all(contents.as_bytes()).await.unwrap();
    writer.shutdown().await.unwrap();
    Box::new(reader)
}
