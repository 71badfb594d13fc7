//! Image management for a container engine daemon
//!
//! Resolves image names and IDs against an in-memory index of the content
//! store, and implements pull, push, tag, removal, listing and history on
//! top of a [ContentClient].

#[macro_use] extern crate lazy_static;

pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod image;
pub mod manager;
pub mod manifest;
pub mod registry;
pub mod store;

pub use crate::{
    config::ManagerConfig,
    context::Context,
    errors::ImageError,
    events::{EventSink, ImageAction, LogEventSink, PostPullHook},
    image::{ContentDigest, Reference, ReferenceKind, Registry, Repository, Tag},
    manager::{
        HistoryItem, ImageFilter, ImageInfo, ImageManager, ImageManagerBuilder,
        ResolvedReference,
    },
    registry::{AuthConfig, ContentClient, DefaultRegistry, ProgressMessage, RemoteImage},
    store::{ImageMetadata, ReferenceStore},
};
