//! Hooks the image manager calls out to: audit events and post-pull plugins

use crate::{context::Context, errors::ImageError, registry::RemoteImage};
use async_trait::async_trait;
use std::fmt;

/// Image actions recorded in the audit trail
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ImageAction {
    Pull,
    Push,
    Tag,
    Untag,
    Delete,
    Load,
}

impl ImageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageAction::Pull => "pull",
            ImageAction::Push => "push",
            ImageAction::Tag => "tag",
            ImageAction::Untag => "untag",
            ImageAction::Delete => "delete",
            ImageAction::Load => "load",
        }
    }
}

impl fmt::Display for ImageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget receiver for image audit events
pub trait EventSink: Send + Sync {
    /// `name` is the image's name of record, `reference` the name the
    /// caller used
    fn log(&self, ctx: &Context, name: &str, reference: &str, action: ImageAction);
}

/// Event sink which writes each event to the log at `info` level
#[derive(Clone, Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn log(&self, ctx: &Context, name: &str, reference: &str, action: ImageAction) {
        log::info!(
            "image {}: {} ({}, snapshotter {})",
            action,
            name,
            reference,
            ctx.current_snapshotter()
        );
    }
}

/// Plugin which runs after every successful pull
///
/// An error fails the pull, after the progress stream has already closed.
#[async_trait]
pub trait PostPullHook: Send + Sync {
    async fn post_pull(
        &self,
        ctx: &Context,
        snapshotter: &str,
        image: &RemoteImage,
    ) -> Result<(), ImageError>;
}
