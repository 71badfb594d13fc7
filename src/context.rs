//! Per-request state passed through every image operation

use tokio_util::sync::CancellationToken;

/// Snapshotter used when a request has not selected one
pub const DEFAULT_SNAPSHOTTER: &str = "overlayfs";

/// Request-scoped settings
///
/// A context carries the caller's cancellation signal and the storage
/// backend (snapshotter) selected for this request. Cloning a context
/// shares its cancellation token.
#[derive(Clone, Debug, Default)]
pub struct Context {
    snapshotter: Option<String>,
    cancel: CancellationToken,
}

impl Context {
    /// A fresh context with no snapshotter selection and its own token
    pub fn new() -> Self {
        Context::default()
    }

    /// Select a snapshotter for the operations run with this context
    pub fn with_snapshotter(mut self, snapshotter: &str) -> Self {
        self.snapshotter = Some(snapshotter.to_owned());
        self
    }

    /// The snapshotter explicitly selected for this request, if any
    pub fn snapshotter(&self) -> Option<&str> {
        self.snapshotter.as_deref()
    }

    /// The snapshotter this request will actually use
    pub fn current_snapshotter(&self) -> &str {
        self.snapshotter().unwrap_or(DEFAULT_SNAPSHOTTER)
    }

    /// A copy of this context with any snapshotter selection removed
    ///
    /// Cancellation is still shared with the original.
    pub fn clean_snapshotter(&self) -> Self {
        Context {
            snapshotter: None,
            cancel: self.cancel.clone(),
        }
    }

    /// A context which is cancelled along with this one, and which can also
    /// be cancelled on its own
    pub fn child(&self) -> Self {
        Context {
            snapshotter: self.snapshotter.clone(),
            cancel: self.cancel.child_token(),
        }
    }

    /// Signal cancellation to every operation using this context
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once this context has been cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
