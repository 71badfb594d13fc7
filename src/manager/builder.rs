use crate::{
    config::ManagerConfig,
    errors::ImageError,
    events::{EventSink, LogEventSink, PostPullHook},
    manager::ImageManager,
    registry::DynContentClient,
    store::ReferenceStore,
};
use reqwest::{header::HeaderValue, ClientBuilder};
use std::{convert::TryInto, sync::Arc, time::Duration};

/// Builder for configuring custom [ImageManager] instances
pub struct ImageManagerBuilder {
    config: ManagerConfig,
    events: Arc<dyn EventSink>,
    post_pull: Option<Arc<dyn PostPullHook>>,
    bootstrap_deadline: Option<Duration>,
    network: ClientBuilder,
}

impl Default for ImageManagerBuilder {
    fn default() -> Self {
        ImageManagerBuilder::new()
    }
}

impl ImageManagerBuilder {
    /// Start constructing an image manager with default settings
    pub fn new() -> Self {
        ImageManagerBuilder {
            config: ManagerConfig::default(),
            events: Arc::new(LogEventSink),
            post_pull: None,
            bootstrap_deadline: None,
            network: reqwest::Client::builder().user_agent(ImageManager::default_user_agent()),
        }
    }

    /// Replace every daemon-level setting at once
    pub fn config(mut self, config: &ManagerConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Change the registry used for references that don't name one
    pub fn default_registry(mut self, registry: &str) -> Self {
        self.config.default_registry = registry.to_owned();
        self
    }

    /// Change the namespace for single-component names on the default
    /// registry; an empty string disables it
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.config.default_registry_namespace = namespace.to_owned();
        self
    }

    /// Mirrors of the default registry, tried in order before it
    pub fn mirrors<I, S>(mut self, mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.registry_mirrors = mirrors.into_iter().map(Into::into).collect();
        self
    }

    /// Where audit events go. By default they are logged.
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn post_pull_hook(mut self, hook: Arc<dyn PostPullHook>) -> Self {
        self.post_pull = Some(hook);
        self
    }

    /// Limit how long the initial image listing may take
    ///
    /// Overrides the deadline from [ImageManagerBuilder::config].
    pub fn bootstrap_deadline(mut self, deadline: Duration) -> Self {
        self.bootstrap_deadline = Some(deadline);
        self
    }

    /// Set a timeout for each registry search request
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.network = self.network.timeout(timeout);
        self
    }

    /// Never route registry searches through a proxy from the environment
    pub fn no_proxy(mut self) -> Self {
        self.network = self.network.no_proxy();
        self
    }

    /// Sets the `User-Agent` header used for registry searches
    ///
    /// By default, the value returned by
    /// [ImageManager::default_user_agent()] is used.
    pub fn user_agent<V>(mut self, value: V) -> Self
    where
        V: TryInto<HeaderValue>,
        V::Error: Into<http::Error>,
    {
        self.network = self.network.user_agent(value);
        self
    }

    /// Construct the manager and load the content store's image list
    ///
    /// Images which fail to load are logged and skipped. Failing to list
    /// images at all, or running past the bootstrap deadline, is an error.
    pub async fn build(self, client: DynContentClient) -> Result<ImageManager, ImageError> {
        let default_registry = self.config.registry()?;
        log::debug!(
            "default registry {}, mirrors {:?}",
            default_registry.network_name,
            default_registry.mirrors
        );
        let bootstrap_deadline = self
            .bootstrap_deadline
            .unwrap_or_else(|| self.config.bootstrap_deadline());
        let manager = ImageManager {
            default_registry,
            client,
            store: ReferenceStore::new(),
            events: self.events,
            post_pull: self.post_pull,
            http: self.network.build()?,
            bootstrap_deadline,
        };
        manager.bootstrap().await?;
        Ok(manager)
    }
}
