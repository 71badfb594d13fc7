//! Daemon-wide registry defaults and reference candidate expansion

use crate::image::{split_domain, Registry, Repository};

/// Registry used for references that don't name one, unless configured
pub const DEFAULT_REGISTRY: &str = "registry.hub.docker.com";

/// Namespace added to single-component repositories on the default registry
pub const DEFAULT_NAMESPACE: &str = "library";

/// Settings for qualifying partial references with a default registry server
///
/// If you don't need the additional options, you can convert a plain [Registry]
/// [Into] a [DefaultRegistry]
#[derive(Clone, Debug)]
pub struct DefaultRegistry {
    /// References without a registry resolve to this server
    pub network_name: Registry,
    /// Mirrors of the default registry, tried in order before it
    pub mirrors: Vec<String>,
    /// Use this prefix when accessing an image repository with only a single
    /// path component on the default registry
    pub library_prefix: Option<Repository>,
}

impl From<Registry> for DefaultRegistry {
    fn from(network_name: Registry) -> Self {
        DefaultRegistry {
            network_name,
            mirrors: vec![],
            library_prefix: None,
        }
    }
}

impl Default for DefaultRegistry {
    fn default() -> Self {
        DefaultRegistry::new()
    }
}

impl DefaultRegistry {
    /// Return the built-in defaults
    pub fn new() -> Self {
        lazy_static! {
            static ref NETWORK_NAME: Registry = Registry::parse(DEFAULT_REGISTRY).unwrap();
            static ref LIBRARY: Repository = Repository::parse(DEFAULT_NAMESPACE).unwrap();
        }
        DefaultRegistry {
            network_name: NETWORK_NAME.clone(),
            mirrors: vec![],
            library_prefix: Some(LIBRARY.clone()),
        }
    }

    fn with_library_prefix(&self, registry: &str, remainder: &str) -> String {
        match &self.library_prefix {
            Some(prefix) if registry == self.network_name.as_str() && !remainder.contains('/') => {
                format!("{}/{}/{}", registry, prefix, remainder)
            }
            _ => format!("{}/{}", registry, remainder),
        }
    }

    /// List the fully qualified names a partial reference may refer to
    ///
    /// Without an explicit registry, each mirror is tried first in configured
    /// order, followed by the default registry. The default registry's
    /// candidate gets the library prefix for single-component names, so
    /// `ubuntu` becomes `<default>/library/ubuntu`. The last entry is always
    /// the canonical, lowest-priority candidate.
    pub fn lookup_references(&self, reference: &str) -> Vec<String> {
        let (registry, remainder) = split_domain(reference);
        let mut candidates = Vec::with_capacity(self.mirrors.len() + 1);
        let registry = match registry {
            Some(registry) => registry,
            None => {
                for mirror in &self.mirrors {
                    candidates.push(format!("{}/{}", mirror.trim_end_matches('/'), reference));
                }
                self.network_name.as_str()
            }
        };
        candidates.push(self.with_library_prefix(registry, remainder));
        candidates
    }

    /// Add the default registry and namespace to a reference which lacks them
    pub fn qualify(&self, reference: &str) -> String {
        let (registry, remainder) = split_domain(reference);
        let registry = registry.unwrap_or_else(|| self.network_name.as_str());
        self.with_library_prefix(registry, remainder)
    }

    /// Shorten a qualified reference to the form a user would type
    ///
    /// Strips the default registry, and then the library prefix when what
    /// remains is a single-component repository.
    pub fn familiar<'a>(&self, reference: &'a str) -> &'a str {
        let registry_prefix = format!("{}/", self.network_name);
        let rest = match reference.strip_prefix(registry_prefix.as_str()) {
            Some(rest) => rest,
            None => return reference,
        };
        match &self.library_prefix {
            Some(prefix) => {
                let library_prefix = format!("{}/", prefix);
                match rest.strip_prefix(library_prefix.as_str()) {
                    Some(short) if !short.contains('/') => short,
                    _ => rest,
                }
            }
            None => rest,
        }
    }
}
