use crate::errors::ImageError;
use regex::Regex;

/// A domain name made of dot-separated labels, then an optional port
pub(crate) const REGISTRY_PATTERN: &str = concat!(
    r"(?P<reg>",
    r"[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?",
    r"(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*",
    r"(?::[0-9]+)?",
    r")"
);

/// Network name of a registry server, with an optional port
///
/// In a reference, the first path segment is only read as a registry when
/// it contains a dot or a colon (see [Registry::looks_like_registry]);
/// anything else is the first segment of the repository path.
#[derive(Clone)]
pub struct Registry {
    serialized: String,
    port: Option<u16>,
}

string_component!(Registry);

impl Registry {
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    pub fn parse(s: &str) -> Result<Self, ImageError> {
        lazy_static! {
            static ref RE: Regex = Regex::new(&format!("^{}$", REGISTRY_PATTERN)).unwrap();
        }
        let invalid = || ImageError::InvalidReferenceFormat(s.to_owned());
        if !RE.is_match(s) {
            return Err(invalid());
        }
        let port = match s.rfind(':') {
            Some(idx) => Some(s[idx + 1..].parse().map_err(|_| invalid())?),
            None => None,
        };
        Ok(Registry {
            serialized: s.to_owned(),
            port,
        })
    }

    /// Would this leading path segment of a reference be read as a registry?
    pub fn looks_like_registry(segment: &str) -> bool {
        segment.contains(|c| c == '.' || c == ':')
    }

    /// The host name, without any port
    pub fn domain_str(&self) -> &str {
        match self.serialized.rfind(':') {
            Some(idx) => &self.serialized[..idx],
            None => &self.serialized,
        }
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}
