use crate::{
    errors::ImageError,
    image::{
        digest::DIGEST_PATTERN, registry::REGISTRY_PATTERN, repository::REPOSITORY_PATTERN,
        tag::TAG_PATTERN, ContentDigest, Registry, Repository, Tag,
    },
};
use regex::Regex;
use std::ops::Range;

/// Parsed Docker-style image reference
///
/// This is an owned struct representing a docker "reference" (like a URI)
/// which names an image. A complete reference contains a [Registry],
/// [Repository], [Tag], and [ContentDigest] in that order. Only the
/// [Repository] component is mandatory.
///
/// The [Tag] always begins with a `:` and the [ContentDigest] with an `@`.
/// The leading path segment is a registry if and only if it contains a dot
/// or a colon. Raw image IDs parse too: `sha256:<hex>` reads as repository
/// `sha256` tagged with the hex digits, and a bare short ID reads as a
/// name-only reference.
///
/// The registry and repository together are the reference's *locator*,
/// independent of any tag or digest.
#[derive(Clone)]
pub struct Reference {
    serialized: String,
    registry_pos: Option<Range<usize>>,
    repository_pos: Range<usize>,
    tag_pos: Option<Range<usize>>,
    digest_pos: Option<Range<usize>>,
}

/// The shape of a [Reference]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ReferenceKind {
    /// No tag and no digest: a bare repository, image ID, or short ID
    NameOnly,
    /// A repository with a mutable tag
    Tagged,
    /// A repository with an immutable digest
    Digested,
    /// A repository with a digest in the manifest digest format
    CanonicalDigested,
}

/// Split off a leading registry, if the first path segment looks like one
///
/// Returns the registry portion (if any) and the remainder after the first
/// slash. Without a registry the remainder is the entire input.
pub fn split_domain(s: &str) -> (Option<&str>, &str) {
    match s.find('/') {
        Some(idx) if Registry::looks_like_registry(&s[..idx]) => (Some(&s[..idx]), &s[idx + 1..]),
        _ => (None, s),
    }
}

impl Reference {
    /// Returns a reference to the existing string representation of a
    /// [Reference]
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Parse a [Reference] from its component pieces
    ///
    /// This may fail either because of a problem with one of the components,
    /// or because the resulting string would be parsed in a manner other than
    /// intended. For example, a registry name could be parsed as the first
    /// section of the repository path.
    pub fn from_parts(
        registry: Option<&str>,
        repository: &str,
        tag: Option<&str>,
        digest: Option<&str>,
    ) -> Result<Self, ImageError> {
        let combined = Reference::assemble(registry, repository, tag, digest);
        let parsed = Reference::parse(combined.as_str())?;
        if parsed.as_parts() == (registry, repository, tag, digest) {
            Ok(parsed)
        } else {
            // Parsing ambiguity
            Err(ImageError::InvalidReferenceFormat(combined.serialized))
        }
    }

    /// Build a reference from parts that are already known to be valid
    fn assemble(
        registry: Option<&str>,
        repository: &str,
        tag: Option<&str>,
        digest: Option<&str>,
    ) -> Self {
        let mut serialized = String::new();
        let registry_pos = registry.map(|registry| {
            serialized.push_str(registry);
            let pos = 0..serialized.len();
            serialized.push('/');
            pos
        });
        let start = serialized.len();
        serialized.push_str(repository);
        let repository_pos = start..serialized.len();
        let tag_pos = tag.map(|tag| {
            serialized.push(':');
            let start = serialized.len();
            serialized.push_str(tag);
            start..serialized.len()
        });
        let digest_pos = digest.map(|digest| {
            serialized.push('@');
            let start = serialized.len();
            serialized.push_str(digest);
            start..serialized.len()
        });
        Reference {
            serialized,
            registry_pos,
            repository_pos,
            tag_pos,
            digest_pos,
        }
    }

    /// Return references to the parsed components within this [Reference]
    pub fn as_parts(&self) -> (Option<&str>, &str, Option<&str>, Option<&str>) {
        (
            self.registry_str(),
            self.repository_str(),
            self.tag_str(),
            self.content_digest_str(),
        )
    }

    /// Parse a [prim@str] as a [Reference]
    pub fn parse(s: &str) -> Result<Self, ImageError> {
        lazy_static! {
            static ref WITH_REGISTRY: Regex = Regex::new(&format!(
                "^{}/{}(:{})?(@{})?$",
                REGISTRY_PATTERN, REPOSITORY_PATTERN, TAG_PATTERN, DIGEST_PATTERN
            ))
            .unwrap();
            static ref NO_REGISTRY: Regex = Regex::new(&format!(
                "^{}(:{})?(@{})?$",
                REPOSITORY_PATTERN, TAG_PATTERN, DIGEST_PATTERN
            ))
            .unwrap();
        }
        let has_registry = split_domain(s).0.is_some();
        let re: &Regex = if has_registry {
            &*WITH_REGISTRY
        } else {
            &*NO_REGISTRY
        };
        let captures = match re.captures(s) {
            None => return Err(ImageError::InvalidReferenceFormat(s.to_owned())),
            Some(captures) => captures,
        };
        let repository_pos = match captures.name("repo") {
            None => return Err(ImageError::InvalidReferenceFormat(s.to_owned())),
            Some(m) => m.range(),
        };
        Ok(Reference {
            serialized: s.to_owned(),
            registry_pos: captures.name("reg").map(|m| m.range()),
            repository_pos,
            tag_pos: captures.name("tag").map(|m| m.range()),
            digest_pos: captures.name("dig").map(|m| m.range()),
        })
    }

    /// Returns a reference to the optional registry portion of the string.
    pub fn registry_str(&self) -> Option<&str> {
        self.registry_pos
            .as_ref()
            .map(|pos| &self.serialized[pos.clone()])
    }

    /// Returns a reference to the repository portion of the string
    pub fn repository_str(&self) -> &str {
        &self.serialized[self.repository_pos.clone()]
    }

    /// Returns a reference to the optional tag portion of the string.
    pub fn tag_str(&self) -> Option<&str> {
        self.tag_pos
            .as_ref()
            .map(|pos| &self.serialized[pos.clone()])
    }

    /// Returns a reference to the optional digest portion of the string.
    pub fn content_digest_str(&self) -> Option<&str> {
        self.digest_pos
            .as_ref()
            .map(|pos| &self.serialized[pos.clone()])
    }

    /// Returns the registry and repository, without any tag or digest
    pub fn locator(&self) -> &str {
        &self.serialized[..self.repository_pos.end]
    }

    /// Returns the registry portion as a new object
    pub fn registry(&self) -> Option<Registry> {
        self.registry_str().and_then(|s| Registry::parse(s).ok())
    }

    /// Returns the repository portion as a new object
    pub fn repository(&self) -> Option<Repository> {
        Repository::parse(self.repository_str()).ok()
    }

    /// Returns the tag portion as a new object
    pub fn tag(&self) -> Option<Tag> {
        self.tag_str().and_then(|s| Tag::parse(s).ok())
    }

    /// Returns the digest portion as a new object
    pub fn content_digest(&self) -> Option<ContentDigest> {
        self.content_digest_str()
            .and_then(|s| ContentDigest::parse(s).ok())
    }

    /// Classify this reference
    ///
    /// A digest always wins over a tag, so `name:tag@digest` is digested.
    pub fn kind(&self) -> ReferenceKind {
        match (self.tag_pos.is_some(), self.content_digest()) {
            (_, Some(digest)) if digest.is_canonical() => ReferenceKind::CanonicalDigested,
            (_, Some(_)) => ReferenceKind::Digested,
            (true, None) => ReferenceKind::Tagged,
            (false, None) => ReferenceKind::NameOnly,
        }
    }

    /// Does this reference have neither a tag nor a digest?
    pub fn is_name_only(&self) -> bool {
        self.kind() == ReferenceKind::NameOnly
    }

    /// Does this reference have a tag and no digest?
    pub fn is_tagged(&self) -> bool {
        self.kind() == ReferenceKind::Tagged
    }

    /// Does this reference include a digest?
    pub fn is_digested(&self) -> bool {
        self.digest_pos.is_some()
    }

    /// Add the default tag if this reference is name-only
    pub fn with_default_tag_if_missing(&self) -> Reference {
        if self.is_name_only() {
            self.with_tag(&Tag::latest())
        } else {
            self.clone()
        }
    }

    /// Drop the tag from a reference that has both a tag and a digest
    pub fn trim_tag_for_digest(&self) -> Reference {
        match (self.tag_pos.is_some(), self.content_digest_str()) {
            (true, Some(digest)) => {
                Reference::assemble(self.registry_str(), self.repository_str(), None, Some(digest))
            }
            _ => self.clone(),
        }
    }

    /// Build `locator:tag`, discarding any tag or digest on this reference
    pub fn with_tag(&self, tag: &Tag) -> Reference {
        Reference::assemble(
            self.registry_str(),
            self.repository_str(),
            Some(tag.as_str()),
            None,
        )
    }

    /// Build `locator@digest`, discarding any tag or digest on this reference
    pub fn with_digest(&self, digest: &ContentDigest) -> Reference {
        Reference::assemble(
            self.registry_str(),
            self.repository_str(),
            None,
            Some(digest.as_str()),
        )
    }
}

string_component!(Reference);
