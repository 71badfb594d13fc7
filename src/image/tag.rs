use crate::errors::ImageError;
use regex::Regex;

/// Tag applied to references which name neither a tag nor a digest
pub const DEFAULT_TAG: &str = "latest";

/// Up to 128 word characters, dots and dashes, not starting with either
pub(crate) const TAG_PATTERN: &str = r"(?P<tag>[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,127})";

/// A mutable name identifying one image within a repository
#[derive(Clone)]
pub struct Tag(String);

string_component!(Tag);

impl Tag {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse(s: &str) -> Result<Self, ImageError> {
        lazy_static! {
            static ref RE: Regex = Regex::new(&format!("^{}$", TAG_PATTERN)).unwrap();
        }
        if RE.is_match(s) {
            Ok(Tag(s.to_owned()))
        } else {
            Err(ImageError::InvalidReferenceFormat(s.to_owned()))
        }
    }

    /// The tag implied by a reference without one
    pub fn latest() -> Self {
        Tag(DEFAULT_TAG.to_owned())
    }

    pub fn is_latest(&self) -> bool {
        self.0 == DEFAULT_TAG
    }
}
