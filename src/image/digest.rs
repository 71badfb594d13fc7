use crate::errors::ImageError;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt;

/// The digest algorithm used for image IDs and manifest digests
pub const CANONICAL_FORMAT: &str = "sha256";

/// Length in hex digits of a [CANONICAL_FORMAT] digest
pub const CANONICAL_HEX_LEN: usize = 64;

/// An algorithm name, a colon, and at least 32 lowercase hex digits
///
/// Algorithm names are letter-led alphanumeric runs joined by `-_+.`.
pub(crate) const DIGEST_PATTERN: &str = concat!(
    r"(?P<dig>",
    r"[a-zA-Z][a-zA-Z0-9]*(?:[-_+.][a-zA-Z][a-zA-Z0-9]*)*",
    r":[a-f0-9]{32,}",
    r")"
);

/// Identifies the exact contents of a blob
///
/// The digest of an image's config blob is its image ID. Manifest digests
/// use the same representation.
#[derive(Clone)]
pub struct ContentDigest {
    serialized: String,
    /// Byte offset of the colon
    split: usize,
}

string_component!(ContentDigest);

impl ContentDigest {
    /// The full `format:hex` string
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Assemble and validate a digest from an algorithm name and a value
    /// that formats as hex
    pub fn from_parts<T: fmt::LowerHex>(format_part: &str, hex_part: &T) -> Result<Self, ImageError> {
        ContentDigest::parse(&format!("{}:{:x}", format_part, hex_part))
    }

    /// Hash some content with [CANONICAL_FORMAT]
    ///
    /// ```
    /// # use imagemgr::ContentDigest;
    /// let digest = ContentDigest::from_content(b"cat");
    /// assert_eq!(digest.as_str(), "sha256:77af778b51abd4a3c51c5ddd97204a9c3ae614ebccb75a606c3b6865aed6744e");
    /// ```
    pub fn from_content(content_bytes: &[u8]) -> Self {
        ContentDigest {
            serialized: format!("{}:{:x}", CANONICAL_FORMAT, Sha256::digest(content_bytes)),
            split: CANONICAL_FORMAT.len(),
        }
    }

    /// ```
    /// # use imagemgr::ContentDigest;
    /// let digest = ContentDigest::parse("format:00112233445566778899aabbccddeeff").unwrap();
    /// assert_eq!(digest.format_str(), "format");
    /// assert_eq!(digest.hex_str(), "00112233445566778899aabbccddeeff");
    /// ```
    pub fn parse(s: &str) -> Result<Self, ImageError> {
        lazy_static! {
            static ref RE: Regex = Regex::new(&format!("^{}$", DIGEST_PATTERN)).unwrap();
        }
        match s.find(':') {
            Some(split) if RE.is_match(s) => Ok(ContentDigest {
                serialized: s.to_owned(),
                split,
            }),
            _ => Err(ImageError::InvalidReferenceFormat(s.to_owned())),
        }
    }

    /// The algorithm name
    pub fn format_str(&self) -> &str {
        &self.serialized[..self.split]
    }

    /// At least 32 lowercase hex digits
    pub fn hex_str(&self) -> &str {
        &self.serialized[self.split + 1..]
    }

    /// Is this digest in the format used for manifests and image IDs?
    pub fn is_canonical(&self) -> bool {
        self.format_str() == CANONICAL_FORMAT && self.hex_str().len() == CANONICAL_HEX_LEN
    }

    /// Does a possibly abbreviated image ID name this digest?
    ///
    /// Accepts `format:hexprefix` with this digest's exact format, or a bare
    /// hex prefix. The hex part must be non-empty lowercase hex, so a partial
    /// format name like `sha` never matches.
    pub fn matches_id_prefix(&self, prefix: &str) -> bool {
        let hex = match prefix.find(':') {
            Some(split) if &prefix[..split] == self.format_str() => &prefix[split + 1..],
            Some(_) => return false,
            None => prefix,
        };
        !hex.is_empty()
            && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
            && self.hex_str().starts_with(hex)
    }
}
