//! Filters accepted when listing images

use crate::{errors::ImageError, registry::DefaultRegistry};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const FILTER_BEFORE: &str = "before";
pub const FILTER_SINCE: &str = "since";
pub const FILTER_REFERENCE: &str = "reference";

/// Validated image listing filter
///
/// `before` and `since` name images; only images created strictly between
/// them are listed. Each `reference` pattern is a glob, and an image is kept
/// if any of its tags or digests match any pattern.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageFilter {
    pub before: Option<String>,
    pub since: Option<String>,
    pub reference: Vec<String>,
}

/// The API sends each filter key either as a list or as a set
#[derive(Deserialize)]
#[serde(untagged)]
enum FilterValues {
    List(Vec<String>),
    Set(BTreeMap<String, bool>),
}

impl FilterValues {
    fn into_vec(self) -> Vec<String> {
        match self {
            FilterValues::List(list) => list,
            FilterValues::Set(set) => set
                .into_iter()
                .filter_map(|(value, enabled)| if enabled { Some(value) } else { None })
                .collect(),
        }
    }
}

fn at_most_one(key: &str, mut values: Vec<String>) -> Result<Option<String>, ImageError> {
    if values.len() > 1 {
        Err(ImageError::InvalidParam(format!(
            "can't use {} filter more than once",
            key
        )))
    } else {
        Ok(values.pop())
    }
}

impl ImageFilter {
    pub fn new() -> Self {
        ImageFilter::default()
    }

    pub fn before(mut self, image: &str) -> Self {
        self.before = Some(image.to_owned());
        self
    }

    pub fn since(mut self, image: &str) -> Self {
        self.since = Some(image.to_owned());
        self
    }

    pub fn reference(mut self, pattern: &str) -> Self {
        self.reference.push(pattern.to_owned());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.since.is_none() && self.reference.is_empty()
    }

    /// Validate filter arguments in their key to values form
    pub fn from_args(args: BTreeMap<String, Vec<String>>) -> Result<Self, ImageError> {
        let mut filter = ImageFilter::new();
        for (key, values) in args {
            match key.as_str() {
                FILTER_BEFORE => filter.before = at_most_one(&key, values)?,
                FILTER_SINCE => filter.since = at_most_one(&key, values)?,
                FILTER_REFERENCE => filter.reference = values,
                _ => {
                    return Err(ImageError::InvalidParam(format!(
                        "invalid filter {:?}",
                        key
                    )))
                }
            }
        }
        Ok(filter)
    }

    /// Parse the JSON filter argument of an image listing request
    ///
    /// ```
    /// # use imagemgr::ImageFilter;
    /// let filter = ImageFilter::from_json(r#"{"reference": {"busybox:*": true}}"#).unwrap();
    /// assert_eq!(filter.reference, vec!["busybox:*"]);
    /// assert!(ImageFilter::from_json(r#"{"dangling": ["true"]}"#).is_err());
    /// ```
    pub fn from_json(text: &str) -> Result<Self, ImageError> {
        if text.trim().is_empty() {
            return Ok(ImageFilter::new());
        }
        let raw: BTreeMap<String, FilterValues> = serde_json::from_str(text)
            .map_err(|err| ImageError::InvalidParam(format!("invalid filter: {}", err)))?;
        ImageFilter::from_args(
            raw.into_iter()
                .map(|(key, values)| (key, values.into_vec()))
                .collect(),
        )
    }

    /// Compile the reference patterns
    pub fn reference_patterns(&self) -> Result<Vec<ReferencePattern>, ImageError> {
        self.reference
            .iter()
            .map(|pattern| ReferencePattern::parse(pattern))
            .collect()
    }
}

/// A glob pattern matched against image references
///
/// `*` matches any run of characters other than `/`, `?` matches one such
/// character, and `[...]` is a character class (`[^...]` negated). A
/// backslash escapes the next character.
#[derive(Clone, Debug)]
pub struct ReferencePattern {
    pattern: String,
    regex: Regex,
}

impl ReferencePattern {
    pub fn parse(pattern: &str) -> Result<Self, ImageError> {
        let regex = Regex::new(&glob_to_regex(pattern)?)
            .map_err(|err| ImageError::InvalidParam(format!("bad pattern {:?}: {}", pattern, err)))?;
        Ok(ReferencePattern {
            pattern: pattern.to_owned(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, reference: &str) -> bool {
        self.regex.is_match(reference)
    }

    /// Match either the reference as stored or the short form a user would
    /// type for it
    pub fn matches_familiar(&self, default_registry: &DefaultRegistry, reference: &str) -> bool {
        self.matches(reference) || self.matches(default_registry.familiar(reference))
    }
}

pub(super) fn glob_to_regex(pattern: &str) -> Result<String, ImageError> {
    let bad_pattern = || ImageError::InvalidParam(format!("bad pattern {:?}", pattern));
    let mut re = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '\\' => {
                let escaped = chars.next().ok_or_else(bad_pattern)?;
                re.push_str(&regex::escape(&escaped.to_string()));
            }
            '[' => {
                re.push('[');
                let mut first = true;
                loop {
                    let c = chars.next().ok_or_else(bad_pattern)?;
                    match c {
                        ']' if !first => break,
                        '^' if first => re.push('^'),
                        '-' if !first => re.push('-'),
                        '\\' => {
                            let escaped = chars.next().ok_or_else(bad_pattern)?;
                            re.push_str(&regex::escape(&escaped.to_string()));
                        }
                        c => re.push_str(&regex::escape(&c.to_string())),
                    }
                    first = first && c == '^';
                }
                re.push(']');
            }
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Ok(re)
}

