use crate::errors::ImageError;
use regex::Regex;

/// One or more slash-separated lowercase components
///
/// Inside a component, alphanumeric runs may be joined by a single period, a
/// single or double underscore, or any number of dashes.
pub(crate) const REPOSITORY_PATTERN: &str = concat!(
    r"(?P<repo>",
    r"[a-z0-9]+(?:(?:[._]|__|[-]*)[a-z0-9]+)*",
    r"(?:/[a-z0-9]+(?:(?:[._]|__|[-]*)[a-z0-9]+)*)*",
    r")"
);

/// Path of an image repository within a registry
#[derive(Clone)]
pub struct Repository {
    path: String,
}

string_component!(Repository);

/// Iterator over the components of a [Repository] path
pub struct RepositoryIter<'a> {
    inner: std::str::Split<'a, char>,
}

impl<'a> Iterator for RepositoryIter<'a> {
    type Item = &'a str;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl Repository {
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// ```
    /// # use imagemgr::Repository;
    /// let repo = Repository::parse("library/ubuntu").unwrap();
    /// assert_eq!(repo.iter().collect::<Vec<_>>(), vec!["library", "ubuntu"]);
    /// assert!(Repository::parse("Library/ubuntu").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, ImageError> {
        lazy_static! {
            static ref RE: Regex = Regex::new(&format!("^{}$", REPOSITORY_PATTERN)).unwrap();
        }
        if RE.is_match(s) {
            Ok(Repository { path: s.to_owned() })
        } else {
            Err(ImageError::InvalidReferenceFormat(s.to_owned()))
        }
    }

    pub fn iter(&self) -> RepositoryIter<'_> {
        RepositoryIter {
            inner: self.path.split('/'),
        }
    }

    /// Is this a single component like `ubuntu`, which may need a namespace
    /// on the default registry?
    pub fn is_single_component(&self) -> bool {
        !self.path.contains('/')
    }

    /// `self/other`
    pub fn join(&self, other: &Self) -> Self {
        Repository {
            path: format!("{}/{}", self.path, other.path),
        }
    }
}
