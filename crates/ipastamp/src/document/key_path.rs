//! Dotted key paths into a nested dictionary.

use std::fmt;
use std::str::FromStr;

/// An ordered, non-empty sequence of dictionary keys.
///
/// Built by splitting a dotted path on `.`, so
/// `"CFBundleIcons.CFBundlePrimaryIcon.CFBundleIconFiles"` addresses three
/// levels. Keys that themselves contain a dot can be addressed with
/// [`KeyPath::from_segments`].
///
/// # Examples
///
/// ```
/// use ipastamp::KeyPath;
///
/// let path = KeyPath::new("CFBundleIcons~ipad.CFBundlePrimaryIcon");
/// assert_eq!(path.segments(), ["CFBundleIcons~ipad", "CFBundlePrimaryIcon"]);
/// assert_eq!(path.to_string(), "CFBundleIcons~ipad.CFBundlePrimaryIcon");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Parse a dotted path. An empty string yields a single empty segment.
    pub fn new(path: &str) -> Self {
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    /// Build a path from explicit segments.
    ///
    /// Returns `None` when `segments` is empty.
    pub fn from_segments<I, S>(segments: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// All segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Split into the intermediate segments and the terminal key.
    pub fn split_terminal(&self) -> (&[String], &str) {
        match self.segments.split_last() {
            Some((last, parents)) => (parents, last.as_str()),
            // Unreachable through the constructors, which never produce an empty path.
            None => (&[], ""),
        }
    }

    /// Whether this path addresses a top-level key.
    pub fn is_single(&self) -> bool {
        self.segments.len() == 1
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        KeyPath::new(path)
    }
}

impl From<String> for KeyPath {
    fn from(path: String) -> Self {
        KeyPath::new(&path)
    }
}

impl From<&KeyPath> for KeyPath {
    fn from(path: &KeyPath) -> Self {
        path.clone()
    }
}

impl FromStr for KeyPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(KeyPath::new(s))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}
