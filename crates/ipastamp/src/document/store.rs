//! `Info.plist` loading, key-path editing and persistence.

use super::KeyPath;
use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Magic prefix of a binary property list.
const BINARY_PLIST_MAGIC: &[u8] = b"bplist00";

/// On-disk encoding of a property list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    /// XML property list.
    #[default]
    Xml,
    /// Binary property list (`bplist00`).
    Binary,
}

impl DocumentFormat {
    /// Detect the encoding from the leading bytes of a file.
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(BINARY_PLIST_MAGIC) {
            DocumentFormat::Binary
        } else {
            DocumentFormat::Xml
        }
    }
}

/// A metadata document bound to one backing file.
///
/// The root is always a dictionary. Edits happen in memory; nothing touches
/// disk until [`commit`](Self::commit), which rewrites the whole file.
///
/// Two replace flavours exist:
///
/// - [`replace`](Self::replace) is permissive: it creates (or overwrites
///   with) empty dictionaries along the path and always succeeds.
/// - [`replace_existing`](Self::replace_existing) is strict: it only
///   accepts a top-level key that is already present.
///
/// # Examples
///
/// ```no_run
/// use ipastamp::MetadataDocument;
///
/// let mut doc = MetadataDocument::load("Payload/App.app/Info.plist")?;
/// doc.replace("CFBundleIcons.CFBundlePrimaryIcon.CFBundleIconName", "AppIcon");
/// doc.remove("UILaunchStoryboardName");
/// doc.commit()?;
/// # Ok::<(), ipastamp::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct MetadataDocument {
    path: PathBuf,
    root: Dictionary,
    format: DocumentFormat,
}

impl MetadataDocument {
    /// Read and decode the property list at `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::MetadataReadFailed`] if the file cannot be read.
    /// - [`Error::MetadataDecodeFailed`] if it is not a property list or
    ///   its root is not a dictionary.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| Error::MetadataReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let format = DocumentFormat::detect(&data);

        let value: Value = plist::from_bytes(&data).map_err(|e| Error::MetadataDecodeFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let root = value
            .into_dictionary()
            .ok_or_else(|| Error::MetadataDecodeFailed {
                path: path.to_path_buf(),
                reason: "root is not a dictionary".into(),
            })?;

        tracing::debug!("Loaded {} ({:?}, {} keys)", path.display(), format, root.len());

        Ok(Self {
            path: path.to_path_buf(),
            root,
            format,
        })
    }

    /// Build an in-memory document that will be committed to `path`.
    pub fn from_dictionary(path: impl AsRef<Path>, root: Dictionary) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            root,
            format: DocumentFormat::Xml,
        }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoding used by [`commit`](Self::commit).
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// The root dictionary.
    pub fn root(&self) -> &Dictionary {
        &self.root
    }

    /// Look up the value at `key_path`.
    ///
    /// Returns `None` if any segment is missing or an intermediate value is
    /// not a dictionary.
    pub fn get(&self, key_path: impl Into<KeyPath>) -> Option<&Value> {
        let key_path = key_path.into();
        let (parents, last) = key_path.split_terminal();

        let mut node = &self.root;
        for segment in parents {
            node = node.get(segment)?.as_dictionary()?;
        }
        node.get(last)
    }

    /// Look up a string value.
    pub fn get_str(&self, key_path: impl Into<KeyPath>) -> Option<&str> {
        self.get(key_path).and_then(Value::as_string)
    }

    /// Look up an array of strings. Non-string members are skipped.
    pub fn get_string_array(&self, key_path: impl Into<KeyPath>) -> Option<Vec<String>> {
        let array = self.get(key_path)?.as_array()?;
        Some(
            array
                .iter()
                .filter_map(Value::as_string)
                .map(str::to_string)
                .collect(),
        )
    }

    /// Whether a value exists at `key_path`.
    pub fn contains(&self, key_path: impl Into<KeyPath>) -> bool {
        self.get(key_path).is_some()
    }

    /// Set `value` at `key_path`, creating intermediate dictionaries.
    ///
    /// An intermediate segment that is missing or holds a non-dictionary is
    /// replaced by an empty dictionary.
    pub fn replace(&mut self, key_path: impl Into<KeyPath>, value: impl Into<Value>) {
        let key_path = key_path.into();
        let (parents, last) = key_path.split_terminal();

        let mut node = &mut self.root;
        for segment in parents {
            if !matches!(node.get(segment), Some(Value::Dictionary(_))) {
                node.insert(segment.clone(), Value::Dictionary(Dictionary::new()));
            }
            let Some(child) = node.get_mut(segment).and_then(Value::as_dictionary_mut) else {
                return;
            };
            node = child;
        }
        node.insert(last.to_string(), value.into());
    }

    /// Strict single-key replace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotPresent`] if `key` is not already a top-level
    /// key of the document.
    pub fn replace_existing(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        match self.root.get_mut(key) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(Error::KeyNotPresent(key.to_string())),
        }
    }

    /// Delete the value at `key_path`.
    ///
    /// No-op if any segment is absent. Intermediate dictionaries left empty
    /// are kept.
    pub fn remove(&mut self, key_path: impl Into<KeyPath>) -> Option<Value> {
        let key_path = key_path.into();
        let (parents, last) = key_path.split_terminal();

        let mut node = &mut self.root;
        for segment in parents {
            node = node.get_mut(segment)?.as_dictionary_mut()?;
        }
        node.remove(last)
    }

    /// Encode the document in its load format and overwrite the backing file.
    pub fn commit(&self) -> Result<()> {
        self.commit_as(&self.path, self.format)
    }

    /// Encode the document and write it to `path` instead of the backing file.
    pub fn commit_to(&self, path: impl AsRef<Path>) -> Result<()> {
        self.commit_as(path.as_ref(), self.format)
    }

    /// Encode the document with an explicit `format` and write it to `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::MetadataEncodeFailed`] if serialization fails.
    /// - [`Error::MetadataWriteFailed`] if the file cannot be written.
    pub fn commit_as(&self, path: &Path, format: DocumentFormat) -> Result<()> {
        let value = Value::Dictionary(self.root.clone());
        let mut buf = Vec::new();
        match format {
            DocumentFormat::Xml => value.to_writer_xml(&mut buf),
            DocumentFormat::Binary => value.to_writer_binary(&mut buf),
        }
        .map_err(Error::MetadataEncodeFailed)?;

        fs::write(path, &buf).map_err(|source| Error::MetadataWriteFailed {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!("Wrote {} ({} bytes)", path.display(), buf.len());
        Ok(())
    }
}
