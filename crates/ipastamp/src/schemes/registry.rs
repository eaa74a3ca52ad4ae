//! Editing of the `CFBundleURLTypes` array.

use crate::document::{keys, MetadataDocument, Value};
use plist::Dictionary;

/// Role written on entries this crate appends.
pub const DEFAULT_TYPE_ROLE: &str = "Editor";

/// How one integration locates its URL-type entry.
///
/// Lookup order is fixed: `lookup_name` first, then `prefix`, then a new
/// entry is appended carrying `label` as its `CFBundleURLName`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemeSlot {
    /// Entry name that identifies the slot outright.
    pub lookup_name: Option<&'static str>,
    /// Scheme prefix owned by the slot.
    pub prefix: Option<&'static str>,
    /// Name given to an appended entry.
    pub label: Option<&'static str>,
}

impl SchemeSlot {
    /// A slot identified only by its entry name.
    pub const fn named(name: &'static str) -> Self {
        Self {
            lookup_name: Some(name),
            prefix: None,
            label: Some(name),
        }
    }

    /// A slot identified only by a scheme prefix.
    pub const fn prefixed(prefix: &'static str) -> Self {
        Self {
            lookup_name: None,
            prefix: Some(prefix),
            label: None,
        }
    }

    /// Set the name written on appended entries.
    pub const fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    /// Also match entries by name before falling back to the prefix.
    pub const fn with_lookup_name(mut self, name: &'static str) -> Self {
        self.lookup_name = Some(name);
        self
    }
}

/// Which rule placed the schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOutcome {
    /// The entry at this index had the slot's name; its schemes were replaced.
    MatchedName(usize),
    /// The entry at this index held schemes with the slot's prefix.
    MatchedPrefix(usize),
    /// A new entry was appended at this index.
    Appended(usize),
}

/// Working copy of the document's URL-type entries.
///
/// Entries that are not dictionaries are carried through untouched.
///
/// # Examples
///
/// ```
/// use ipastamp::schemes::{SchemeSlot, UrlTypes};
///
/// let mut types = UrlTypes::default();
/// types.apply(&SchemeSlot::prefixed("fb"), &["fb555".to_string()]);
/// assert_eq!(types.schemes_at(0), vec!["fb555".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlTypes {
    entries: Vec<Value>,
}

impl UrlTypes {
    /// Read `CFBundleURLTypes`. A missing or non-array value yields no entries.
    pub fn load(document: &MetadataDocument) -> Self {
        let entries = document
            .get(keys::URL_TYPES)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Self { entries }
    }

    /// Write the entries back as `CFBundleURLTypes`.
    pub fn store(self, document: &mut MetadataDocument) {
        document.replace(keys::URL_TYPES, Value::Array(self.entries));
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `CFBundleURLName` of entry `index`.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.entries
            .get(index)?
            .as_dictionary()?
            .get(keys::URL_NAME)?
            .as_string()
    }

    /// The string schemes of entry `index`.
    pub fn schemes_at(&self, index: usize) -> Vec<String> {
        self.entries
            .get(index)
            .and_then(Value::as_dictionary)
            .and_then(|entry| entry.get(keys::URL_SCHEMES))
            .and_then(Value::as_array)
            .map(|schemes| {
                schemes
                    .iter()
                    .filter_map(Value::as_string)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Place `schemes` according to `slot`.
    pub fn apply(&mut self, slot: &SchemeSlot, schemes: &[String]) -> SlotOutcome {
        if let Some(name) = slot.lookup_name {
            if let Some(index) = self.find_by_name(name) {
                if let Some(entry) = self.entries[index].as_dictionary_mut() {
                    entry.insert(keys::URL_SCHEMES.to_string(), scheme_array(schemes));
                }
                return SlotOutcome::MatchedName(index);
            }
        }

        if let Some(prefix) = slot.prefix {
            if let Some(index) = self.find_by_prefix(prefix) {
                if let Some(entry) = self.entries[index].as_dictionary_mut() {
                    replace_prefixed(entry, prefix, schemes);
                }
                return SlotOutcome::MatchedPrefix(index);
            }
        }

        let mut entry = Dictionary::new();
        entry.insert(keys::TYPE_ROLE.to_string(), Value::from(DEFAULT_TYPE_ROLE));
        if let Some(label) = slot.label {
            entry.insert(keys::URL_NAME.to_string(), Value::from(label));
        }
        entry.insert(keys::URL_SCHEMES.to_string(), scheme_array(schemes));
        self.entries.push(Value::Dictionary(entry));
        SlotOutcome::Appended(self.entries.len() - 1)
    }

    fn find_by_name(&self, name: &str) -> Option<usize> {
        (0..self.entries.len()).find(|&i| self.name_at(i) == Some(name))
    }

    fn find_by_prefix(&self, prefix: &str) -> Option<usize> {
        (0..self.entries.len()).find(|&i| {
            self.schemes_at(i)
                .iter()
                .any(|scheme| scheme.starts_with(prefix))
        })
    }
}

/// Drop the schemes sharing `prefix` from `entry` and append `schemes`.
///
/// Everything else in the scheme array keeps its position.
fn replace_prefixed(entry: &mut Dictionary, prefix: &str, schemes: &[String]) {
    let mut kept: Vec<Value> = entry
        .get(keys::URL_SCHEMES)
        .and_then(Value::as_array)
        .map(|existing| {
            existing
                .iter()
                .filter(|v| !v.as_string().is_some_and(|s| s.starts_with(prefix)))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    kept.extend(schemes.iter().map(|s| Value::from(s.as_str())));
    entry.insert(keys::URL_SCHEMES.to_string(), Value::Array(kept));
}

fn scheme_array(schemes: &[String]) -> Value {
    Value::Array(schemes.iter().map(|s| Value::from(s.as_str())).collect())
}
