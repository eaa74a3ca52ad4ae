//! Key-path addressable metadata documents.
//!
//! An app's `Info.plist` is a nested dictionary of heterogeneous values.
//! This module loads it into a [`MetadataDocument`] whose values are
//! [`plist::Value`] (string, integer, real, boolean, array, dictionary,
//! data, date) and addresses them with dotted [`KeyPath`]s:
//!
//! | Operation | Missing intermediate | Non-dictionary intermediate |
//! |-----------|----------------------|-----------------------------|
//! | `get` | `None` | `None` |
//! | `replace` | created | overwritten with `{}` |
//! | `remove` | no-op | no-op |
//!
//! None of these fail, so long chains of edits compose without error
//! handling. Only loading and [`MetadataDocument::commit`] touch the disk.

pub mod key_path;
pub mod store;

pub use key_path::KeyPath;
pub use plist::Value;
pub use store::{DocumentFormat, MetadataDocument};

/// Well-known `Info.plist` keys.
pub mod keys {
    /// `CFBundleIdentifier`
    pub const BUNDLE_IDENTIFIER: &str = "CFBundleIdentifier";
    /// `CFBundleDisplayName`
    pub const DISPLAY_NAME: &str = "CFBundleDisplayName";
    /// `CFBundleShortVersionString`
    pub const SHORT_VERSION: &str = "CFBundleShortVersionString";
    /// `CFBundleVersion`
    pub const BUILD_VERSION: &str = "CFBundleVersion";
    /// `CFBundleExecutable`
    pub const EXECUTABLE: &str = "CFBundleExecutable";
    /// `CFBundleURLTypes`
    pub const URL_TYPES: &str = "CFBundleURLTypes";
    /// `CFBundleURLName`
    pub const URL_NAME: &str = "CFBundleURLName";
    /// `CFBundleURLSchemes`
    pub const URL_SCHEMES: &str = "CFBundleURLSchemes";
    /// `CFBundleTypeRole`
    pub const TYPE_ROLE: &str = "CFBundleTypeRole";
    /// Legacy top-level `CFBundleIconFiles`
    pub const LEGACY_ICON_FILES: &str = "CFBundleIconFiles";
}

/// File name of the metadata document inside an application directory.
pub const INFO_PLIST: &str = "Info.plist";
