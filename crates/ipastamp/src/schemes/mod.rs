//! URL-scheme registrations for third-party SDKs.
//!
//! SDKs find their callbacks through `CFBundleURLTypes`, an array of
//! dictionaries each carrying an optional `CFBundleURLName` and a
//! `CFBundleURLSchemes` string array. [`UrlTypes`] edits that array with a
//! three-step rule per [`SchemeSlot`]:
//!
//! 1. an entry whose name equals the slot's name gets its schemes replaced;
//! 2. otherwise an entry holding a scheme with the slot's prefix loses those
//!    schemes (and only those) and gains the new one;
//! 3. otherwise a new entry is appended.
//!
//! [`Integration`] is the closed set of supported SDKs built on top.

pub mod integration;
pub mod registry;

pub use integration::{Context, Integration};
pub use registry::{SchemeSlot, SlotOutcome, UrlTypes};
