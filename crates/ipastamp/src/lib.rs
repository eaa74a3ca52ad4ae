//! Re-stamp iOS app archives without rebuilding them.
//!
//! `ipastamp` opens a template `.ipa`, edits the application's `Info.plist`
//! (identifier, name, versions, SDK URL schemes), regenerates its icons from
//! one master image, optionally re-signs it, and packages the result.
//!
//! ```no_run
//! use ipastamp::{Integration, IpaEditor};
//! use ipastamp::icon::{IconMode, IconSource};
//!
//! let mut editor = IpaEditor::open("Template.ipa")?;
//! editor
//!     .set_bundle_id(Some("com.example.app"))?
//!     .set_version(Some("2.1.0"))?
//!     .apply(&Integration::Facebook {
//!         app_id: Some("555".into()),
//!         client_token: None,
//!         display_name: None,
//!     })?
//!     .replace_icon(&IconSource::parse("https://cdn.example.com/icon.png")?, IconMode::Strict)?;
//! editor.package("dist/Example.ipa")?;
//! editor.close()?;
//! # Ok::<(), ipastamp::Error>(())
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod external;
pub mod icon;
pub mod schemes;
pub mod session;
pub mod workspace;

pub use config::EditManifest;
pub use document::{DocumentFormat, KeyPath, MetadataDocument, Value};
pub use error::Error;
pub use external::{AssetCatalogCompiler, Resigner};
pub use icon::{IconAssetWriter, IconMode, IconSource};
pub use schemes::{Integration, UrlTypes};
pub use session::{IpaEditor, Lenient};
pub use workspace::{ArchiveWorkspace, CompressionLevel};

pub type Result<T> = std::result::Result<T, Error>;
