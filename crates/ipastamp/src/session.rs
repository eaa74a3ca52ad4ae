//! Editing sessions.
//!
//! An [`IpaEditor`] owns one [`ArchiveWorkspace`] and the `Info.plist` of
//! the application inside it. Every mutation is committed to disk as soon
//! as it is applied, so packaging always sees the latest state.
//!
//! Two failure policies are available and never mixed within one chain:
//!
//! - [`IpaEditor`] methods return `Result<&mut Self>`; the first error stops
//!   the chain with `?`.
//! - [`IpaEditor::lenient`] returns a [`Lenient`] view whose methods log the
//!   error, record it, and carry on with the next step.
//!
//! # Examples
//!
//! ```no_run
//! use ipastamp::{Integration, IpaEditor};
//! use ipastamp::icon::{IconMode, IconSource};
//!
//! let mut editor = IpaEditor::open("Template.ipa")?;
//! editor
//!     .set_bundle_id(Some("com.example.app"))?
//!     .set_display_name(Some("Example"))?
//!     .apply(&Integration::QQ { app_id: Some("100424468".into()) })?
//!     .replace_icon(&IconSource::parse("icon.png")?, IconMode::Strict)?;
//! editor.package("out/Example.ipa")?;
//! editor.close()?;
//! # Ok::<(), ipastamp::Error>(())
//! ```

use crate::document::{keys, MetadataDocument, INFO_PLIST};
use crate::external::{AssetCatalogCompiler, Resigner};
use crate::icon::{FetchOptions, IconAssetWriter, IconMode, IconReport, IconSource, StandardSizes};
use crate::schemes::{Context, Integration};
use crate::workspace::{ArchiveWorkspace, CompressionLevel};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// One template being edited.
#[derive(Debug)]
pub struct IpaEditor {
    workspace: ArchiveWorkspace,
    app_directory: PathBuf,
    document: Option<MetadataDocument>,
    fetch_options: FetchOptions,
    standard_sizes: StandardSizes,
}

impl IpaEditor {
    /// Extract `template` and locate its application directory.
    ///
    /// # Errors
    ///
    /// - [`Error::TemplateNotFound`] if `template` does not exist.
    /// - [`Error::InvalidPackage`] if it contains no `.app` directory.
    pub fn open(template: impl AsRef<Path>) -> Result<Self> {
        Self::from_workspace(ArchiveWorkspace::open(template)?)
    }

    /// Start a session on an already opened workspace.
    pub fn from_workspace(workspace: ArchiveWorkspace) -> Result<Self> {
        let app_directory = workspace.resolve_application_root()?;
        Ok(Self {
            workspace,
            app_directory,
            document: None,
            fetch_options: FetchOptions::default(),
            standard_sizes: StandardSizes::default(),
        })
    }

    /// Timeouts for remote icon sources.
    pub fn fetch_options(mut self, options: FetchOptions) -> Self {
        self.fetch_options = options;
        self
    }

    /// Standard icon sizes used to fill gaps in the icon lists.
    pub fn standard_sizes(mut self, sizes: StandardSizes) -> Self {
        self.standard_sizes = sizes;
        self
    }

    /// Compression level of the packaged output.
    pub fn compression_level(mut self, level: impl Into<CompressionLevel>) -> Self {
        self.workspace.set_compression_level(level);
        self
    }

    /// The extracted `.app` directory.
    pub fn app_directory(&self) -> &Path {
        &self.app_directory
    }

    /// The underlying workspace.
    pub fn workspace(&self) -> &ArchiveWorkspace {
        &self.workspace
    }

    /// The application's `Info.plist`, loaded on first use.
    ///
    /// # Errors
    ///
    /// [`Error::MetadataReadFailed`] or [`Error::MetadataDecodeFailed`].
    pub fn document(&mut self) -> Result<&mut MetadataDocument> {
        let document = match self.document.take() {
            Some(document) => document,
            None => MetadataDocument::load(self.app_directory.join(INFO_PLIST))?,
        };
        Ok(self.document.insert(document))
    }

    /// `CFBundleIdentifier`
    pub fn bundle_id(&mut self) -> Result<Option<String>> {
        self.read_string(keys::BUNDLE_IDENTIFIER)
    }

    /// `CFBundleDisplayName`
    pub fn display_name(&mut self) -> Result<Option<String>> {
        self.read_string(keys::DISPLAY_NAME)
    }

    /// `CFBundleShortVersionString`
    pub fn version(&mut self) -> Result<Option<String>> {
        self.read_string(keys::SHORT_VERSION)
    }

    /// `CFBundleVersion`
    pub fn build_number(&mut self) -> Result<Option<String>> {
        self.read_string(keys::BUILD_VERSION)
    }

    /// `CFBundleExecutable`
    pub fn executable_name(&mut self) -> Result<Option<String>> {
        self.read_string(keys::EXECUTABLE)
    }

    /// Replace `CFBundleIdentifier`.
    ///
    /// Uses the strict replace: a template without an identifier fails with
    /// [`Error::KeyNotPresent`] instead of gaining one.
    pub fn set_bundle_id(&mut self, bundle_id: Option<&str>) -> Result<&mut Self> {
        self.write_string(keys::BUNDLE_IDENTIFIER, bundle_id, true)
    }

    /// Set `CFBundleDisplayName`, creating it if missing.
    pub fn set_display_name(&mut self, name: Option<&str>) -> Result<&mut Self> {
        self.write_string(keys::DISPLAY_NAME, name, false)
    }

    /// Set `CFBundleShortVersionString`, creating it if missing.
    pub fn set_version(&mut self, version: Option<&str>) -> Result<&mut Self> {
        self.write_string(keys::SHORT_VERSION, version, false)
    }

    /// Set `CFBundleVersion`, creating it if missing.
    pub fn set_build_number(&mut self, build_number: Option<&str>) -> Result<&mut Self> {
        self.write_string(keys::BUILD_VERSION, build_number, false)
    }

    /// Apply an SDK integration and commit if anything changed.
    pub fn apply(&mut self, integration: &Integration) -> Result<&mut Self> {
        let app_directory = self.app_directory.clone();
        let document = self.document()?;
        let before = document.root().clone();

        integration.apply(&mut Context {
            document: &mut *document,
            app_directory: &app_directory,
        })?;

        if document.root() != &before {
            document.commit()?;
            tracing::info!("Applied {} integration", integration.name());
        } else {
            tracing::debug!("{} integration already up to date", integration.name());
        }
        Ok(self)
    }

    /// Replace the app icon and commit the document.
    pub fn replace_icon(&mut self, source: &IconSource, mode: IconMode) -> Result<&mut Self> {
        self.replace_icon_with_report(source, mode)?;
        Ok(self)
    }

    /// Like [`replace_icon`](Self::replace_icon), returning what was done.
    ///
    /// A remote source is downloaded first; the download is deleted before
    /// this returns, whether or not the replacement succeeded.
    pub fn replace_icon_with_report(&mut self, source: &IconSource, mode: IconMode) -> Result<IconReport> {
        let local = source.materialize(&self.fetch_options)?;
        let app_directory = self.app_directory.clone();
        let writer = IconAssetWriter::new(&app_directory)
            .mode(mode)
            .standard_sizes(self.standard_sizes.clone());

        let document = self.document()?;
        let report = writer.replace(document, local.path())?;
        if report.document_changed {
            document.commit()?;
        }
        Ok(report)
    }

    /// Compile an asset catalog into the app and merge its icon keys.
    pub fn compile_icon_catalog(&mut self, compiler: &AssetCatalogCompiler, catalog: &Path) -> Result<&mut Self> {
        let app_directory = self.app_directory.clone();
        let document = self.document()?;
        if compiler.compile(catalog, &app_directory, document)? {
            document.commit()?;
        }
        Ok(self)
    }

    /// Re-sign the application directory.
    pub fn resign(&mut self, resigner: &Resigner) -> Result<&mut Self> {
        resigner.resign(&self.app_directory)?;
        Ok(self)
    }

    /// Package the current state to `to`.
    pub fn package(&self, to: impl AsRef<Path>) -> Result<PathBuf> {
        self.workspace.package(to)
    }

    /// Continue past failures instead of stopping at the first one.
    pub fn lenient(&mut self) -> Lenient<'_> {
        Lenient {
            editor: self,
            failures: Vec::new(),
        }
    }

    /// Remove the scratch directory. Safe to call more than once.
    pub fn dispose(&mut self) -> Result<()> {
        self.document = None;
        self.workspace.dispose()
    }

    /// End the session, removing the scratch directory.
    pub fn close(mut self) -> Result<()> {
        self.dispose()
    }

    fn read_string(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.document()?.get_str(key).map(str::to_owned))
    }

    fn write_string(&mut self, key: &str, value: Option<&str>, strict: bool) -> Result<&mut Self> {
        let Some(value) = value else {
            tracing::debug!("{key} not given, leaving it unchanged");
            return Ok(self);
        };

        let document = self.document()?;
        if document.get_str(key) == Some(value) {
            tracing::debug!("{key} is already {value:?}");
            return Ok(self);
        }

        if strict {
            document.replace_existing(key, value)?;
        } else {
            document.replace(key, value);
        }
        document.commit()?;
        tracing::info!("Set {key} to {value:?}");
        Ok(self)
    }
}

/// A failure recorded by [`Lenient`].
#[derive(Debug)]
pub struct Failure {
    /// Which step failed.
    pub step: String,
    /// Why it failed.
    pub error: Error,
}

/// An [`IpaEditor`] view that logs failures and continues.
///
/// # Examples
///
/// ```no_run
/// use ipastamp::IpaEditor;
///
/// let mut editor = IpaEditor::open("Template.ipa")?;
/// let failures = editor
///     .lenient()
///     .set_bundle_id(Some("com.example.app"))
///     .set_version(Some("2.0"))
///     .finish();
/// for failure in &failures {
///     eprintln!("{}: {}", failure.step, failure.error);
/// }
/// # Ok::<(), ipastamp::Error>(())
/// ```
#[derive(Debug)]
pub struct Lenient<'a> {
    editor: &'a mut IpaEditor,
    failures: Vec<Failure>,
}

impl Lenient<'_> {
    /// See [`IpaEditor::set_bundle_id`].
    pub fn set_bundle_id(&mut self, bundle_id: Option<&str>) -> &mut Self {
        self.attempt("set bundle id", |editor| editor.set_bundle_id(bundle_id).map(drop))
    }

    /// See [`IpaEditor::set_display_name`].
    pub fn set_display_name(&mut self, name: Option<&str>) -> &mut Self {
        self.attempt("set display name", |editor| editor.set_display_name(name).map(drop))
    }

    /// See [`IpaEditor::set_version`].
    pub fn set_version(&mut self, version: Option<&str>) -> &mut Self {
        self.attempt("set version", |editor| editor.set_version(version).map(drop))
    }

    /// See [`IpaEditor::set_build_number`].
    pub fn set_build_number(&mut self, build_number: Option<&str>) -> &mut Self {
        self.attempt("set build number", |editor| editor.set_build_number(build_number).map(drop))
    }

    /// See [`IpaEditor::apply`].
    pub fn apply(&mut self, integration: &Integration) -> &mut Self {
        let step = format!("apply {} integration", integration.name());
        self.attempt(&step, |editor| editor.apply(integration).map(drop))
    }

    /// See [`IpaEditor::replace_icon`].
    pub fn replace_icon(&mut self, source: &IconSource, mode: IconMode) -> &mut Self {
        self.attempt("replace icon", |editor| editor.replace_icon(source, mode).map(drop))
    }

    /// See [`IpaEditor::resign`].
    pub fn resign(&mut self, resigner: &Resigner) -> &mut Self {
        self.attempt("re-sign", |editor| editor.resign(resigner).map(drop))
    }

    /// Failures recorded so far.
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Release the editor and return the recorded failures.
    pub fn finish(&mut self) -> Vec<Failure> {
        std::mem::take(&mut self.failures)
    }

    fn attempt(&mut self, step: &str, f: impl FnOnce(&mut IpaEditor) -> Result<()>) -> &mut Self {
        if let Err(error) = f(&mut *self.editor) {
            tracing::warn!("{step} failed, continuing: {error}");
            self.failures.push(Failure {
                step: step.to_string(),
                error,
            });
        }
        self
    }
}
