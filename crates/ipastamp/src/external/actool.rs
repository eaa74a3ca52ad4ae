//! Compiling an asset catalog into the app with `actool`.
//!
//! Used for templates that ship a compiled `Assets.car` icon only. The
//! loose-file path in [`crate::icon`] is preferred; this is the fallback.

use super::run_tool;
use crate::document::MetadataDocument;
use crate::icon::DeviceClass;
use crate::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Runs `actool --compile` for one `.xcassets` catalog.
#[derive(Debug, Clone)]
pub struct AssetCatalogCompiler {
    program: PathBuf,
    platform: String,
    minimum_deployment_target: String,
    app_icon: String,
}

impl Default for AssetCatalogCompiler {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/usr/bin/actool"),
            platform: "iphoneos".into(),
            minimum_deployment_target: "9.0".into(),
            app_icon: "AppIcon".into(),
        }
    }
}

impl AssetCatalogCompiler {
    /// Compiler with the `iphoneos` / 9.0 / `AppIcon` defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different `actool` binary.
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Set `--minimum-deployment-target`.
    pub fn minimum_deployment_target(mut self, version: impl Into<String>) -> Self {
        self.minimum_deployment_target = version.into();
        self
    }

    /// Set the `--app-icon` set name.
    pub fn app_icon(mut self, name: impl Into<String>) -> Self {
        self.app_icon = name.into();
        self
    }

    /// Arguments for compiling `catalog` into `app_dir`.
    pub fn compile_args(&self, catalog: &Path, app_dir: &Path, partial_plist: &Path) -> Vec<OsString> {
        vec![
            catalog.into(),
            "--compile".into(),
            app_dir.into(),
            "--platform".into(),
            self.platform.clone().into(),
            "--minimum-deployment-target".into(),
            self.minimum_deployment_target.clone().into(),
            "--app-icon".into(),
            self.app_icon.clone().into(),
            "--output-partial-info-plist".into(),
            partial_plist.into(),
        ]
    }

    /// Compile `catalog` into `app_dir` and merge the icon keys `actool`
    /// reports into `document`.
    ///
    /// Returns whether the document changed. The caller commits it.
    ///
    /// # Errors
    ///
    /// [`Error::ExternalTool`] if the catalog is missing or `actool` fails.
    pub fn compile(&self, catalog: &Path, app_dir: &Path, document: &mut MetadataDocument) -> Result<bool> {
        if !catalog.is_dir() {
            return Err(Error::ExternalTool {
                tool: "actool".into(),
                message: format!("asset catalog not found: {}", catalog.display()),
            });
        }

        let work_dir = tempfile::Builder::new().prefix("ipastamp-actool-").tempdir()?;
        let partial = work_dir.path().join("partial-info.plist");
        run_tool(&self.program, self.compile_args(catalog, app_dir, &partial))?;

        let changed = merge_partial_info(document, &partial)?;
        tracing::info!("Compiled {} into {}", catalog.display(), app_dir.display());
        Ok(changed)
    }
}

/// Copy the icon configuration of an `actool` partial `Info.plist` into
/// `document`, replacing what was there.
///
/// Returns whether anything was copied.
pub fn merge_partial_info(document: &mut MetadataDocument, partial_plist: &Path) -> Result<bool> {
    let partial = MetadataDocument::load(partial_plist)?;
    let mut changed = false;
    for class in DeviceClass::ALL {
        let key = class.root_key();
        if let Some(value) = partial.get(key) {
            if document.get(key) != Some(value) {
                document.replace(key, value.clone());
                changed = true;
            }
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Value;
    use plist::Dictionary;
    use std::fs;
    use tempfile::TempDir;

    const PARTIAL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>CFBundleIcons</key>
    <dict>
        <key>CFBundlePrimaryIcon</key>
        <dict>
            <key>CFBundleIconFiles</key>
            <array><string>AppIcon60x60</string></array>
            <key>CFBundleIconName</key>
            <string>AppIcon</string>
        </dict>
    </dict>
</dict>
</plist>"#;

    #[test]
    fn test_compile_args() {
        let args = AssetCatalogCompiler::new()
            .minimum_deployment_target("12.0")
            .compile_args(Path::new("A.xcassets"), Path::new("App.app"), Path::new("p.plist"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args.join(" "),
            "A.xcassets --compile App.app --platform iphoneos --minimum-deployment-target 12.0 \
             --app-icon AppIcon --output-partial-info-plist p.plist"
        );
    }

    #[test]
    fn test_merge_partial_info() {
        let temp_dir = TempDir::new().unwrap();
        let partial = temp_dir.path().join("partial.plist");
        fs::write(&partial, PARTIAL).unwrap();

        let mut root = Dictionary::new();
        root.insert("CFBundleIcons".into(), Value::from("stale"));
        let mut doc = MetadataDocument::from_dictionary(temp_dir.path().join("Info.plist"), root);

        assert!(merge_partial_info(&mut doc, &partial).unwrap());
        assert_eq!(
            doc.get_str(DeviceClass::Phone.name_key_path()),
            Some("AppIcon")
        );
        assert!(doc.get("CFBundleIcons~ipad").is_none());
        assert!(!merge_partial_info(&mut doc, &partial).unwrap());
    }

    #[test]
    fn test_missing_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let mut doc = MetadataDocument::from_dictionary(temp_dir.path().join("Info.plist"), Dictionary::new());
        let err = AssetCatalogCompiler::new()
            .compile(&temp_dir.path().join("none.xcassets"), temp_dir.path(), &mut doc)
            .unwrap_err();
        assert!(matches!(err, Error::ExternalTool { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_compile_with_stub_tool() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let template = temp_dir.path().join("partial-template.plist");
        fs::write(&template, PARTIAL).unwrap();

        // The partial plist path is the last argument.
        let actool = temp_dir.path().join("actool");
        fs::write(
            &actool,
            format!(
                "#!/bin/sh\nfor last; do :; done\ncp '{}' \"$last\"\n",
                template.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&actool, fs::Permissions::from_mode(0o755)).unwrap();

        let catalog = temp_dir.path().join("Assets.xcassets");
        fs::create_dir_all(&catalog).unwrap();
        let app = temp_dir.path().join("Test.app");
        fs::create_dir_all(&app).unwrap();
        let mut doc = MetadataDocument::from_dictionary(app.join("Info.plist"), Dictionary::new());

        let changed = AssetCatalogCompiler::new()
            .program(&actool)
            .compile(&catalog, &app, &mut doc)
            .unwrap();

        assert!(changed);
        assert_eq!(
            doc.get_string_array(DeviceClass::Phone.files_key_path()),
            Some(vec!["AppIcon60x60".to_string()])
        );
    }
}
