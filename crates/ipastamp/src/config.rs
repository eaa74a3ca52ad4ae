//! Edit manifests.
//!
//! A manifest is a TOML file describing every change to stamp onto a
//! template, so a release pipeline can keep one file per app flavour:
//!
//! ```toml
//! bundle_id = "com.example.app"
//! display_name = "Example"
//! version = "1.2.0"
//! build_number = "42"
//! zip_level = 9
//!
//! [icon]
//! source = "https://cdn.example.com/icon-1024.png"
//!
//! [signing]
//! identity = "Apple Distribution: Example Ltd"
//! provisioning_profile = "profiles/example.mobileprovision"
//!
//! [integrations.facebook]
//! app_id = "555"
//!
//! [integrations.qq]
//! app_id = "100424468"
//! ```
//!
//! Relative paths are resolved against the manifest's directory by
//! [`EditManifest::load`]. Every field is optional.

use crate::external::Resigner;
use crate::icon::{IconMode, IconSource};
use crate::schemes::Integration;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// All edits for one output package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditManifest {
    /// New `CFBundleIdentifier`.
    pub bundle_id: Option<String>,

    /// New `CFBundleDisplayName`.
    pub display_name: Option<String>,

    /// New `CFBundleShortVersionString`.
    pub version: Option<String>,

    /// New `CFBundleVersion`.
    pub build_number: Option<String>,

    /// Output compression level (0-9).
    pub zip_level: Option<u32>,

    /// Icon replacement.
    pub icon: Option<IconConfig>,

    /// Re-signing after the edits.
    pub signing: Option<SigningConfig>,

    /// SDK registrations.
    #[serde(default)]
    pub integrations: IntegrationConfig,
}

/// `[icon]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IconConfig {
    /// Local path or `http(s)://` URL of the master image.
    pub source: String,

    /// Accept any square image instead of requiring 1024×1024.
    #[serde(default)]
    pub lenient: bool,
}

impl IconConfig {
    /// Parsed source location.
    pub fn icon_source(&self) -> Result<IconSource> {
        IconSource::parse(&self.source)
    }

    /// Validation mode.
    pub fn mode(&self) -> IconMode {
        if self.lenient {
            IconMode::Lenient
        } else {
            IconMode::Strict
        }
    }
}

/// `[signing]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningConfig {
    /// Keychain certificate name or SHA-1.
    pub identity: String,

    /// Provisioning profile to embed.
    pub provisioning_profile: PathBuf,
}

impl SigningConfig {
    /// A signer for this identity and profile.
    pub fn resigner(&self) -> Resigner {
        Resigner::new(self.identity.clone(), self.provisioning_profile.clone())
    }
}

/// `[integrations.*]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntegrationConfig {
    /// `[integrations.facebook]`
    pub facebook: Option<FacebookConfig>,
    /// `[integrations.google]`
    pub google: Option<GoogleConfig>,
    /// `[integrations.wechat]`
    pub wechat: Option<AppIdConfig>,
    /// `[integrations.qq]`
    pub qq: Option<AppIdConfig>,
    /// `[integrations.linkdeep]`
    pub linkdeep: Option<LinkDeepConfig>,
}

/// `[integrations.facebook]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacebookConfig {
    /// `FacebookAppID`, also registered as the `fb{app_id}` scheme.
    pub app_id: Option<String>,
    /// `FacebookClientToken`.
    pub client_token: Option<String>,
    /// `FacebookDisplayName`.
    pub display_name: Option<String>,
}

/// `[integrations.google]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoogleConfig {
    /// OAuth client id ending in `.apps.googleusercontent.com`.
    pub client_id: Option<String>,
}

/// `[integrations.wechat]` and `[integrations.qq]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppIdConfig {
    /// SDK application id.
    pub app_id: Option<String>,
}

/// `[integrations.linkdeep]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkDeepConfig {
    /// Scheme for the `com.link-deep.appkey` entry.
    pub app_key: Option<String>,
    /// Scheme for the `com.link-deep.groupkey` entry.
    pub group_key: Option<String>,
}

impl IntegrationConfig {
    /// The configured integrations, in a fixed order.
    pub fn to_integrations(&self) -> Vec<Integration> {
        let mut integrations = Vec::new();
        if let Some(fb) = &self.facebook {
            integrations.push(Integration::Facebook {
                app_id: fb.app_id.clone(),
                client_token: fb.client_token.clone(),
                display_name: fb.display_name.clone(),
            });
        }
        if let Some(google) = &self.google {
            integrations.push(Integration::Google {
                client_id: google.client_id.clone(),
            });
        }
        if let Some(wechat) = &self.wechat {
            integrations.push(Integration::WeChat {
                app_id: wechat.app_id.clone(),
            });
        }
        if let Some(qq) = &self.qq {
            integrations.push(Integration::QQ {
                app_id: qq.app_id.clone(),
            });
        }
        if let Some(linkdeep) = &self.linkdeep {
            integrations.push(Integration::LinkDeep {
                app_key: linkdeep.app_key.clone(),
                group_key: linkdeep.group_key.clone(),
            });
        }
        integrations
    }
}

impl EditManifest {
    /// Read a manifest file and resolve its relative paths.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read manifest {}: {e}", path.display())))?;
        let mut manifest: EditManifest = text.parse()?;
        if let Some(base) = path.parent() {
            manifest.resolve_paths(base);
        }
        tracing::debug!("Loaded manifest {}", path.display());
        Ok(manifest)
    }

    /// Make relative local paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(icon) = &mut self.icon {
            if let Ok(IconSource::Local(path)) = IconSource::parse(&icon.source) {
                if path.is_relative() {
                    icon.source = base.join(path).to_string_lossy().into_owned();
                }
            }
        }
        if let Some(signing) = &mut self.signing {
            if signing.provisioning_profile.is_relative() {
                signing.provisioning_profile = base.join(&signing.provisioning_profile);
            }
        }
    }
}

impl FromStr for EditManifest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(format!("Invalid manifest: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FULL: &str = r#"
bundle_id = "com.example.app"
display_name = "Example"
version = "1.2.0"
build_number = "42"
zip_level = 9

[icon]
source = "art/icon.png"
lenient = true

[signing]
identity = "Apple Distribution: Example"
provisioning_profile = "profiles/example.mobileprovision"

[integrations.facebook]
app_id = "555"
display_name = "Example"

[integrations.google]
client_id = "123-abc.apps.googleusercontent.com"

[integrations.qq]
app_id = "100424468"

[integrations.linkdeep]
group_key = "grp"
"#;

    #[test]
    fn test_parse_full_manifest() {
        let manifest: EditManifest = FULL.parse().unwrap();
        assert_eq!(manifest.bundle_id.as_deref(), Some("com.example.app"));
        assert_eq!(manifest.zip_level, Some(9));
        assert_eq!(manifest.icon.as_ref().unwrap().mode(), IconMode::Lenient);

        let integrations = manifest.integrations.to_integrations();
        assert_eq!(integrations.len(), 4);
        assert_eq!(
            integrations[0],
            Integration::Facebook {
                app_id: Some("555".into()),
                client_token: None,
                display_name: Some("Example".into()),
            }
        );
        assert_eq!(
            integrations[3],
            Integration::LinkDeep {
                app_key: None,
                group_key: Some("grp".into()),
            }
        );
    }

    #[test]
    fn test_empty_manifest() {
        let manifest: EditManifest = "".parse().unwrap();
        assert_eq!(manifest, EditManifest::default());
        assert!(manifest.integrations.to_integrations().is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = "bundle_identifier = \"x\"".parse::<EditManifest>().unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("bundle_identifier")));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("flavour.toml");
        fs::write(&path, FULL).unwrap();

        let manifest = EditManifest::load(&path).unwrap();
        assert_eq!(
            manifest.icon.unwrap().source,
            temp_dir.path().join("art/icon.png").to_string_lossy()
        );
        assert_eq!(
            manifest.signing.unwrap().provisioning_profile,
            temp_dir.path().join("profiles/example.mobileprovision")
        );
    }

    #[test]
    fn test_remote_icon_is_not_rewritten() {
        let mut manifest: EditManifest = "[icon]\nsource = \"https://cdn.example.com/i.png\""
            .parse()
            .unwrap();
        manifest.resolve_paths(Path::new("/base"));
        assert_eq!(manifest.icon.unwrap().source, "https://cdn.example.com/i.png");
    }

    #[test]
    fn test_missing_file() {
        let err = EditManifest::load("/nonexistent/manifest.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
