//! Command-line interface for ipastamp.
//!
//! Stamps a template IPA with a new identity, icon and SDK configuration,
//! taken from flags, a TOML manifest, or both (flags win).

use anyhow::{bail, Context, Result};
use clap::Parser;
use ipastamp::config::{EditManifest, IconConfig, SigningConfig};
use ipastamp::{CompressionLevel, IpaEditor};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ipastamp")]
#[command(about = "Re-stamp iOS app archives with new metadata and icons")]
struct Cli {
    /// Template IPA
    input: PathBuf,

    /// Output IPA (default: <input>.stamped.ipa)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML edit manifest
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// New CFBundleIdentifier
    #[arg(long)]
    bundle_id: Option<String>,

    /// New CFBundleDisplayName
    #[arg(long)]
    display_name: Option<String>,

    /// New CFBundleShortVersionString
    #[arg(long = "version")]
    app_version: Option<String>,

    /// New CFBundleVersion
    #[arg(long)]
    build_number: Option<String>,

    /// Master icon (path or http(s) URL)
    #[arg(short, long)]
    icon: Option<String>,

    /// Accept any square icon instead of requiring 1024x1024
    #[arg(long)]
    lenient_icon: bool,

    /// ZIP compression level (0-9, default: 6)
    #[arg(short = 'z', long)]
    zip_level: Option<u32>,

    /// Log failed steps and keep going instead of stopping
    #[arg(long)]
    keep_going: bool,

    /// Signing identity for re-signing after the edits
    #[arg(short = 's', long)]
    sign_identity: Option<String>,

    /// Provisioning profile for re-signing
    #[arg(short = 'p', long)]
    provisioning_profile: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let manifest = merged_manifest(&cli)?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.input));

    let zip_level = manifest.zip_level.unwrap_or(CompressionLevel::DEFAULT.level());
    let mut editor = IpaEditor::open(&cli.input)
        .with_context(|| format!("Failed to open {}", cli.input.display()))?
        .compression_level(zip_level);

    if cli.keep_going {
        stamp_lenient(&mut editor, &manifest)?;
    } else {
        stamp(&mut editor, &manifest)?;
    }

    editor
        .package(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    editor.close()?;

    println!("Stamped: {}", output.display());
    Ok(())
}

/// Stop at the first failing step.
fn stamp(editor: &mut IpaEditor, manifest: &EditManifest) -> Result<()> {
    editor
        .set_bundle_id(manifest.bundle_id.as_deref())
        .context("Failed to set bundle id")?
        .set_display_name(manifest.display_name.as_deref())
        .context("Failed to set display name")?
        .set_version(manifest.version.as_deref())
        .context("Failed to set version")?
        .set_build_number(manifest.build_number.as_deref())
        .context("Failed to set build number")?;

    for integration in manifest.integrations.to_integrations() {
        editor
            .apply(&integration)
            .with_context(|| format!("Failed to apply {} integration", integration.name()))?;
    }

    if let Some(icon) = &manifest.icon {
        editor
            .replace_icon(&icon.icon_source()?, icon.mode())
            .with_context(|| format!("Failed to replace icon from {}", icon.source))?;
    }

    if let Some(signing) = &manifest.signing {
        editor.resign(&signing.resigner()).context("Failed to re-sign")?;
    }
    Ok(())
}

/// Log failing steps and carry on.
fn stamp_lenient(editor: &mut IpaEditor, manifest: &EditManifest) -> Result<()> {
    let icon_source = manifest
        .icon
        .as_ref()
        .map(|icon| icon.icon_source().map(|source| (source, icon.mode())))
        .transpose()?;

    let mut lenient = editor.lenient();
    lenient
        .set_bundle_id(manifest.bundle_id.as_deref())
        .set_display_name(manifest.display_name.as_deref())
        .set_version(manifest.version.as_deref())
        .set_build_number(manifest.build_number.as_deref());
    for integration in manifest.integrations.to_integrations() {
        lenient.apply(&integration);
    }
    if let Some((source, mode)) = &icon_source {
        lenient.replace_icon(source, *mode);
    }
    if let Some(signing) = &manifest.signing {
        lenient.resign(&signing.resigner());
    }

    let failures = lenient.finish();
    if !failures.is_empty() {
        tracing::warn!("{} step(s) failed and were skipped", failures.len());
    }
    Ok(())
}

/// The manifest (if any) with command-line flags applied on top.
fn merged_manifest(cli: &Cli) -> Result<EditManifest> {
    let mut manifest = match &cli.manifest {
        Some(path) => EditManifest::load(path)
            .with_context(|| format!("Failed to load manifest {}", path.display()))?,
        None => EditManifest::default(),
    };

    override_with(&mut manifest.bundle_id, &cli.bundle_id);
    override_with(&mut manifest.display_name, &cli.display_name);
    override_with(&mut manifest.version, &cli.app_version);
    override_with(&mut manifest.build_number, &cli.build_number);
    override_with(&mut manifest.zip_level, &cli.zip_level);

    if let Some(source) = &cli.icon {
        manifest.icon = Some(IconConfig {
            source: source.clone(),
            lenient: cli.lenient_icon,
        });
    } else if let Some(icon) = &mut manifest.icon {
        icon.lenient |= cli.lenient_icon;
    }

    let (identity, profile) = (&cli.sign_identity, &cli.provisioning_profile);
    if let Some(signing) = manifest.signing.as_mut() {
        if let Some(identity) = identity {
            signing.identity = identity.clone();
        }
        if let Some(profile) = profile {
            signing.provisioning_profile = profile.clone();
        }
    } else {
        match (identity, profile) {
            (None, None) => {}
            (Some(identity), Some(profile)) => {
                manifest.signing = Some(SigningConfig {
                    identity: identity.clone(),
                    provisioning_profile: profile.clone(),
                });
            }
            _ => bail!("--sign-identity and --provisioning-profile must be given together"),
        }
    }

    Ok(manifest)
}

fn override_with<T: Clone>(target: &mut Option<T>, flag: &Option<T>) {
    if flag.is_some() {
        target.clone_from(flag);
    }
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}.stamped.ipa"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output() {
        assert_eq!(
            default_output(Path::new("/builds/Template.ipa")),
            PathBuf::from("/builds/Template.stamped.ipa")
        );
    }

    #[test]
    fn test_flags_build_manifest() {
        let cli = Cli::parse_from([
            "ipastamp",
            "Template.ipa",
            "--bundle-id",
            "com.new",
            "--version",
            "2.0",
            "--icon",
            "icon.png",
            "--lenient-icon",
            "-z",
            "0",
        ]);
        let manifest = merged_manifest(&cli).unwrap();
        assert_eq!(manifest.bundle_id.as_deref(), Some("com.new"));
        assert_eq!(manifest.version.as_deref(), Some("2.0"));
        assert_eq!(manifest.zip_level, Some(0));
        let icon = manifest.icon.unwrap();
        assert_eq!(icon.source, "icon.png");
        assert!(icon.lenient);
    }

    #[test]
    fn test_partial_signing_flags_rejected() {
        let cli = Cli::parse_from(["ipastamp", "Template.ipa", "--sign-identity", "Dev"]);
        assert!(merged_manifest(&cli).is_err());
    }
}
