//! Re-signing an edited application with `codesign`.

use super::run_tool;
use crate::{Error, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const CODE_SIGNATURE_DIR: &str = "_CodeSignature";
const EMBEDDED_PROFILE: &str = "embedded.mobileprovision";
const ENTITLEMENTS_FILE: &str = "entitlements.plist";

/// Signs an application directory with a certificate identity and a
/// provisioning profile.
///
/// The steps are:
/// 1. decode the profile with `security cms -D -i` and keep its
///    `Entitlements` dictionary;
/// 2. remove `_CodeSignature` and replace `embedded.mobileprovision`;
/// 3. sign every `Frameworks/**/*.framework`, innermost first;
/// 4. sign the app, then sign it again with `--preserve-metadata
///    --generate-entitlement-der` for DER entitlements.
///
/// # Examples
///
/// ```no_run
/// use ipastamp::external::Resigner;
/// use std::path::Path;
///
/// Resigner::new("Apple Distribution: Example", "profile.mobileprovision")
///     .resign(Path::new("Payload/App.app"))?;
/// # Ok::<(), ipastamp::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Resigner {
    identity: String,
    provisioning_profile: PathBuf,
    codesign: PathBuf,
    security: PathBuf,
}

impl Resigner {
    /// Signer for `identity` (a keychain certificate name or SHA-1).
    pub fn new(identity: impl Into<String>, provisioning_profile: impl Into<PathBuf>) -> Self {
        Self {
            identity: identity.into(),
            provisioning_profile: provisioning_profile.into(),
            codesign: PathBuf::from("/usr/bin/codesign"),
            security: PathBuf::from("/usr/bin/security"),
        }
    }

    /// Use a different `codesign` binary.
    pub fn codesign_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.codesign = program.into();
        self
    }

    /// Use a different `security` binary.
    pub fn security_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.security = program.into();
        self
    }

    /// The signing identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The provisioning profile.
    pub fn provisioning_profile(&self) -> &Path {
        &self.provisioning_profile
    }

    /// Re-sign `app_dir` in place.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the profile is missing or has no entitlements.
    /// - [`Error::ExternalTool`] if `security` or `codesign` fails.
    pub fn resign(&self, app_dir: &Path) -> Result<()> {
        if !self.provisioning_profile.is_file() {
            return Err(Error::Config(format!(
                "Provisioning profile not found: {}",
                self.provisioning_profile.display()
            )));
        }

        let work_dir = tempfile::Builder::new().prefix("ipastamp-sign-").tempdir()?;
        let decoded = run_tool(
            &self.security,
            [
                OsString::from("cms"),
                "-D".into(),
                "-i".into(),
                self.provisioning_profile.clone().into(),
            ],
        )?;
        let entitlements_path = work_dir.path().join(ENTITLEMENTS_FILE);
        fs::write(&entitlements_path, entitlements_from_profile(&decoded)?)?;

        let signature_dir = app_dir.join(CODE_SIGNATURE_DIR);
        if signature_dir.exists() {
            fs::remove_dir_all(&signature_dir)?;
        }
        let embedded = app_dir.join(EMBEDDED_PROFILE);
        if embedded.symlink_metadata().is_ok() {
            fs::remove_file(&embedded)?;
        }
        fs::copy(&self.provisioning_profile, &embedded)?;

        for framework in framework_bundles(app_dir)? {
            tracing::debug!("Signing {}", framework.display());
            run_tool(&self.codesign, self.sign_args(&framework, &entitlements_path))?;
        }
        run_tool(&self.codesign, self.sign_args(app_dir, &entitlements_path))?;
        run_tool(&self.codesign, self.preserve_metadata_args(app_dir))?;

        tracing::info!("Signed {} as {}", app_dir.display(), self.identity);
        Ok(())
    }

    /// `codesign -f -s <identity> --entitlements <file> <target>`
    pub fn sign_args(&self, target: &Path, entitlements: &Path) -> Vec<OsString> {
        vec![
            "-f".into(),
            "-s".into(),
            self.identity.clone().into(),
            "--entitlements".into(),
            entitlements.into(),
            target.into(),
        ]
    }

    /// `codesign -s <identity> -f --preserve-metadata --generate-entitlement-der <target>`
    pub fn preserve_metadata_args(&self, target: &Path) -> Vec<OsString> {
        vec![
            "-s".into(),
            self.identity.clone().into(),
            "-f".into(),
            "--preserve-metadata".into(),
            "--generate-entitlement-der".into(),
            target.into(),
        ]
    }
}

/// Extract the `Entitlements` dictionary of a provisioning profile as XML.
///
/// Accepts either the decoded profile plist or the raw CMS envelope, in
/// which case the embedded `<?xml … </plist>` payload is located first.
///
/// # Errors
///
/// [`Error::Config`] if no plist or no `Entitlements` key is found.
pub fn entitlements_from_profile(profile_data: &[u8]) -> Result<Vec<u8>> {
    let start = profile_data
        .windows(6)
        .position(|w| w == b"<?xml ")
        .ok_or_else(|| Error::Config("Provisioning profile contains no plist".into()))?;
    let end = profile_data
        .windows(8)
        .rposition(|w| w == b"</plist>")
        .map(|pos| pos + 8)
        .filter(|&end| end > start)
        .ok_or_else(|| Error::Config("Provisioning profile plist is truncated".into()))?;

    let profile: plist::Value = plist::from_bytes(&profile_data[start..end])
        .map_err(|e| Error::Config(format!("Cannot parse provisioning profile: {e}")))?;
    let entitlements = profile
        .as_dictionary()
        .and_then(|dict| dict.get("Entitlements"))
        .ok_or_else(|| Error::Config("Provisioning profile has no Entitlements".into()))?;

    let mut buf = Vec::new();
    plist::to_writer_xml(&mut buf, entitlements).map_err(Error::MetadataEncodeFailed)?;
    Ok(buf)
}

/// Every `.framework` directory under `app_dir/Frameworks`, nested ones
/// before the bundles that contain them.
pub fn framework_bundles(app_dir: &Path) -> Result<Vec<PathBuf>> {
    let frameworks_dir = app_dir.join("Frameworks");
    if !frameworks_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut bundles = Vec::new();
    for entry in WalkDir::new(&frameworks_dir)
        .min_depth(1)
        .follow_links(false)
        .contents_first(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::other)?;
        if entry.file_type().is_dir() && entry.path().extension().is_some_and(|ext| ext == "framework") {
            bundles.push(entry.into_path());
        }
    }
    Ok(bundles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROFILE_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Name</key>
    <string>Test Profile</string>
    <key>Entitlements</key>
    <dict>
        <key>application-identifier</key>
        <string>TEAM.com.example.app</string>
        <key>get-task-allow</key>
        <false/>
    </dict>
</dict>
</plist>"#;

    #[test]
    fn test_entitlements_from_cms_envelope() {
        let mut data = b"\x30\x82\x0f\x00garbage".to_vec();
        data.extend_from_slice(PROFILE_PLIST.as_bytes());
        data.extend_from_slice(b"\x00\x01signature");

        let xml = entitlements_from_profile(&data).unwrap();
        let value: plist::Value = plist::from_bytes(&xml).unwrap();
        let dict = value.as_dictionary().unwrap();
        assert_eq!(
            dict.get("application-identifier").and_then(|v| v.as_string()),
            Some("TEAM.com.example.app")
        );
        assert!(dict.get("Name").is_none());
    }

    #[test]
    fn test_entitlements_missing() {
        let profile = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><dict><key>Name</key><string>x</string></dict></plist>"#;
        assert!(matches!(
            entitlements_from_profile(profile.as_bytes()),
            Err(Error::Config(_))
        ));
        assert!(entitlements_from_profile(b"no plist here").is_err());
    }

    #[test]
    fn test_framework_bundles_inner_first() {
        let temp_dir = TempDir::new().unwrap();
        let app = temp_dir.path().join("Test.app");
        fs::create_dir_all(app.join("Frameworks/Outer.framework/Frameworks/Inner.framework")).unwrap();
        fs::create_dir_all(app.join("Frameworks/Another.framework")).unwrap();
        fs::write(app.join("Frameworks/libswiftCore.dylib"), b"dylib").unwrap();

        let bundles = framework_bundles(&app).unwrap();
        let names: Vec<_> = bundles
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["Another.framework", "Inner.framework", "Outer.framework"]);
    }

    #[test]
    fn test_no_frameworks_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(framework_bundles(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_argument_lists() {
        let signer = Resigner::new("Apple Distribution: Example", "p.mobileprovision");
        let args = signer.sign_args(Path::new("/a/App.app"), Path::new("/w/entitlements.plist"));
        assert_eq!(
            args,
            vec![
                OsString::from("-f"),
                "-s".into(),
                "Apple Distribution: Example".into(),
                "--entitlements".into(),
                "/w/entitlements.plist".into(),
                "/a/App.app".into(),
            ]
        );
        let args = signer.preserve_metadata_args(Path::new("/a/App.app"));
        assert!(args.contains(&OsString::from("--generate-entitlement-der")));
        assert_eq!(args.last().unwrap(), "/a/App.app");
    }

    #[test]
    fn test_missing_profile() {
        let temp_dir = TempDir::new().unwrap();
        let err = Resigner::new("id", temp_dir.path().join("missing.mobileprovision"))
            .resign(temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    #[cfg(unix)]
    fn test_resign_with_stub_tools() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let bin = temp_dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let log = temp_dir.path().join("codesign.log");

        let security = bin.join("security");
        fs::write(&security, "#!/bin/sh\ncat \"$4\"\n").unwrap();
        let codesign = bin.join("codesign");
        fs::write(
            &codesign,
            format!("#!/bin/sh\necho \"$@\" >> '{}'\n", log.display()),
        )
        .unwrap();
        for tool in [&security, &codesign] {
            fs::set_permissions(tool, fs::Permissions::from_mode(0o755)).unwrap();
        }

        let profile = temp_dir.path().join("new.mobileprovision");
        fs::write(&profile, PROFILE_PLIST).unwrap();

        let app = temp_dir.path().join("Test.app");
        fs::create_dir_all(app.join("_CodeSignature")).unwrap();
        fs::create_dir_all(app.join("Frameworks/Kit.framework")).unwrap();
        fs::write(app.join("embedded.mobileprovision"), b"old profile").unwrap();

        Resigner::new("Example Identity", &profile)
            .security_program(&security)
            .codesign_program(&codesign)
            .resign(&app)
            .unwrap();

        assert!(!app.join("_CodeSignature").exists());
        assert_eq!(
            fs::read_to_string(app.join("embedded.mobileprovision")).unwrap(),
            PROFILE_PLIST
        );

        let calls = fs::read_to_string(&log).unwrap();
        let calls: Vec<&str> = calls.lines().collect();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].ends_with("Kit.framework"));
        assert!(calls[1].starts_with("-f -s Example Identity --entitlements"));
        assert!(calls[2].contains("--preserve-metadata --generate-entitlement-der"));
    }
}
