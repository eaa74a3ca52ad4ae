//! Regeneration of the loose icon files and their `Info.plist` entries.

use super::resolver::{resolve, Resolution};
use super::slot::{DeviceClass, IconSlot, StandardSizes, GENERATED_BASE_NAME, MASTER_ICON_SIZE};
use crate::document::{keys, MetadataDocument, Value};
use crate::{Error, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use rayon::prelude::*;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// File names this crate generates: `AppIcon{W}x{H}[@Nx][~ipad].png`.
static GENERATED_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^({GENERATED_BASE_NAME}[0-9]+(?:\.[0-9]+)?x[0-9]+(?:\.[0-9]+)?)(?:@[0-9]x)?(~ipad)?\.png$"
    ))
    .expect("valid regex")
});

/// How strictly the master icon is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IconMode {
    /// Exactly 1024×1024.
    #[default]
    Strict,
    /// Any square image.
    Lenient,
}

/// What an icon replacement did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IconReport {
    /// Files written, in render order.
    pub written: Vec<PathBuf>,
    /// Stale files deleted.
    pub removed: Vec<PathBuf>,
    /// Entries appended to an icon-file list.
    pub added_entries: Vec<(DeviceClass, String)>,
    /// Entries left alone because no size could be determined.
    pub unresolved: Vec<(DeviceClass, String)>,
    /// Whether the document was modified and needs committing.
    pub document_changed: bool,
}

/// One class's icon list and what it resolved to.
struct ClassPlan {
    class: DeviceClass,
    entries: Vec<String>,
    resolution: Resolution,
    /// Whether the resolved list is written back to `files_key_path`.
    owns_list: bool,
}

/// Renders one master image into every icon file an app references.
///
/// Classes are taken from the document: `CFBundleIcons` drives the phone
/// set and `CFBundleIcons~ipad` the pad set. When neither exists the phone
/// set is created. Entries of the legacy top-level `CFBundleIconFiles` are
/// refreshed as phone icons without gap filling.
///
/// All images are resampled and encoded in memory before the first file is
/// written, so a bad source or a failed encode leaves the app untouched.
///
/// # Examples
///
/// ```no_run
/// use ipastamp::icon::{IconAssetWriter, IconMode};
/// use ipastamp::MetadataDocument;
/// use std::path::Path;
///
/// let app = Path::new("Payload/App.app");
/// let mut doc = MetadataDocument::load(app.join("Info.plist"))?;
/// let report = IconAssetWriter::new(app)
///     .mode(IconMode::Lenient)
///     .replace(&mut doc, Path::new("icon.png"))?;
/// if report.document_changed {
///     doc.commit()?;
/// }
/// # Ok::<(), ipastamp::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct IconAssetWriter<'a> {
    app_dir: &'a Path,
    mode: IconMode,
    standard_sizes: StandardSizes,
}

impl<'a> IconAssetWriter<'a> {
    /// Writer for the application directory `app_dir`.
    pub fn new(app_dir: &'a Path) -> Self {
        Self {
            app_dir,
            mode: IconMode::default(),
            standard_sizes: StandardSizes::default(),
        }
    }

    /// Set the source validation mode.
    pub fn mode(mut self, mode: IconMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the standard size tables used for gap filling.
    pub fn standard_sizes(mut self, sizes: StandardSizes) -> Self {
        self.standard_sizes = sizes;
        self
    }

    /// Decode `path` and check it against the current mode.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidIconFormat`] if it does not decode or is not square.
    /// - [`Error::InvalidIconSize`] in strict mode if it is not 1024×1024.
    pub fn load_source(&self, path: &Path) -> Result<DynamicImage> {
        let data = fs::read(path)?;
        let image = image::load_from_memory(&data).map_err(|e| {
            Error::InvalidIconFormat(format!("Cannot decode {}: {e}", path.display()))
        })?;

        let (width, height) = image.dimensions();
        if width != height || width == 0 {
            return Err(Error::InvalidIconFormat(format!(
                "Icon must be square, got {width}x{height}"
            )));
        }
        if self.mode == IconMode::Strict && width != MASTER_ICON_SIZE {
            return Err(Error::InvalidIconSize {
                width,
                height,
                expected: MASTER_ICON_SIZE,
            });
        }
        Ok(image)
    }

    /// Regenerate every referenced icon from `source_path`.
    ///
    /// Updates `document` in memory: the compiled catalog name is removed
    /// for each processed class and synthesized entries are appended to its
    /// icon-file list. The caller commits the document.
    pub fn replace(&self, document: &mut MetadataDocument, source_path: &Path) -> Result<IconReport> {
        let source = self.load_source(source_path)?;
        let plans = self.plan(document);

        // Scale sets are fixed before writing: writing creates the legacy 1x
        // files that `scales_for` looks for.
        let mut scale_sets: Vec<(DeviceClass, String, Vec<u32>)> = Vec::new();
        let mut slots: Vec<IconSlot> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for plan in &plans {
            for target in &plan.resolution.targets {
                let scales = plan.class.scales_for(&target.base, self.app_dir);
                for &scale in &scales {
                    let slot = IconSlot {
                        class: plan.class,
                        base: target.base.clone(),
                        point_size: target.point_size,
                        scale,
                    };
                    if seen.insert(slot.file_name()) {
                        slots.push(slot);
                    }
                }
                scale_sets.push((plan.class, target.base.clone(), scales));
            }
        }

        let rendered: Vec<(PathBuf, Vec<u8>)> = slots
            .par_iter()
            .map(|slot| {
                let bytes = render(&source, slot.pixel_size())?;
                Ok((self.app_dir.join(slot.file_name()), bytes))
            })
            .collect::<Result<_>>()?;

        let mut report = IconReport::default();
        for (path, bytes) in rendered {
            fs::write(&path, bytes)?;
            report.written.push(path);
        }

        report.removed = self.prune(&plans, &scale_sets)?;

        for plan in &plans {
            report.unresolved.extend(
                plan.resolution
                    .unresolved
                    .iter()
                    .map(|entry| (plan.class, entry.clone())),
            );
            if !plan.owns_list {
                continue;
            }

            if document.remove(plan.class.name_key_path()).is_some() {
                tracing::debug!("Detached asset catalog icon for {:?}", plan.class);
                report.document_changed = true;
            }
            if !plan.resolution.added.is_empty() {
                let list = plan.resolution.file_list(&plan.entries);
                document.replace(
                    plan.class.files_key_path(),
                    Value::Array(list.into_iter().map(Value::from).collect()),
                );
                report.added_entries.extend(
                    plan.resolution
                        .added
                        .iter()
                        .map(|entry| (plan.class, entry.clone())),
                );
                report.document_changed = true;
            }
        }

        tracing::info!(
            "Wrote {} icon files ({} stale removed, {} entries added)",
            report.written.len(),
            report.removed.len(),
            report.added_entries.len()
        );
        Ok(report)
    }

    fn plan(&self, document: &MetadataDocument) -> Vec<ClassPlan> {
        let mut classes: Vec<DeviceClass> = DeviceClass::ALL
            .into_iter()
            .filter(|class| document.contains(class.root_key()))
            .collect();
        if classes.is_empty() {
            classes.push(DeviceClass::Phone);
        }

        let mut plans: Vec<ClassPlan> = classes
            .into_iter()
            .map(|class| {
                let entries = document
                    .get_string_array(class.files_key_path())
                    .unwrap_or_default();
                let resolution = resolve(
                    &entries,
                    class,
                    self.app_dir,
                    self.standard_sizes.for_class(class),
                );
                ClassPlan {
                    class,
                    entries,
                    resolution,
                    owns_list: true,
                }
            })
            .collect();

        if let Some(legacy) = document.get_string_array(keys::LEGACY_ICON_FILES) {
            let resolution = resolve(&legacy, DeviceClass::Phone, self.app_dir, &[]);
            plans.push(ClassPlan {
                class: DeviceClass::Phone,
                entries: legacy,
                resolution,
                owns_list: false,
            });
        }

        plans
    }

    /// Delete variants outside each base's scale set, and generated files of
    /// a processed class whose base is no longer listed.
    fn prune(
        &self,
        plans: &[ClassPlan],
        scale_sets: &[(DeviceClass, String, Vec<u32>)],
    ) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();

        for (class, base, scales) in scale_sets {
            for scale in [1u32, 2, 3] {
                if scales.contains(&scale) {
                    continue;
                }
                let path = IconSlot::path_for(self.app_dir, base, scale, *class);
                if path.is_file() {
                    fs::remove_file(&path)?;
                    removed.push(path);
                }
            }
        }

        // Only classes with their own icon list count as processed; the
        // top-level legacy list just adds names to keep.
        let mut listed: HashMap<DeviceClass, HashSet<String>> = HashMap::new();
        for plan in plans.iter().filter(|plan| plan.owns_list) {
            let names = listed.entry(plan.class).or_default();
            names.extend(plan.resolution.file_list(&plan.entries));
        }
        for plan in plans.iter().filter(|plan| !plan.owns_list) {
            if let Some(names) = listed.get_mut(&plan.class) {
                names.extend(plan.resolution.file_list(&plan.entries));
            }
        }

        for entry in fs::read_dir(self.app_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(captures) = GENERATED_FILE_PATTERN.captures(file_name) else {
                continue;
            };
            let class = if captures.get(2).is_some() {
                DeviceClass::Pad
            } else {
                DeviceClass::Phone
            };
            let Some(names) = listed.get(&class) else {
                continue;
            };
            if !names.contains(&captures[1]) {
                let path = entry.path();
                fs::remove_file(&path)?;
                removed.push(path);
            }
        }

        for path in &removed {
            tracing::debug!("Removed stale icon {}", path.display());
        }
        Ok(removed)
    }
}

/// Resample `source` to `edge`×`edge` and encode it as PNG.
fn render(source: &DynamicImage, edge: u32) -> Result<Vec<u8>> {
    let resized = source.resize_exact(edge, edge, FilterType::Lanczos3);
    let mut buf = Cursor::new(Vec::new());
    resized
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| Error::InvalidIconFormat(format!("Failed to encode {edge}px icon: {e}")))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use plist::Dictionary;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
        RgbaImage::from_pixel(width, height, Rgba(color))
            .save(path)
            .unwrap();
    }

    fn app_with_document(root: Dictionary) -> (TempDir, PathBuf, MetadataDocument) {
        let temp_dir = TempDir::new().unwrap();
        let app_dir = temp_dir.path().join("Test.app");
        fs::create_dir_all(&app_dir).unwrap();
        let doc = MetadataDocument::from_dictionary(app_dir.join("Info.plist"), root);
        (temp_dir, app_dir, doc)
    }

    fn phone_icons(files: &[&str], name: Option<&str>) -> Dictionary {
        let mut primary = Dictionary::new();
        primary.insert(
            "CFBundleIconFiles".into(),
            Value::Array(files.iter().map(|f| Value::from(*f)).collect()),
        );
        if let Some(name) = name {
            primary.insert("CFBundleIconName".into(), Value::from(name));
        }
        let mut icons = Dictionary::new();
        icons.insert("CFBundlePrimaryIcon".into(), Value::Dictionary(primary));
        let mut root = Dictionary::new();
        root.insert("CFBundleIcons".into(), Value::Dictionary(icons));
        root
    }

    fn dims(path: &Path) -> (u32, u32) {
        image::image_dimensions(path).unwrap()
    }

    fn assert_close(actual: [u8; 4], expected: [u8; 4]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!(a.abs_diff(e) <= 2, "{actual:?} != {expected:?}");
        }
    }

    fn sizes(phone: &[f64], pad: &[f64]) -> StandardSizes {
        StandardSizes {
            phone: phone.to_vec(),
            pad: pad.to_vec(),
        }
    }

    #[test]
    fn test_strict_mode_rejects_wrong_size() {
        let (temp_dir, app_dir, mut doc) = app_with_document(phone_icons(&[], None));
        let source = temp_dir.path().join("icon.png");
        write_png(&source, 512, 512, [255, 0, 0, 255]);

        let err = IconAssetWriter::new(&app_dir)
            .replace(&mut doc, &source)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::InvalidIconSize { width: 512, height: 512, expected: 1024 }
        ));
        assert_eq!(fs::read_dir(&app_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_non_square_is_invalid_format() {
        let (temp_dir, app_dir, mut doc) = app_with_document(phone_icons(&[], None));
        let source = temp_dir.path().join("icon.png");
        write_png(&source, 64, 32, [255, 0, 0, 255]);

        let err = IconAssetWriter::new(&app_dir)
            .mode(IconMode::Lenient)
            .replace(&mut doc, &source)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIconFormat(_)));
    }

    #[test]
    fn test_undecodable_source() {
        let (temp_dir, app_dir, mut doc) = app_with_document(phone_icons(&[], None));
        let source = temp_dir.path().join("icon.png");
        fs::write(&source, b"definitely not an image").unwrap();

        let err = IconAssetWriter::new(&app_dir)
            .replace(&mut doc, &source)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIconFormat(_)));
    }

    #[test]
    fn test_empty_list_generates_standard_set() {
        let (temp_dir, app_dir, mut doc) = app_with_document(phone_icons(&[], Some("AppIcon")));
        let source = temp_dir.path().join("icon.png");
        write_png(&source, 64, 64, [0, 128, 255, 255]);

        let report = IconAssetWriter::new(&app_dir)
            .mode(IconMode::Lenient)
            .standard_sizes(sizes(&[20.0, 29.0, 40.0, 60.0], &[]))
            .replace(&mut doc, &source)
            .unwrap();

        assert_eq!(report.written.len(), 8);
        assert!(report.document_changed);
        assert_eq!(
            doc.get_string_array(DeviceClass::Phone.files_key_path()).unwrap(),
            vec!["AppIcon20x20", "AppIcon29x29", "AppIcon40x40", "AppIcon60x60"]
        );
        assert!(doc.get(DeviceClass::Phone.name_key_path()).is_none());
        assert_eq!(dims(&app_dir.join("AppIcon60x60@3x.png")), (180, 180));
        assert_eq!(dims(&app_dir.join("AppIcon20x20@2x.png")), (40, 40));
        assert!(!app_dir.join("AppIcon20x20.png").exists());
    }

    #[test]
    fn test_iphone_only_app_gets_no_ipad_icons() {
        let (temp_dir, app_dir, mut doc) = app_with_document(phone_icons(&["AppIcon60x60"], None));
        let source = temp_dir.path().join("icon.png");
        write_png(&source, 1024, 1024, [0, 0, 0, 255]);

        IconAssetWriter::new(&app_dir)
            .replace(&mut doc, &source)
            .unwrap();

        assert!(doc.get("CFBundleIcons~ipad").is_none());
        let has_ipad_file = fs::read_dir(&app_dir)
            .unwrap()
            .any(|e| e.unwrap().file_name().to_string_lossy().contains("~ipad"));
        assert!(!has_ipad_file);
    }

    #[test]
    fn test_pad_class_uses_scale_one_and_two() {
        let mut root = phone_icons(&["AppIcon60x60"], None);
        let mut pad_primary = Dictionary::new();
        pad_primary.insert(
            "CFBundleIconFiles".into(),
            Value::Array(vec![Value::from("AppIcon83.5x83.5")]),
        );
        pad_primary.insert("CFBundleIconName".into(), Value::from("AppIcon"));
        let mut pad = Dictionary::new();
        pad.insert("CFBundlePrimaryIcon".into(), Value::Dictionary(pad_primary));
        root.insert("CFBundleIcons~ipad".into(), Value::Dictionary(pad));

        let (temp_dir, app_dir, mut doc) = app_with_document(root);
        let source = temp_dir.path().join("icon.png");
        write_png(&source, 1024, 1024, [0, 0, 0, 255]);

        IconAssetWriter::new(&app_dir)
            .standard_sizes(sizes(&[60.0], &[83.5]))
            .replace(&mut doc, &source)
            .unwrap();

        assert_eq!(dims(&app_dir.join("AppIcon83.5x83.5~ipad.png")), (84, 84));
        assert_eq!(dims(&app_dir.join("AppIcon83.5x83.5@2x~ipad.png")), (167, 167));
        assert!(!app_dir.join("AppIcon83.5x83.5@3x~ipad.png").exists());
        assert!(doc.get(DeviceClass::Pad.name_key_path()).is_none());
    }

    #[test]
    fn test_legacy_icons_are_overwritten_in_place() {
        let (temp_dir, app_dir, mut doc) =
            app_with_document(phone_icons(&["Icon-57", "Icon-29", "AppIcon60x60"], None));
        write_png(&app_dir.join("Icon-57.png"), 57, 57, [1, 1, 1, 255]);
        write_png(&app_dir.join("Icon-29.png"), 29, 29, [1, 1, 1, 255]);
        let source = temp_dir.path().join("icon.png");
        write_png(&source, 1024, 1024, [200, 10, 10, 255]);

        IconAssetWriter::new(&app_dir)
            .standard_sizes(sizes(&[29.0, 57.0, 60.0], &[]))
            .replace(&mut doc, &source)
            .unwrap();

        assert_eq!(dims(&app_dir.join("Icon-57.png")), (57, 57));
        assert_eq!(dims(&app_dir.join("Icon-57@2x.png")), (114, 114));
        assert_eq!(dims(&app_dir.join("Icon-29@3x.png")), (87, 87));
        let pixel = image::open(app_dir.join("Icon-57.png")).unwrap().to_rgba8();
        assert_close(pixel.get_pixel(10, 10).0, [200, 10, 10, 255]);

        let files = doc.get_string_array(DeviceClass::Phone.files_key_path()).unwrap();
        assert_eq!(files, vec!["Icon-57", "Icon-29", "AppIcon60x60"]);
    }

    #[test]
    fn test_top_level_legacy_list_is_refreshed_but_not_extended() {
        let mut root = Dictionary::new();
        root.insert(
            keys::LEGACY_ICON_FILES.into(),
            Value::Array(vec![Value::from("Icon_40")]),
        );
        let (temp_dir, app_dir, mut doc) = app_with_document(root);
        let source = temp_dir.path().join("icon.png");
        write_png(&source, 1024, 1024, [0, 0, 0, 255]);

        IconAssetWriter::new(&app_dir)
            .standard_sizes(sizes(&[40.0, 60.0], &[]))
            .replace(&mut doc, &source)
            .unwrap();

        assert_eq!(dims(&app_dir.join("Icon_40@2x.png")), (80, 80));
        assert_eq!(
            doc.get_string_array(keys::LEGACY_ICON_FILES).unwrap(),
            vec!["Icon_40"]
        );
        assert_eq!(
            doc.get_string_array(DeviceClass::Phone.files_key_path()).unwrap(),
            vec!["AppIcon40x40", "AppIcon60x60"]
        );
    }

    #[test]
    fn test_rerun_replaces_in_place_and_prunes_stale_files() {
        let (temp_dir, app_dir, mut doc) = app_with_document(phone_icons(&[], None));
        let first = temp_dir.path().join("first.png");
        let second = temp_dir.path().join("second.png");
        write_png(&first, 1024, 1024, [255, 0, 0, 255]);
        write_png(&second, 1024, 1024, [0, 255, 0, 255]);

        let writer = IconAssetWriter::new(&app_dir).standard_sizes(sizes(&[20.0, 60.0], &[]));
        writer.replace(&mut doc, &first).unwrap();

        // A generated size dropped from the list and a stray scale variant.
        doc.replace(
            DeviceClass::Phone.files_key_path(),
            Value::Array(vec![Value::from("AppIcon60x60")]),
        );
        write_png(&app_dir.join("AppIcon60x60~ipad.png"), 60, 60, [0, 0, 0, 255]);

        let report = IconAssetWriter::new(&app_dir)
            .standard_sizes(sizes(&[60.0], &[]))
            .replace(&mut doc, &second)
            .unwrap();

        assert!(!app_dir.join("AppIcon20x20@2x.png").exists());
        assert!(!app_dir.join("AppIcon20x20@3x.png").exists());
        assert_eq!(report.removed.len(), 2);
        // Pad files are only pruned when the pad class is processed.
        assert!(app_dir.join("AppIcon60x60~ipad.png").exists());

        let pixel = image::open(app_dir.join("AppIcon60x60@2x.png")).unwrap().to_rgba8();
        assert_close(pixel.get_pixel(5, 5).0, [0, 255, 0, 255]);
        assert_eq!(dims(&app_dir.join("AppIcon60x60@2x.png")), (120, 120));
        assert!(!report.document_changed);
    }

    #[test]
    fn test_ipad_only_config_keeps_phone_files() {
        let mut pad_primary = Dictionary::new();
        pad_primary.insert(
            "CFBundleIconFiles".into(),
            Value::Array(vec![Value::from("AppIcon76x76")]),
        );
        let mut pad = Dictionary::new();
        pad.insert("CFBundlePrimaryIcon".into(), Value::Dictionary(pad_primary));
        let mut root = Dictionary::new();
        root.insert("CFBundleIcons~ipad".into(), Value::Dictionary(pad));
        root.insert(
            keys::LEGACY_ICON_FILES.into(),
            Value::Array(vec![Value::from("AppIcon60x60")]),
        );

        let (temp_dir, app_dir, mut doc) = app_with_document(root);
        write_png(&app_dir.join("AppIcon40x40@2x.png"), 80, 80, [1, 1, 1, 255]);
        let source = temp_dir.path().join("icon.png");
        write_png(&source, 1024, 1024, [0, 0, 0, 255]);

        let report = IconAssetWriter::new(&app_dir)
            .standard_sizes(sizes(&[40.0, 60.0], &[76.0]))
            .replace(&mut doc, &source)
            .unwrap();

        assert!(report.removed.is_empty());
        assert!(app_dir.join("AppIcon40x40@2x.png").exists());
        assert_eq!(dims(&app_dir.join("AppIcon60x60@2x.png")), (120, 120));
        assert_eq!(dims(&app_dir.join("AppIcon76x76@2x~ipad.png")), (152, 152));
        assert!(doc.get("CFBundleIcons").is_none());
    }

    #[test]
    fn test_missing_icon_config_creates_phone_list() {
        let (temp_dir, app_dir, mut doc) = app_with_document(Dictionary::new());
        let source = temp_dir.path().join("icon.png");
        write_png(&source, 1024, 1024, [0, 0, 0, 255]);

        let report = IconAssetWriter::new(&app_dir)
            .standard_sizes(sizes(&[60.0], &[76.0]))
            .replace(&mut doc, &source)
            .unwrap();

        assert_eq!(report.written.len(), 2);
        assert_eq!(
            doc.get_string_array(DeviceClass::Phone.files_key_path()).unwrap(),
            vec!["AppIcon60x60"]
        );
        assert!(doc.get("CFBundleIcons~ipad").is_none());
    }
}
