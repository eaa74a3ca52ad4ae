//! Resolution of icon-file entries to point sizes.
//!
//! Each entry of an icon-file list is a base name such as `AppIcon60x60`,
//! `Icon-57` or just `AppIcon`. Its point size comes from, in order:
//!
//! 1. the pixel width of a variant already on disk, divided by its scale;
//! 2. a `{W}x{H}` pattern in the name (first number wins);
//! 3. a trailing `-{N}` / `_{N}` in the name.
//!
//! Entries that match none of these are reported as unresolved. Standard
//! sizes not covered by any resolved entry are then synthesized as
//! `AppIcon{N}x{N}` entries.

use super::slot::{generated_entry_name, DeviceClass, IconSlot};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static DIMENSIONS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)x[0-9]+").expect("valid regex"));
static LEGACY_SUFFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_]([0-9]+(?:\.[0-9]+)?)$").expect("valid regex"));

/// Point sizes closer than this are the same size.
const SIZE_EPSILON: f64 = 0.01;

/// Where a target's point size came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSource {
    /// Measured from a file already in the app directory.
    Measured,
    /// Parsed from the entry name.
    Name,
    /// Taken from the standard size table for a synthesized entry.
    Standard,
}

/// One base name to render, with its resolved point size.
#[derive(Debug, Clone, PartialEq)]
pub struct IconTarget {
    /// Entry name (file name without scale, class suffix or extension).
    pub base: String,
    /// Size in points.
    pub point_size: f64,
    /// How the size was determined.
    pub source: SizeSource,
}

/// Outcome of resolving one device class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Existing entries first (in list order), then synthesized ones.
    pub targets: Vec<IconTarget>,
    /// Entries synthesized from the standard size table.
    pub added: Vec<String>,
    /// Entries whose size could not be determined.
    pub unresolved: Vec<String>,
}

impl Resolution {
    /// The existing entries followed by the synthesized ones.
    pub fn file_list(&self, existing: &[String]) -> Vec<String> {
        existing.iter().chain(&self.added).cloned().collect()
    }
}

/// Parse a point size from an entry name.
///
/// # Examples
///
/// ```
/// use ipastamp::icon::parse_point_size;
///
/// assert_eq!(parse_point_size("AppIcon60x60"), Some(60.0));
/// assert_eq!(parse_point_size("AppIcon83.5x83.5"), Some(83.5));
/// assert_eq!(parse_point_size("Icon-57"), Some(57.0));
/// assert_eq!(parse_point_size("AppIcon"), None);
/// ```
pub fn parse_point_size(name: &str) -> Option<f64> {
    let captures = DIMENSIONS_PATTERN
        .captures(name)
        .or_else(|| LEGACY_SUFFIX_PATTERN.captures(name))?;
    captures.get(1)?.as_str().parse().ok()
}

/// Point size of the first variant of `base` found on disk.
///
/// Variants are probed at scale 1, 2 and 3; only the image header is read.
pub fn measure_existing(base: &str, class: DeviceClass, app_dir: &Path) -> Option<f64> {
    [1u32, 2, 3].into_iter().find_map(|scale| {
        let path = IconSlot::path_for(app_dir, base, scale, class);
        if !path.is_file() {
            return None;
        }
        match image::image_dimensions(&path) {
            Ok((width, _)) if width > 0 => Some(f64::from(width) / f64::from(scale)),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Cannot measure {}: {e}", path.display());
                None
            }
        }
    })
}

/// Resolve `entries` of one device class against `app_dir` and `standard_sizes`.
///
/// Reads image headers from disk but never writes.
pub fn resolve(
    entries: &[String],
    class: DeviceClass,
    app_dir: &Path,
    standard_sizes: &[f64],
) -> Resolution {
    let mut resolution = Resolution::default();

    for entry in entries {
        let resolved = measure_existing(entry, class, app_dir)
            .map(|size| (size, SizeSource::Measured))
            .or_else(|| parse_point_size(entry).map(|size| (size, SizeSource::Name)));

        match resolved {
            Some((point_size, source)) => resolution.targets.push(IconTarget {
                base: entry.clone(),
                point_size,
                source,
            }),
            None => {
                tracing::warn!("Cannot determine icon size for {entry:?} ({class:?}), skipping");
                resolution.unresolved.push(entry.clone());
            }
        }
    }

    for &size in standard_sizes {
        let covered = resolution
            .targets
            .iter()
            .any(|t| (t.point_size - size).abs() < SIZE_EPSILON);
        if covered {
            continue;
        }

        let name = generated_entry_name(size);
        if entries.contains(&name) || resolution.added.contains(&name) {
            tracing::warn!("{name} is already listed with another size, not adding it again");
            continue;
        }

        resolution.targets.push(IconTarget {
            base: name.clone(),
            point_size: size,
            source: SizeSource::Standard,
        });
        resolution.added.push(name);
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn write_png(path: &Path, edge: u32) {
        RgbaImage::from_pixel(edge, edge, Rgba([0, 0, 0, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_parse_point_size_patterns() {
        assert_eq!(parse_point_size("AppIcon20x20"), Some(20.0));
        assert_eq!(parse_point_size("Icon_29"), Some(29.0));
        assert_eq!(parse_point_size("Icon-Small-40"), Some(40.0));
        assert_eq!(parse_point_size("Icon-76x76-extra"), Some(76.0));
        assert_eq!(parse_point_size("Icon"), None);
        assert_eq!(parse_point_size("Icon-57-old"), None);
    }

    #[test]
    fn test_empty_list_fills_standard_sizes() {
        let temp_dir = TempDir::new().unwrap();
        let resolution = resolve(&[], DeviceClass::Phone, temp_dir.path(), &[20.0, 29.0, 40.0, 60.0]);

        assert_eq!(
            resolution.added,
            strings(&["AppIcon20x20", "AppIcon29x29", "AppIcon40x40", "AppIcon60x60"])
        );
        assert_eq!(resolution.targets.len(), 4);
        assert!(resolution
            .targets
            .iter()
            .all(|t| t.source == SizeSource::Standard));
    }

    #[test]
    fn test_only_missing_sizes_are_filled() {
        let temp_dir = TempDir::new().unwrap();
        let entries = strings(&["AppIcon60x60", "Icon-29"]);
        let resolution = resolve(&entries, DeviceClass::Phone, temp_dir.path(), &[20.0, 29.0, 40.0, 60.0]);

        assert_eq!(resolution.added, strings(&["AppIcon20x20", "AppIcon40x40"]));
        assert_eq!(resolution.targets[0].base, "AppIcon60x60");
        assert_eq!(resolution.targets[0].source, SizeSource::Name);
        assert_eq!(
            resolution.file_list(&entries),
            strings(&["AppIcon60x60", "Icon-29", "AppIcon20x20", "AppIcon40x40"])
        );
    }

    #[test]
    fn test_measured_size_wins_over_name() {
        let temp_dir = TempDir::new().unwrap();
        write_png(&temp_dir.path().join("AppIcon60x60@2x.png"), 100);

        let resolution = resolve(
            &strings(&["AppIcon60x60"]),
            DeviceClass::Phone,
            temp_dir.path(),
            &[],
        );

        assert_eq!(resolution.targets[0].point_size, 50.0);
        assert_eq!(resolution.targets[0].source, SizeSource::Measured);
    }

    #[test]
    fn test_unnamed_entry_resolved_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        write_png(&temp_dir.path().join("AppIcon~ipad.png"), 76);

        let resolution = resolve(&strings(&["AppIcon"]), DeviceClass::Pad, temp_dir.path(), &[76.0]);

        assert_eq!(resolution.targets.len(), 1);
        assert_eq!(resolution.targets[0].point_size, 76.0);
        assert!(resolution.added.is_empty());
        assert!(resolution.unresolved.is_empty());
    }

    #[test]
    fn test_unresolvable_entry_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let resolution = resolve(&strings(&["AppIcon"]), DeviceClass::Phone, temp_dir.path(), &[60.0]);

        assert_eq!(resolution.unresolved, strings(&["AppIcon"]));
        assert_eq!(resolution.added, strings(&["AppIcon60x60"]));
    }

    #[test]
    fn test_undecodable_file_falls_back_to_name() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("Icon-57.png"), b"not a png").unwrap();

        let resolution = resolve(&strings(&["Icon-57"]), DeviceClass::Phone, temp_dir.path(), &[]);
        assert_eq!(resolution.targets[0].point_size, 57.0);
        assert_eq!(resolution.targets[0].source, SizeSource::Name);
    }
}
