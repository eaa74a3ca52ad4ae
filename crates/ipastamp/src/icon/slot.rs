//! Icon slots, file naming and the standard size tables.

use std::path::{Path, PathBuf};

/// Edge length, in pixels, of the master icon required in strict mode.
pub const MASTER_ICON_SIZE: u32 = 1024;

/// Base name used for entries synthesized from the standard size table.
pub const GENERATED_BASE_NAME: &str = "AppIcon";

/// Device family an icon set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// iPhone / iPod touch icons (`CFBundleIcons`).
    Phone,
    /// iPad icons (`CFBundleIcons~ipad`).
    Pad,
}

impl DeviceClass {
    /// Both classes, phone first.
    pub const ALL: [DeviceClass; 2] = [DeviceClass::Phone, DeviceClass::Pad];

    /// Top-level `Info.plist` key holding this class's icon configuration.
    pub fn root_key(self) -> &'static str {
        match self {
            DeviceClass::Phone => "CFBundleIcons",
            DeviceClass::Pad => "CFBundleIcons~ipad",
        }
    }

    /// Key path of the icon-file list.
    pub fn files_key_path(self) -> String {
        format!("{}.CFBundlePrimaryIcon.CFBundleIconFiles", self.root_key())
    }

    /// Key path of the compiled asset-catalog icon name.
    pub fn name_key_path(self) -> String {
        format!("{}.CFBundlePrimaryIcon.CFBundleIconName", self.root_key())
    }

    /// File-name suffix placed before `.png`.
    pub fn suffix(self) -> &'static str {
        match self {
            DeviceClass::Phone => "",
            DeviceClass::Pad => "~ipad",
        }
    }

    /// Scales always generated for this class.
    pub fn scales(self) -> &'static [u32] {
        match self {
            DeviceClass::Phone => &[2, 3],
            DeviceClass::Pad => &[1, 2],
        }
    }

    /// Scales to generate for `base` in `app_dir`.
    ///
    /// Phones also get scale 1 when a legacy `{base}.png` is already
    /// present, so pre-retina icons are refreshed instead of left stale.
    pub fn scales_for(self, base: &str, app_dir: &Path) -> Vec<u32> {
        let mut scales = self.scales().to_vec();
        if self == DeviceClass::Phone && IconSlot::path_for(app_dir, base, 1, self).is_file() {
            scales.insert(0, 1);
        }
        scales
    }

    /// Default mandatory point sizes.
    pub fn standard_sizes(self) -> &'static [f64] {
        match self {
            DeviceClass::Phone => &[20.0, 29.0, 40.0, 57.0, 60.0],
            DeviceClass::Pad => &[20.0, 29.0, 40.0, 76.0, 83.5],
        }
    }
}

/// Per-class mandatory point sizes used to fill gaps in the icon list.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardSizes {
    /// Phone point sizes.
    pub phone: Vec<f64>,
    /// Pad point sizes.
    pub pad: Vec<f64>,
}

impl StandardSizes {
    /// Sizes for `class`.
    pub fn for_class(&self, class: DeviceClass) -> &[f64] {
        match class {
            DeviceClass::Phone => &self.phone,
            DeviceClass::Pad => &self.pad,
        }
    }
}

impl Default for StandardSizes {
    fn default() -> Self {
        Self {
            phone: DeviceClass::Phone.standard_sizes().to_vec(),
            pad: DeviceClass::Pad.standard_sizes().to_vec(),
        }
    }
}

/// One concrete icon file: a base name rendered at one scale for one class.
#[derive(Debug, Clone, PartialEq)]
pub struct IconSlot {
    /// Device class.
    pub class: DeviceClass,
    /// Entry name from the icon-file list.
    pub base: String,
    /// Size in points.
    pub point_size: f64,
    /// Scale factor (1, 2 or 3).
    pub scale: u32,
}

impl IconSlot {
    /// `{base}{@Nx}{~ipad}.png`
    pub fn file_name_for(base: &str, scale: u32, class: DeviceClass) -> String {
        let scale_part = if scale > 1 {
            format!("@{scale}x")
        } else {
            String::new()
        };
        format!("{base}{scale_part}{}.png", class.suffix())
    }

    /// Path of the file for `base` at `scale` inside `app_dir`.
    pub fn path_for(app_dir: &Path, base: &str, scale: u32, class: DeviceClass) -> PathBuf {
        app_dir.join(Self::file_name_for(base, scale, class))
    }

    /// File name of this slot.
    pub fn file_name(&self) -> String {
        Self::file_name_for(&self.base, self.scale, self.class)
    }

    /// Edge length in pixels.
    pub fn pixel_size(&self) -> u32 {
        (self.point_size * f64::from(self.scale)).round() as u32
    }
}

/// `"{size}x{size}"` without a trailing `.0`, e.g. `60x60` or `83.5x83.5`.
pub fn point_size_token(size: f64) -> String {
    // f64's Display already drops a zero fraction: 60.0 prints as "60".
    format!("{size}x{size}")
}

/// Entry name synthesized for a standard size, e.g. `AppIcon60x60`.
pub fn generated_entry_name(size: f64) -> String {
    format!("{GENERATED_BASE_NAME}{}", point_size_token(size))
}
