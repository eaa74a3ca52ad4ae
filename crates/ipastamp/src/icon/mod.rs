//! App icon replacement.
//!
//! An app's loose icon files are named `{base}{@Nx}{~ipad}.png`, where each
//! `base` is an entry of the icon-file list under `CFBundleIcons` (phone)
//! or `CFBundleIcons~ipad` (pad). Replacing the icon means:
//!
//! | Step | Module |
//! |------|--------|
//! | Fetch or locate the master image | [`source`] |
//! | Work out each entry's point size and the missing standard sizes | [`resolver`] |
//! | Render every slot, prune stale files, update the document | [`writer`] |

pub mod resolver;
pub mod slot;
pub mod source;
pub mod writer;

pub use resolver::{measure_existing, parse_point_size, resolve, IconTarget, Resolution, SizeSource};
pub use slot::{DeviceClass, IconSlot, StandardSizes, GENERATED_BASE_NAME, MASTER_ICON_SIZE};
pub use source::{fetch_icon, FetchOptions, IconSource, LocalIcon};
pub use writer::{IconAssetWriter, IconMode, IconReport};
