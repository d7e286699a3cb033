//! Pure size arithmetic for synthesis and per-format admissibility.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! The numeric limits are product constraints of the packaging step, not of
//! the image sources:
//!
//! | Rule | ICO | ICNS |
//! |---|---|---|
//! | Size must be in [`REQUIRED_SIZES`] | – | yes |
//! | Size must be a multiple of [`ICO_SIZE_STEP`] | yes | – |
//! | Size must be below [`PACKAGED_SIZE_LIMIT`] | yes | yes |
//! | [`ICNS_EXCLUDED_SIZE`] is skipped | – | yes |

use crate::types::{SizeMap, SizedImage, TargetFormat};
use std::collections::{BTreeSet, HashSet};

/// Canonical icon sizes every container should ideally carry, ascending.
pub const REQUIRED_SIZES: [u32; 7] = [16, 32, 64, 128, 256, 512, 1024];

/// ICO entries must have a side length that is a multiple of this.
pub const ICO_SIZE_STEP: u32 = 8;

/// Exclusive upper bound on packaged side lengths for both formats.
pub const PACKAGED_SIZE_LIMIT: u32 = 256;

/// ICNS has no slot for this size in the packaging toolchains we target.
pub const ICNS_EXCLUDED_SIZE: u32 = 64;

/// Required sizes that are absent and can be produced by downscaling.
///
/// Only sizes strictly smaller than the largest existing size qualify, so
/// synthesis never upscales. Returned in ascending order. An empty `existing`
/// set yields nothing.
///
/// ```
/// # use iconmaker::sizes::missing_sizes;
/// # use std::collections::BTreeSet;
/// let existing: BTreeSet<u32> = [16, 128].into();
/// assert_eq!(missing_sizes(&existing), vec![32, 64]);
/// ```
pub fn missing_sizes(existing: &BTreeSet<u32>) -> Vec<u32> {
    let Some(&largest) = existing.last() else {
        return Vec::new();
    };
    REQUIRED_SIZES
        .iter()
        .copied()
        .filter(|size| !existing.contains(size) && *size < largest)
        .collect()
}

/// Whether an image of `size` pixels may be packaged into `target`.
pub fn is_admissible(target: TargetFormat, size: u32) -> bool {
    match target {
        TargetFormat::Icns => {
            REQUIRED_SIZES.contains(&size)
                && size != ICNS_EXCLUDED_SIZE
                && size < PACKAGED_SIZE_LIMIT
        }
        TargetFormat::Ico => size % ICO_SIZE_STEP == 0 && size < PACKAGED_SIZE_LIMIT,
    }
}

/// Select the entries of `map` eligible for packaging into `target`.
///
/// Keeps map order. ICO directories may hold several entries of the same
/// size, so every admissible file is kept. An ICNS family addresses entries
/// by element type, one type per size, and readers only ever see the first
/// element of a type; for ICNS only the first file of each size is kept.
/// The result is always a subset of `map`.
pub fn admissible_images(target: TargetFormat, map: &SizeMap) -> Vec<&SizedImage> {
    let mut seen = HashSet::new();
    map.iter()
        .filter(|image| is_admissible(target, image.size))
        .filter(|image| target == TargetFormat::Ico || seen.insert(image.size))
        .collect()
}
