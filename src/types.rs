//! Shared types passed between pipeline stages.
//!
//! - [`SourceFormat`] - raster formats accepted as input (PNG, GIF).
//! - [`TargetFormat`] - container formats produced as output (ICO, ICNS).
//! - [`SizeMap`] - ordered, de-duplicated mapping from local image file to its
//!   pixel size. Built by the classify stage, extended by synthesis, read by
//!   the filter.

use image::ImageFormat;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Raster formats accepted as conversion sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Png,
    Gif,
}

impl SourceFormat {
    /// Map a detected `image` crate format onto a supported source format.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }

    /// Classify a local file by its extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("png") {
            Some(Self::Png)
        } else if ext.eq_ignore_ascii_case("gif") {
            Some(Self::Gif)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }
}

/// Container formats the converter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Ico,
    Icns,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid target format {0:?}: must be either ICO or ICNS")]
pub struct InvalidTargetFormat(pub String);

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Ico => "ico",
            Self::Icns => "icns",
        }
    }
}

impl FromStr for TargetFormat {
    type Err = InvalidTargetFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ico") {
            Ok(Self::Ico)
        } else if s.eq_ignore_ascii_case("icns") {
            Ok(Self::Icns)
        } else {
            Err(InvalidTargetFormat(s.to_string()))
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ico => f.write_str("ICO"),
            Self::Icns => f.write_str("ICNS"),
        }
    }
}

/// Where a sized image came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// One of the caller's references (path or URL, as given).
    Source(String),
    /// Downscaled from the largest source during synthesis.
    Synthesized,
}

/// A local image file together with its (square) pixel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizedImage {
    pub path: PathBuf,
    pub size: u32,
    pub origin: Origin,
}

impl SizedImage {
    pub fn is_synthesized(&self) -> bool {
        self.origin == Origin::Synthesized
    }
}

/// Insertion-ordered mapping from local image file to pixel size.
///
/// Keys are unique: inserting a path that is already present is a no-op.
/// Sizes are always strictly positive.
#[derive(Debug, Clone, Default)]
pub struct SizeMap {
    entries: Vec<SizedImage>,
}

impl SizeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Returns `false` (and leaves the map untouched) when the
    /// path is already mapped or the size is zero.
    pub fn insert(&mut self, path: PathBuf, size: u32, origin: Origin) -> bool {
        if size == 0 || self.get(&path).is_some() {
            return false;
        }
        self.entries.push(SizedImage { path, size, origin });
        true
    }

    pub fn get(&self, path: &Path) -> Option<&SizedImage> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SizedImage> {
        self.entries.iter()
    }

    /// Distinct sizes present in the map.
    pub fn sizes(&self) -> BTreeSet<u32> {
        self.entries.iter().map(|e| e.size).collect()
    }

    /// The entry with the largest size. Ties go to the entry inserted first.
    pub fn largest(&self) -> Option<&SizedImage> {
        self.entries
            .iter()
            .reduce(|best, e| if e.size > best.size { e } else { best })
    }

    pub fn into_entries(self) -> Vec<SizedImage> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_format_parses_case_insensitively() {
        assert_eq!("ico".parse::<TargetFormat>(), Ok(TargetFormat::Ico));
        assert_eq!("ICO".parse::<TargetFormat>(), Ok(TargetFormat::Ico));
        assert_eq!("Icns".parse::<TargetFormat>(), Ok(TargetFormat::Icns));
    }

    #[test]
    fn target_format_rejects_unknown() {
        let err = "foo".parse::<TargetFormat>().unwrap_err();
        assert_eq!(err, InvalidTargetFormat("foo".into()));
        assert!("".parse::<TargetFormat>().is_err());
        assert!("png".parse::<TargetFormat>().is_err());
    }

    #[test]
    fn source_format_from_extension() {
        assert_eq!(
            SourceFormat::from_path(Path::new("/a/icon.GIF")),
            Some(SourceFormat::Gif)
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("icon.png")),
            Some(SourceFormat::Png)
        );
        assert_eq!(SourceFormat::from_path(Path::new("icon.jpg")), None);
        assert_eq!(SourceFormat::from_path(Path::new("icon")), None);
    }

    #[test]
    fn source_format_from_image_format() {
        assert_eq!(
            SourceFormat::from_image_format(ImageFormat::Gif),
            Some(SourceFormat::Gif)
        );
        assert_eq!(SourceFormat::from_image_format(ImageFormat::Jpeg), None);
    }

    #[test]
    fn size_map_rejects_duplicate_paths_and_zero_sizes() {
        let mut map = SizeMap::new();
        assert!(map.insert("a.png".into(), 16, Origin::Source("a.png".into())));
        assert!(!map.insert("a.png".into(), 32, Origin::Source("a.png".into())));
        assert!(!map.insert("b.png".into(), 0, Origin::Source("b.png".into())));

        assert_eq!(map.len(), 1);
        assert_eq!(map.get(Path::new("a.png")).unwrap().size, 16);
    }

    #[test]
    fn size_map_largest_prefers_first_on_tie() {
        let mut map = SizeMap::new();
        map.insert("small.png".into(), 16, Origin::Source("small.png".into()));
        map.insert("first.png".into(), 128, Origin::Source("first.png".into()));
        map.insert("second.png".into(), 128, Origin::Source("second.png".into()));

        assert_eq!(map.largest().unwrap().path, PathBuf::from("first.png"));
        assert_eq!(map.sizes().into_iter().collect::<Vec<_>>(), vec![16, 128]);
    }

    #[test]
    fn size_map_empty_has_no_largest() {
        assert!(SizeMap::new().largest().is_none());
    }
}
