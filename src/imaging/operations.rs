//! High-level image operations.
//!
//! These functions combine size rules with backend execution. Each
//! one is a pipeline stage: normalize GIF sources to PNG, classify every file
//! by size, and synthesize missing sizes from the largest source.

use super::backend::{BackendError, ImageBackend};
use super::params::ResizeParams;
use crate::sizes::missing_sizes;
use crate::types::{Origin, SizeMap, SourceFormat};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// A failed operation, with the file it was applied to.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("failed to convert {} to PNG: {source}", path.display())]
    Normalize {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("failed to inspect {}: {source}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("failed to resize {} to {size}x{size}: {source}", path.display())]
    Resize {
        path: PathBuf,
        size: u32,
        #[source]
        source: BackendError,
    },
}

/// A local file paired with the reference it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub reference: String,
    pub path: PathBuf,
}

/// Pick a path `<dir>/<stem>.<ext>` that does not exist yet.
fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{stem}.{ext}"));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{stem}-{n}.{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Convert every GIF in `images` to a PNG in `work_dir`.
///
/// The PNG keeps the GIF's base name. PNG inputs pass through untouched.
pub fn normalize_sources(
    backend: &dyn ImageBackend,
    images: Vec<LocalImage>,
    work_dir: &Path,
) -> Result<Vec<LocalImage>, OperationError> {
    images
        .into_iter()
        .map(|image| {
            if SourceFormat::from_path(&image.path) != Some(SourceFormat::Gif) {
                return Ok(image);
            }
            let stem = image
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "source".to_string());
            let png = unique_path(work_dir, &stem, SourceFormat::Png.extension());
            debug!(gif = %image.path.display(), png = %png.display(), "converting GIF to PNG");
            backend
                .convert_to_png(&image.path, &png)
                .map_err(|source| OperationError::Normalize {
                    path: image.path.clone(),
                    source,
                })?;
            Ok(LocalImage {
                reference: image.reference,
                path: png,
            })
        })
        .collect()
}

/// Identify every image and build the size map.
///
/// Images are assumed square; only the width is kept. A file listed twice is
/// mapped once.
pub fn classify_sizes(
    backend: &dyn ImageBackend,
    images: &[LocalImage],
) -> Result<SizeMap, OperationError> {
    let mut map = SizeMap::new();
    for image in images {
        let dims = backend
            .identify(&image.path)
            .map_err(|source| OperationError::Inspect {
                path: image.path.clone(),
                source,
            })?;
        if dims.width == 0 || dims.height == 0 {
            return Err(OperationError::Inspect {
                path: image.path.clone(),
                source: BackendError::ProcessingFailed("image has no pixels".into()),
            });
        }
        if dims.width != dims.height {
            debug!(
                path = %image.path.display(),
                width = dims.width,
                height = dims.height,
                "non-square image, using width"
            );
        }
        if !map.insert(
            image.path.clone(),
            dims.width,
            Origin::Source(image.reference.clone()),
        ) {
            debug!(path = %image.path.display(), "duplicate image ignored");
        }
    }
    Ok(map)
}

/// Downscale the largest image to every missing canonical size below it.
///
/// New files land in `work_dir` as `resized_<N>x<N>.png` and are added to
/// `map`. Returns the synthesized sizes, ascending. The first failed resize
/// aborts the whole stage.
pub fn synthesize_missing(
    backend: &dyn ImageBackend,
    map: &mut SizeMap,
    work_dir: &Path,
) -> Result<Vec<u32>, OperationError> {
    let Some(largest) = map.largest().cloned() else {
        return Ok(Vec::new());
    };
    let missing = missing_sizes(&map.sizes());
    debug!(?missing, source = %largest.path.display(), "missing sizes");

    for &size in &missing {
        let output = unique_path(
            work_dir,
            &format!("resized_{size}x{size}"),
            SourceFormat::Png.extension(),
        );
        backend
            .resize(&ResizeParams::square(&largest.path, &output, size))
            .map_err(|source| OperationError::Resize {
                path: largest.path.clone(),
                size,
                source,
            })?;
        map.insert(output, size, Origin::Synthesized);
    }
    Ok(missing)
}
