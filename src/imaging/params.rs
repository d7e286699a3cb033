//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between [`operations`](super::operations) (which decides which
//! files to create) and the [`backend`](super::backend) (which does the pixel
//! work), so the backend can be swapped for a mock in tests.

use std::path::PathBuf;

/// Parameters for a resize to exact dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl ResizeParams {
    /// A square resize, the only shape icon synthesis needs.
    pub fn square(source: impl Into<PathBuf>, output: impl Into<PathBuf>, size: u32) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            width: size,
            height: size,
        }
    }

    /// Geometry in ImageMagick's `WxH` notation.
    pub fn geometry(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}
