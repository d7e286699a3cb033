//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three pixel operations the pipeline
//! delegates: identify, convert-to-PNG, and resize.
//!
//! Two implementations exist:
//! - [`RustBackend`](super::rust_backend::RustBackend): in-process, on the
//!   `image` crate. The default.
//! - [`MagickBackend`](super::magick_backend::MagickBackend): shells out to
//!   ImageMagick's `identify` and `convert`.

use super::params::ResizeParams;
use crate::tools::ToolError;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Send + Sync` so a converter can be shared across threads; each call owns
/// its own files, so backends hold no per-call state.
pub trait ImageBackend: Send + Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Re-encode `source` (any supported raster format) as a PNG at `output`.
    fn convert_to_png(&self, source: &Path, output: &Path) -> Result<(), BackendError>;

    /// Execute a resize operation.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}
