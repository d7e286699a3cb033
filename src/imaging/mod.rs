//! Image processing: identify, GIF → PNG normalization, downscaling.
//!
//! | Operation | Builtin (`RustBackend`) | ImageMagick (`MagickBackend`) |
//! |---|---|---|
//! | **Identify** | `image` header read | `identify -format "%w %h"` |
//! | **Convert → PNG** | `image` decode + PNG encode | `convert src png:out` |
//! | **Resize** | Lanczos3 `resize_exact` | `convert -resize WxH!` |
//!
//! The module is split into:
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`] + [`MagickBackend`]
//! - **Operations**: Pipeline stages combining size rules + backend

pub mod backend;
pub mod magick_backend;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use magick_backend::MagickBackend;
pub use operations::{
    LocalImage, OperationError, classify_sizes, normalize_sources, synthesize_missing,
};
pub use params::ResizeParams;
pub use rust_backend::RustBackend;
