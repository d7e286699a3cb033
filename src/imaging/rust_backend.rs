//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only, content-sniffed) |
//! | Decode (PNG, GIF) | `image` crate decoders |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → PNG | `image` PNG encoder |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::ResizeParams;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::Path;

/// Pure Rust backend using the `image` crate.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Open an image with its format sniffed from content, not extension.
fn open(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>, BackendError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?)
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    open(path)?.decode().map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    })
}

/// Save as PNG. Any other requested extension is an error.
fn save_png(img: &DynamicImage, path: &Path) -> Result<(), BackendError> {
    match ImageFormat::from_path(path) {
        Ok(ImageFormat::Png) => img.save_with_format(path, ImageFormat::Png).map_err(|e| {
            BackendError::ProcessingFailed(format!("PNG encode failed: {}", e))
        }),
        _ => Err(BackendError::ProcessingFailed(format!(
            "Unsupported output format: {}",
            path.display()
        ))),
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = open(path)?.into_dimensions().map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn convert_to_png(&self, source: &Path, output: &Path) -> Result<(), BackendError> {
        let img = load_image(source)?;
        save_png(&img, output)
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        save_png(&resized, &params.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{write_gif, write_png};
    use tempfile::TempDir;

    #[test]
    fn identify_synthetic_png() {
        let tmp = TempDir::new().unwrap();
        let path = write_png(tmp.path(), "icon.png", 48);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions { width: 48, height: 48 });
    }

    #[test]
    fn identify_sniffs_content_not_extension() {
        let tmp = TempDir::new().unwrap();
        let png = write_png(tmp.path(), "icon.png", 32);
        let misnamed = tmp.path().join("icon.dat");
        std::fs::rename(&png, &misnamed).unwrap();

        let dims = RustBackend::new().identify(&misnamed).unwrap();
        assert_eq!(dims.width, 32);
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let result = RustBackend::new().identify(Path::new("/nonexistent/icon.png"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn identify_garbage_file_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("junk.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        assert!(RustBackend::new().identify(&path).is_err());
    }

    #[test]
    fn convert_gif_to_png() {
        let tmp = TempDir::new().unwrap();
        let gif = write_gif(tmp.path(), "icon16x16.gif", 16);
        let png = tmp.path().join("icon16x16.png");

        let backend = RustBackend::new();
        backend.convert_to_png(&gif, &png).unwrap();

        let bytes = std::fs::read(&png).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        assert_eq!(backend.identify(&png).unwrap().width, 16);
    }

    #[test]
    fn resize_synthetic_to_exact_size() {
        let tmp = TempDir::new().unwrap();
        let source = write_png(tmp.path(), "large.png", 128);
        let output = tmp.path().join("resized_32x32.png");

        let backend = RustBackend::new();
        backend
            .resize(&ResizeParams::square(&source, &output, 32))
            .unwrap();

        let dims = backend.identify(&output).unwrap();
        assert_eq!(dims, Dimensions { width: 32, height: 32 });
    }

    #[test]
    fn resize_unsupported_output_format_errors() {
        let tmp = TempDir::new().unwrap();
        let source = write_png(tmp.path(), "large.png", 64);
        let output = tmp.path().join("resized.webp");

        let result = RustBackend::new().resize(&ResizeParams::square(&source, &output, 32));
        assert!(result.is_err());
        assert!(!output.exists());
    }
}
