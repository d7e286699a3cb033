//! Shared test utilities: fixture image writers.
//!
//! Every writer produces a square image with a simple gradient so encoders
//! have real pixel data to work with.

use image::{ImageFormat, Rgba, RgbaImage};
use std::path::{Path, PathBuf};

fn gradient(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        Rgba([(x * 255 / size) as u8, (y * 255 / size) as u8, 128, 255])
    })
}

/// Write a `size`×`size` PNG to `dir/name` and return its path.
pub fn write_png(dir: &Path, name: &str, size: u32) -> PathBuf {
    let path = dir.join(name);
    gradient(size)
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();
    path
}

/// Write a `size`×`size` GIF to `dir/name` and return its path.
pub fn write_gif(dir: &Path, name: &str, size: u32) -> PathBuf {
    let path = dir.join(name);
    gradient(size)
        .save_with_format(&path, ImageFormat::Gif)
        .unwrap();
    path
}

/// Encode a `size`×`size` PNG in memory.
pub fn png_bytes(size: u32) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    gradient(size).write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Encode a `size`×`size` GIF in memory.
pub fn gif_bytes(size: u32) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    gradient(size).write_to(&mut buf, ImageFormat::Gif).unwrap();
    buf.into_inner()
}
