//! # Iconmaker
//!
//! Builds multi-resolution icon containers (Windows ICO, Apple ICNS) from a
//! list of PNG or GIF images. Images can be local paths or `http(s)` URLs.
//! Sizes the caller did not supply are downscaled from the largest image.
//!
//! # Architecture: Staged Pipeline
//!
//! Every conversion runs the same stages in order, each one feeding the next:
//!
//! ```text
//! 1. Resolve     references    →  local files        (download remote images)
//! 2. Normalize   local files   →  PNG files          (GIF → PNG)
//! 3. Classify    PNG files     →  SizeMap            (file → pixel size)
//! 4. Synthesize  SizeMap       →  SizeMap            (+ missing standard sizes)
//! 5. Filter      SizeMap       →  packaging list     (per-format admissibility)
//! 6. Package     list          →  .ico / .icns       (staged, verified, copied out)
//! ```
//!
//! Any failing stage aborts the call with one [`ConvertError`] variant. All
//! intermediates live in a per-call work directory that is removed when the
//! call ends.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`convert`] | The [`Converter`]: stage sequencing, error taxonomy, work directory |
//! | [`source`] | Reference resolution: local passthrough, HTTP fetch, format sniffing |
//! | [`imaging`] | Identify, GIF → PNG, resize; builtin and ImageMagick backends |
//! | [`sizes`] | Required size set, missing-size calculation, ICO/ICNS admissibility |
//! | [`package`] | ICO/ICNS writers (builtin or `png2ico`/`png2icns`) and container verification |
//! | [`tools`] | External binary lookup and bounded execution |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`types`] | Shared types: formats, `SizeMap` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Backends Behind Traits
//!
//! Pixel work ([`imaging::ImageBackend`]), container writing
//! ([`package::Packager`]) and downloads ([`source::Fetcher`]) sit behind
//! traits. The defaults run in-process on the `image`, `ico` and `icns`
//! crates, so a stock install has no system dependencies. ImageMagick and
//! the `png2ico`/`png2icns` tools can be selected in config instead; they
//! are located once when the [`Converter`] is built, never per call.
//!
//! ## Size Rules as Constants
//!
//! The size arithmetic (required sizes 16 to 1024, the ICO multiple-of-8
//! rule, the 256 cap, the ICNS 64 exclusion) lives in [`sizes`] as named
//! constants and pure functions. It is tested without touching a file.
//!
//! ## Nothing Left Behind
//!
//! The container is packaged inside the work directory and read back before
//! it is copied to its destination. A failed call never leaves a file at the
//! requested output path.

pub mod config;
pub mod convert;
pub mod imaging;
pub mod output;
pub mod package;
pub mod sizes;
pub mod source;
pub mod tools;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use convert::{Conversion, ConvertError, Converter};
pub use types::TargetFormat;
