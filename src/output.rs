//! CLI output formatting.
//!
//! Output is **size-centric**: each image is listed by its pixel size, with
//! where it came from shown as an indented context line. Images that were
//! not packaged (inadmissible for the target, or a duplicate size) are
//! marked so the user can see why a size is absent from the container.
//!
//! # Output Format
//!
//! ## Convert
//!
//! ```text
//! Images
//! 001 512x512
//!     Source: icons/icon512.png
//!     skipped
//! 002 16x16 (synthesized)
//! 003 32x32 (synthesized)
//!
//! Packaged ICNS: 16, 32
//! Output: /tmp/output_h3Xk.icns
//! ```
//!
//! ## Verify
//!
//! ```text
//! icon.ico: ICO, 2 images
//!     16x16
//!     32x32
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::convert::Conversion;
use crate::types::{Origin, TargetFormat};
use std::collections::HashMap;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn size_label(size: u32) -> String {
    format!("{size}x{size}")
}

fn join_sizes(sizes: &[u32]) -> String {
    sizes
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format the result of a conversion.
pub fn format_conversion(conversion: &Conversion) -> Vec<String> {
    let mut lines = vec!["Images".to_string()];

    // Packaging keeps map order, so the first N images of a size are the
    // N entries of that size in the container.
    let mut packaged: HashMap<u32, usize> = HashMap::new();
    for size in &conversion.packaged {
        *packaged.entry(*size).or_default() += 1;
    }

    for (i, image) in conversion.images.iter().enumerate() {
        let header = format!("{} {}", format_index(i + 1), size_label(image.size));
        match &image.origin {
            Origin::Source(reference) => {
                lines.push(header);
                lines.push(format!("{}Source: {}", indent(1), reference));
            }
            Origin::Synthesized => lines.push(format!("{header} (synthesized)")),
        }
        match packaged.get_mut(&image.size) {
            Some(remaining) if *remaining > 0 => *remaining -= 1,
            _ => lines.push(format!("{}skipped", indent(1))),
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Packaged {}: {}",
        conversion.target,
        join_sizes(&conversion.packaged)
    ));
    lines.push(format!("Output: {}", conversion.output.display()));
    lines
}

/// Print conversion output to stdout.
pub fn print_conversion(conversion: &Conversion) {
    for line in format_conversion(conversion) {
        println!("{}", line);
    }
}

/// Format the entry list of a verified container.
pub fn format_verify(target: TargetFormat, path: &Path, sizes: &[u32]) -> Vec<String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let noun = if sizes.len() == 1 { "image" } else { "images" };

    let mut lines = vec![format!("{name}: {target}, {} {noun}", sizes.len())];
    lines.extend(
        sizes
            .iter()
            .map(|size| format!("{}{}", indent(1), size_label(*size))),
    );
    lines
}

/// Print verify output to stdout.
pub fn print_verify(target: TargetFormat, path: &Path, sizes: &[u32]) {
    for line in format_verify(target, path, sizes) {
        println!("{}", line);
    }
}
