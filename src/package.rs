//! Container packaging and verification.
//!
//! A [`Packager`] turns an ordered list of PNG files into one ICO or ICNS
//! container at a given path. Two implementations:
//!
//! | Backend | ICO | ICNS |
//! |---|---|---|
//! | [`BuiltinPackager`] | `ico` crate | `icns` crate |
//! | [`ToolPackager`] | `png2ico <out> <png>...` | `png2icns <out> <png>...` |
//!
//! [`verify_container`] reads a container back and reports the pixel sizes
//! it holds, after checking the magic header matches the expected format.

use crate::tools::{Tool, ToolError};
use crate::types::TargetFormat;
use image::ImageReader;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// First four bytes of an ICO file: reserved (0), type (1 = icon).
const ICO_MAGIC: [u8; 4] = [0, 0, 1, 0];

/// First four bytes of an ICNS file.
const ICNS_MAGIC: [u8; 4] = *b"icns";

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("cannot encode {}: {message}", path.display())]
    Encode { path: PathBuf, message: String },
    #[error("{} is empty", .0.display())]
    EmptyContainer(PathBuf),
    #[error("{} does not have a valid {expected} header", path.display())]
    BadHeader {
        path: PathBuf,
        expected: TargetFormat,
    },
}

/// Builds a container from PNG files.
pub trait Packager: Send + Sync {
    /// Write `inputs`, in order, into a `target` container at `output`.
    fn package(
        &self,
        target: TargetFormat,
        inputs: &[PathBuf],
        output: &Path,
    ) -> Result<(), PackageError>;

    /// Check a produced container and list its entry sizes.
    fn verify(&self, target: TargetFormat, path: &Path) -> Result<Vec<u32>, PackageError> {
        verify_container(target, path)
    }
}

/// In-process packaging on the `ico` and `icns` crates.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinPackager;

/// Decode any supported raster into straight RGBA8.
fn load_rgba(path: &Path) -> Result<image::RgbaImage, PackageError> {
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| PackageError::Encode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(img.to_rgba8())
}

fn write_ico(inputs: &[PathBuf], output: &Path) -> Result<(), PackageError> {
    let mut dir = ico::IconDir::new(ico::ResourceType::Icon);
    for path in inputs {
        let rgba = load_rgba(path)?;
        let image = ico::IconImage::from_rgba_data(rgba.width(), rgba.height(), rgba.into_raw());
        let entry = ico::IconDirEntry::encode(&image).map_err(|e| PackageError::Encode {
            path: path.clone(),
            message: e.to_string(),
        })?;
        dir.add_entry(entry);
    }
    dir.write(BufWriter::new(File::create(output)?))?;
    Ok(())
}

fn write_icns(inputs: &[PathBuf], output: &Path) -> Result<(), PackageError> {
    let mut family = icns::IconFamily::new();
    for path in inputs {
        let rgba = load_rgba(path)?;
        let mut image = icns::Image::new(icns::PixelFormat::RGBA, rgba.width(), rgba.height());
        image.data_mut().copy_from_slice(rgba.as_raw());
        family.add_icon(&image).map_err(|e| PackageError::Encode {
            path: path.clone(),
            message: e.to_string(),
        })?;
    }
    family.write(BufWriter::new(File::create(output)?))?;
    Ok(())
}

impl Packager for BuiltinPackager {
    fn package(
        &self,
        target: TargetFormat,
        inputs: &[PathBuf],
        output: &Path,
    ) -> Result<(), PackageError> {
        debug!(format = %target, ?inputs, output = %output.display(), "packaging container");
        match target {
            TargetFormat::Ico => write_ico(inputs, output),
            TargetFormat::Icns => write_icns(inputs, output),
        }
    }
}

/// Packaging through the `png2ico` / `png2icns` command-line tools.
pub struct ToolPackager {
    png2ico: Tool,
    png2icns: Tool,
}

impl ToolPackager {
    pub fn new(png2ico: Tool, png2icns: Tool) -> Self {
        Self { png2ico, png2icns }
    }

    fn tool_for(&self, target: TargetFormat) -> &Tool {
        match target {
            TargetFormat::Ico => &self.png2ico,
            TargetFormat::Icns => &self.png2icns,
        }
    }
}

/// Argument order shared by both tools: output first, then the images.
pub(crate) fn tool_args<'a>(inputs: &'a [PathBuf], output: &'a Path) -> Vec<&'a Path> {
    std::iter::once(output)
        .chain(inputs.iter().map(PathBuf::as_path))
        .collect()
}

impl Packager for ToolPackager {
    fn package(
        &self,
        target: TargetFormat,
        inputs: &[PathBuf],
        output: &Path,
    ) -> Result<(), PackageError> {
        let tool = self.tool_for(target);
        debug!(tool = tool.name(), ?inputs, output = %output.display(), "packaging container");
        tool.run(tool_args(inputs, output))?;
        Ok(())
    }
}

/// Read a container back and return the pixel widths of its entries.
///
/// Fails on an empty file, a magic header that does not match `target`, or
/// a directory the container crates cannot parse.
pub fn verify_container(target: TargetFormat, path: &Path) -> Result<Vec<u32>, PackageError> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(PackageError::EmptyContainer(path.to_path_buf()));
    }
    let expected = match target {
        TargetFormat::Ico => ICO_MAGIC,
        TargetFormat::Icns => ICNS_MAGIC,
    };
    let mut header = [0u8; 4];
    match file.read_exact(&mut header) {
        Ok(()) if header == expected => {}
        Err(e) if e.kind() != ErrorKind::UnexpectedEof => return Err(e.into()),
        _ => {
            return Err(PackageError::BadHeader {
                path: path.to_path_buf(),
                expected: target,
            })
        }
    }

    let reader = BufReader::new(File::open(path)?);
    let bad_header = |_: std::io::Error| PackageError::BadHeader {
        path: path.to_path_buf(),
        expected: target,
    };
    let sizes: Vec<u32> = match target {
        TargetFormat::Ico => ico::IconDir::read(reader)
            .map_err(bad_header)?
            .entries()
            .iter()
            .map(|entry| entry.width())
            .collect(),
        TargetFormat::Icns => icns::IconFamily::read(reader)
            .map_err(bad_header)?
            .available_icons()
            .into_iter()
            .map(|icon_type| icon_type.pixel_width())
            .collect(),
    };
    if sizes.is_empty() {
        return Err(PackageError::EmptyContainer(path.to_path_buf()));
    }
    Ok(sizes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_png;
    use tempfile::TempDir;

    fn pngs(dir: &Path, sizes: &[u32]) -> Vec<PathBuf> {
        sizes
            .iter()
            .map(|s| write_png(dir, &format!("icon{s}x{s}.png"), *s))
            .collect()
    }

    #[test]
    fn builtin_ico_roundtrip_sizes() {
        let tmp = TempDir::new().unwrap();
        let inputs = pngs(tmp.path(), &[16, 32, 48]);
        let output = tmp.path().join("out.ico");

        BuiltinPackager
            .package(TargetFormat::Ico, &inputs, &output)
            .unwrap();

        assert_eq!(
            verify_container(TargetFormat::Ico, &output).unwrap(),
            vec![16, 32, 48]
        );
    }

    #[test]
    fn builtin_icns_roundtrip_sizes() {
        let tmp = TempDir::new().unwrap();
        let inputs = pngs(tmp.path(), &[16, 32, 128]);
        let output = tmp.path().join("out.icns");

        BuiltinPackager
            .package(TargetFormat::Icns, &inputs, &output)
            .unwrap();

        let mut sizes = verify_container(TargetFormat::Icns, &output).unwrap();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![16, 32, 128]);
    }

    #[test]
    fn builtin_icns_rejects_unsupported_size() {
        let tmp = TempDir::new().unwrap();
        let inputs = pngs(tmp.path(), &[20]);
        let output = tmp.path().join("out.icns");

        let err = BuiltinPackager
            .package(TargetFormat::Icns, &inputs, &output)
            .unwrap_err();
        assert!(matches!(err, PackageError::Encode { .. }));
    }

    #[test]
    fn builtin_missing_input_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("out.ico");

        let err = BuiltinPackager
            .package(TargetFormat::Ico, &[tmp.path().join("nope.png")], &output)
            .unwrap_err();
        assert!(matches!(err, PackageError::Io(_)));
    }

    #[test]
    fn verify_rejects_empty_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.ico");
        std::fs::write(&path, b"").unwrap();

        assert!(matches!(
            verify_container(TargetFormat::Ico, &path),
            Err(PackageError::EmptyContainer(_))
        ));
    }

    #[test]
    fn verify_rejects_wrong_format() {
        let tmp = TempDir::new().unwrap();
        let inputs = pngs(tmp.path(), &[16]);
        let output = tmp.path().join("out.ico");
        BuiltinPackager
            .package(TargetFormat::Ico, &inputs, &output)
            .unwrap();

        assert!(matches!(
            verify_container(TargetFormat::Icns, &output),
            Err(PackageError::BadHeader {
                expected: TargetFormat::Icns,
                ..
            })
        ));
    }

    #[test]
    fn verify_rejects_truncated_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("short.icns");
        std::fs::write(&path, b"ic").unwrap();

        assert!(matches!(
            verify_container(TargetFormat::Icns, &path),
            Err(PackageError::BadHeader { .. })
        ));
    }

    #[test]
    fn verify_rejects_header_cut_after_magic_prefix() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cut.ico");
        std::fs::write(&path, [0u8, 0, 1]).unwrap();

        assert!(matches!(
            verify_container(TargetFormat::Ico, &path),
            Err(PackageError::BadHeader {
                expected: TargetFormat::Ico,
                ..
            })
        ));
    }

    #[test]
    fn tool_args_put_output_first() {
        let inputs = vec![PathBuf::from("/w/a.png"), PathBuf::from("/w/b.png")];
        let args = tool_args(&inputs, Path::new("/w/out.ico"));
        assert_eq!(
            args,
            vec![
                Path::new("/w/out.ico"),
                Path::new("/w/a.png"),
                Path::new("/w/b.png")
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn tool_packager_runs_selected_tool() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        // Fake tools that record which one ran by writing their name to the output.
        for name in ["png2ico", "png2icns"] {
            let script = bin.join(name);
            std::fs::write(&script, format!("#!/bin/sh\necho {name} > \"$1\"\n")).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let dirs = vec![bin];
        let timeout = Duration::from_secs(10);
        let packager = ToolPackager::new(
            Tool::resolve("png2ico", &dirs, timeout).unwrap(),
            Tool::resolve("png2icns", &dirs, timeout).unwrap(),
        );

        let output = tmp.path().join("out.icns");
        packager
            .package(TargetFormat::Icns, &[tmp.path().join("a.png")], &output)
            .unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap().trim(), "png2icns");
    }
}
