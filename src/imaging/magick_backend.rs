//! ImageMagick backend: shells out to `identify` and `convert`.
//!
//! | Operation | Command |
//! |---|---|
//! | Identify | `identify -format "%w %h" <src>[0]` |
//! | Convert → PNG | `convert <src>[0] png:<out>` |
//! | Resize | `convert <src>[0] -resize WxH! png:<out>` |
//!
//! The `[0]` frame selector keeps animated GIFs to their first frame so each
//! call yields exactly one output file.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::ResizeParams;
use crate::tools::Tool;
use std::ffi::OsString;
use std::path::Path;

pub struct MagickBackend {
    convert: Tool,
    identify: Tool,
}

impl MagickBackend {
    pub fn new(convert: Tool, identify: Tool) -> Self {
        Self { convert, identify }
    }
}

/// `<path>[0]`: first frame only.
fn first_frame(path: &Path) -> OsString {
    let mut arg = path.as_os_str().to_os_string();
    arg.push("[0]");
    arg
}

/// `png:<path>`: force PNG output regardless of extension.
fn png_output(path: &Path) -> OsString {
    let mut arg = OsString::from("png:");
    arg.push(path.as_os_str());
    arg
}

pub(crate) fn identify_args(path: &Path) -> Vec<OsString> {
    vec!["-format".into(), "%w %h".into(), first_frame(path)]
}

pub(crate) fn convert_args(source: &Path, output: &Path) -> Vec<OsString> {
    vec![first_frame(source), png_output(output)]
}

pub(crate) fn resize_args(params: &ResizeParams) -> Vec<OsString> {
    vec![
        first_frame(&params.source),
        "-resize".into(),
        // `!` forces the exact geometry instead of fitting within it.
        format!("{}!", params.geometry()).into(),
        png_output(&params.output),
    ]
}

/// Parse `identify -format "%w %h"` output.
pub(crate) fn parse_dimensions(output: &str) -> Option<Dimensions> {
    let mut parts = output.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some(Dimensions { width, height })
}

impl ImageBackend for MagickBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let output = self.identify.run(identify_args(path))?;
        parse_dimensions(&output.stdout).ok_or_else(|| {
            BackendError::ProcessingFailed(format!(
                "Unexpected identify output for {}: {:?}",
                path.display(),
                output.stdout.trim()
            ))
        })
    }

    fn convert_to_png(&self, source: &Path, output: &Path) -> Result<(), BackendError> {
        self.convert.run(convert_args(source, output))?;
        Ok(())
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        self.convert.run(resize_args(params))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolError;

    #[test]
    fn parse_dimensions_reads_width_and_height() {
        assert_eq!(
            parse_dimensions("128 128"),
            Some(Dimensions {
                width: 128,
                height: 128
            })
        );
        assert_eq!(
            parse_dimensions("  32 16\n"),
            Some(Dimensions {
                width: 32,
                height: 16
            })
        );
    }

    #[test]
    fn parse_dimensions_rejects_garbage() {
        assert_eq!(parse_dimensions(""), None);
        assert_eq!(parse_dimensions("16"), None);
        assert_eq!(parse_dimensions("wide tall"), None);
    }

    #[test]
    fn identify_selects_first_frame() {
        let args = identify_args(Path::new("/icons/anim.gif"));
        assert_eq!(args.last().unwrap(), "/icons/anim.gif[0]");
    }

    #[test]
    fn convert_forces_png_output() {
        let args = convert_args(Path::new("/in/icon.gif"), Path::new("/work/icon.png"));
        assert_eq!(
            args,
            vec![
                OsString::from("/in/icon.gif[0]"),
                OsString::from("png:/work/icon.png")
            ]
        );
    }

    #[test]
    fn resize_uses_exact_geometry() {
        let params = ResizeParams::square("/in/big.png", "/work/resized_16x16.png", 16);
        let args = resize_args(&params);
        assert_eq!(
            args,
            vec![
                OsString::from("/in/big.png[0]"),
                OsString::from("-resize"),
                OsString::from("16x16!"),
                OsString::from("png:/work/resized_16x16.png"),
            ]
        );
    }

    /// Backend over shell scripts standing in for `convert` and `identify`.
    #[cfg(unix)]
    fn scripted_backend(dir: &Path, identify_body: &str) -> MagickBackend {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let bin = dir.join("bin");
        std::fs::create_dir(&bin).unwrap();
        let scripts = [
            // Writes the `png:` target named by the last argument.
            ("convert", "for last; do :; done\necho png > \"${last#png:}\"\n"),
            ("identify", identify_body),
        ];
        for (name, body) in scripts {
            let script = bin.join(name);
            std::fs::write(&script, format!("#!/bin/sh\n{body}")).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let dirs = vec![bin];
        let timeout = Duration::from_secs(10);
        MagickBackend::new(
            Tool::resolve("convert", &dirs, timeout).unwrap(),
            Tool::resolve("identify", &dirs, timeout).unwrap(),
        )
    }

    #[cfg(unix)]
    #[test]
    fn identify_parses_tool_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        // Only answers when the first frame is selected.
        let backend = scripted_backend(
            tmp.path(),
            "for last; do :; done\ncase \"$last\" in *\"[0]\") echo \"48 48\" ;; *) exit 1 ;; esac\n",
        );

        assert_eq!(
            backend.identify(Path::new("/x/icon.png")).unwrap(),
            Dimensions {
                width: 48,
                height: 48
            }
        );

        let output = tmp.path().join("icon.png");
        backend
            .convert_to_png(Path::new("/x/anim.gif"), &output)
            .unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap().trim(), "png");
    }

    #[cfg(unix)]
    #[test]
    fn identify_failures_carry_tool_diagnostics() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = scripted_backend(
            tmp.path(),
            "echo \"identify: improper image header\" >&2\nexit 1\n",
        );

        let err = backend.identify(Path::new("/x/broken.png")).unwrap_err();
        assert!(matches!(err, BackendError::Tool(ToolError::Failed { .. })));
        assert!(err.to_string().contains("improper image header"));
    }

    #[cfg(unix)]
    #[test]
    fn garbled_identify_output_is_processing_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = scripted_backend(tmp.path(), "echo \"wide tall\"\n");

        let err = backend.identify(Path::new("/x/icon.png")).unwrap_err();
        assert!(matches!(err, BackendError::ProcessingFailed(_)));
    }
}
