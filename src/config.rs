//! Converter configuration.
//!
//! Handles loading, validating, and merging a `config.toml`. Stock defaults
//! are overridden by whatever the user file specifies; everything is
//! optional.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! # temp_dir = "/var/tmp"   # Parent of per-call work directories (default: system temp)
//!
//! [imaging]
//! backend = "builtin"        # "builtin" (image crate) or "magick" (ImageMagick)
//!
//! [packaging]
//! backend = "builtin"        # "builtin" (ico/icns crates) or "tools" (png2ico/png2icns)
//!
//! [tools]
//! convert = "/opt/local/bin/convert"
//! identify = "/opt/local/bin/identify"
//! png2ico = "/usr/local/bin/png2ico"
//! png2icns = "/usr/local/bin/png2icns"
//! # search_path = ["/usr/bin", "/usr/local/bin"]  # Default: $PATH
//!
//! [limits]
//! tool_timeout_secs = 60     # Per external command
//! fetch_timeout_secs = 30    # Per remote image
//! ```
//!
//! A tool location that is not an executable file falls back to looking up
//! its basename on the search path. Only the tools required by the selected
//! backends are looked up.
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Converter configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Parent directory for per-call work directories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    /// Which image processing backend to use.
    pub imaging: ImagingConfig,
    /// Which container packaging backend to use.
    pub packaging: PackagingConfig,
    /// Preferred locations of external tools.
    pub tools: ToolsConfig,
    /// Execution bounds.
    pub limits: LimitsConfig,
}

impl ConverterConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.tool_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "limits.tool_timeout_secs must be non-zero".into(),
            ));
        }
        if self.limits.fetch_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "limits.fetch_timeout_secs must be non-zero".into(),
            ));
        }
        for (key, value) in [
            ("convert", &self.tools.convert),
            ("identify", &self.tools.identify),
            ("png2ico", &self.tools.png2ico),
            ("png2icns", &self.tools.png2icns),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "tools.{key} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagingBackendKind {
    /// Pure Rust, in-process.
    #[default]
    Builtin,
    /// ImageMagick `convert` / `identify`.
    Magick,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackagingBackendKind {
    /// `ico` and `icns` crates, in-process.
    #[default]
    Builtin,
    /// `png2ico` / `png2icns` executables.
    Tools,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagingConfig {
    pub backend: ImagingBackendKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackagingConfig {
    pub backend: PackagingBackendKind,
}

/// Preferred tool locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub convert: String,
    pub identify: String,
    pub png2ico: String,
    pub png2icns: String,
    /// Directories searched when a preferred location is missing.
    /// When absent, the process `PATH` is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_path: Option<Vec<PathBuf>>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            convert: "/opt/local/bin/convert".into(),
            identify: "/opt/local/bin/identify".into(),
            png2ico: "/usr/local/bin/png2ico".into(),
            png2icns: "/usr/local/bin/png2icns".into(),
            search_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Seconds an external command may run before it is killed.
    pub tool_timeout_secs: u64,
    /// Seconds a remote fetch may take.
    pub fetch_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 60,
            fetch_timeout_secs: 30,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ConverterConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ConverterConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ConverterConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the converter config.
///
/// With no path, returns the validated stock defaults. With a path, the file
/// must exist; its values are merged on top of the defaults.
pub fn load_config(path: Option<&Path>) -> Result<ConverterConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# iconmaker configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.

# Parent directory for the per-conversion work directory. Intermediate files
# (downloads, GIF conversions, downscaled sizes) live there and are removed
# when the conversion ends. Defaults to the system temp directory.
# temp_dir = "/var/tmp"

# ---------------------------------------------------------------------------
# Image processing
# ---------------------------------------------------------------------------
[imaging]
# "builtin": decode, convert and resize in-process.
# "magick":  use ImageMagick's `identify` and `convert`.
backend = "builtin"

# ---------------------------------------------------------------------------
# Container packaging
# ---------------------------------------------------------------------------
[packaging]
# "builtin": write ICO/ICNS in-process.
# "tools":   use the `png2ico` and `png2icns` executables.
backend = "builtin"

# ---------------------------------------------------------------------------
# External tools
# ---------------------------------------------------------------------------
# Preferred locations. When a location is not an executable file, its
# basename is looked up on the search path instead.
[tools]
convert = "/opt/local/bin/convert"
identify = "/opt/local/bin/identify"
png2ico = "/usr/local/bin/png2ico"
png2icns = "/usr/local/bin/png2icns"
# Directories to search. Defaults to $PATH.
# search_path = ["/usr/local/bin", "/usr/bin"]

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Seconds an external command may run before it is killed.
tool_timeout_secs = 60
# Seconds a remote image download may take.
fetch_timeout_secs = 30
"##
}
