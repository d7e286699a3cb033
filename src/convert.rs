//! Conversion orchestration.
//!
//! A [`Converter`] owns the three collaborators the pipeline needs (an image
//! backend, a packager and a fetcher) and runs every call through the same
//! sequence of stages:
//!
//! ```text
//! Idle → Resolving → Normalizing → Classifying → Synthesizing → Filtering → Packaging → Done
//!                         any stage failure ↘ Failed
//! ```
//!
//! Each call gets its own work directory. Downloads, GIF conversions,
//! synthesized sizes and the staged container all live there, and the
//! directory is removed when the call returns, whatever the outcome. Only a
//! verified container is copied out to its final location.

use crate::config::{ConfigError, ConverterConfig, ImagingBackendKind, PackagingBackendKind};
use crate::imaging::{
    ImageBackend, LocalImage, MagickBackend, OperationError, RustBackend, classify_sizes,
    normalize_sources, synthesize_missing,
};
use crate::package::{BuiltinPackager, Packager, ToolPackager};
use crate::sizes::admissible_images;
use crate::source::{self, FetchError, Fetcher, HttpFetcher, ResolveError};
use crate::tools::{self, Tool, ToolError};
use crate::types::{InvalidTargetFormat, SizedImage, TargetFormat};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("unable to locate {tool} binary (looked for {preferred})")]
    ToolNotFound { tool: String, preferred: String },
    #[error(transparent)]
    InvalidTargetFormat(#[from] InvalidTargetFormat),
    #[error("no images given")]
    EmptyInput,
    #[error("{reference} is not a supported image ({detected}); supported formats are png, gif")]
    UnsupportedFormat { reference: String, detected: String },
    #[error("failed to fetch {reference}: {diagnostics}")]
    Fetch {
        reference: String,
        diagnostics: String,
    },
    #[error("failed to convert {} to PNG: {diagnostics}", path.display())]
    ConversionTool { path: PathBuf, diagnostics: String },
    #[error("failed to inspect {}: {diagnostics}", path.display())]
    Inspection { path: PathBuf, diagnostics: String },
    #[error("failed to resize {} to {size}x{size}: {diagnostics}", path.display())]
    Resize {
        path: PathBuf,
        size: u32,
        diagnostics: String,
    },
    #[error("no image is admissible for {target} (available sizes: {sizes:?})")]
    EmptyResult { target: TargetFormat, sizes: Vec<u32> },
    #[error("failed to package {target}: {diagnostics}")]
    Packaging {
        target: TargetFormat,
        diagnostics: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ToolError> for ConvertError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound { name, preferred } => Self::ToolNotFound {
                tool: name,
                preferred,
            },
            ToolError::Spawn { source, .. } => Self::Io(source),
            other @ (ToolError::Failed { .. } | ToolError::TimedOut { .. }) => {
                Self::Io(std::io::Error::other(other))
            }
        }
    }
}

impl From<FetchError> for ConvertError {
    fn from(err: FetchError) -> Self {
        let reference = match &err {
            FetchError::Request { url, .. } | FetchError::Status { url, .. } => url.clone(),
        };
        Self::Fetch {
            reference,
            diagnostics: err.to_string(),
        }
    }
}

impl From<ResolveError> for ConvertError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Fetch(e) => e.into(),
            ResolveError::UnsupportedFormat {
                reference,
                detected,
            } => Self::UnsupportedFormat {
                reference,
                detected,
            },
            ResolveError::Io(e) => Self::Io(e),
        }
    }
}

impl From<OperationError> for ConvertError {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::Normalize { path, source } => Self::ConversionTool {
                path,
                diagnostics: source.to_string(),
            },
            OperationError::Inspect { path, source } => Self::Inspection {
                path,
                diagnostics: source.to_string(),
            },
            OperationError::Resize { path, size, source } => Self::Resize {
                path,
                size,
                diagnostics: source.to_string(),
            },
        }
    }
}

/// Pipeline position of a conversion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Resolving,
    Normalizing,
    Classifying,
    Synthesizing,
    Filtering,
    Packaging,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Normalizing => "normalizing",
            Self::Classifying => "classifying",
            Self::Synthesizing => "synthesizing",
            Self::Filtering => "filtering",
            Self::Packaging => "packaging",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the current stage of one call and logs transitions.
struct Progress {
    stage: Stage,
}

impl Progress {
    fn new() -> Self {
        Self { stage: Stage::Idle }
    }

    fn enter(&mut self, next: Stage) {
        debug!(from = %self.stage, to = %next, "stage transition");
        self.stage = next;
    }
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// The container file.
    pub output: PathBuf,
    pub target: TargetFormat,
    /// Every classified image, inputs first then synthesized sizes. Paths
    /// inside the call's work directory no longer exist once the call ends.
    pub images: Vec<SizedImage>,
    /// Sizes written into the container, in packaging order.
    pub packaged: Vec<u32>,
    /// Sizes produced by downscaling, ascending.
    pub synthesized: Vec<u32>,
}

/// Runs conversions with a fixed set of backends.
pub struct Converter {
    imaging: Box<dyn ImageBackend>,
    packager: Box<dyn Packager>,
    fetcher: Box<dyn Fetcher>,
    work_root: Option<PathBuf>,
}

impl Converter {
    /// Build a converter from configuration.
    ///
    /// Only the tools the selected backends need are looked up; a missing
    /// one fails here with [`ConvertError::ToolNotFound`].
    pub fn new(config: &ConverterConfig) -> Result<Self, ConvertError> {
        config.validate()?;
        let dirs = tools::search_dirs(config.tools.search_path.as_deref());
        let timeout = Duration::from_secs(config.limits.tool_timeout_secs);

        let imaging: Box<dyn ImageBackend> = match config.imaging.backend {
            ImagingBackendKind::Builtin => Box::new(RustBackend::new()),
            ImagingBackendKind::Magick => Box::new(MagickBackend::new(
                Tool::resolve(&config.tools.convert, &dirs, timeout)?,
                Tool::resolve(&config.tools.identify, &dirs, timeout)?,
            )),
        };
        let packager: Box<dyn Packager> = match config.packaging.backend {
            PackagingBackendKind::Builtin => Box::new(BuiltinPackager),
            PackagingBackendKind::Tools => Box::new(ToolPackager::new(
                Tool::resolve(&config.tools.png2ico, &dirs, timeout)?,
                Tool::resolve(&config.tools.png2icns, &dirs, timeout)?,
            )),
        };
        let fetcher = HttpFetcher::new(Duration::from_secs(config.limits.fetch_timeout_secs))?;

        Ok(Self {
            imaging,
            packager,
            fetcher: Box::new(fetcher),
            work_root: config.temp_dir.clone(),
        })
    }

    /// Build a converter from explicit collaborators.
    pub fn with_parts(
        imaging: Box<dyn ImageBackend>,
        packager: Box<dyn Packager>,
        fetcher: Box<dyn Fetcher>,
    ) -> Self {
        Self {
            imaging,
            packager,
            fetcher,
            work_root: None,
        }
    }

    /// Create work directories (and unnamed outputs) under `root` instead
    /// of the system temp directory.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    /// Convert `references` into a `target` container.
    ///
    /// `target` is matched case-insensitively against `ico` and `icns`.
    /// Without `output`, the container is written to a new `output_*` file
    /// in the temp directory.
    pub fn convert<S: AsRef<str>>(
        &self,
        target: &str,
        references: &[S],
        output: Option<&Path>,
    ) -> Result<Conversion, ConvertError> {
        let target: TargetFormat = target.parse()?;
        self.convert_to(target, references, output)
    }

    /// Typed variant of [`convert`](Self::convert).
    pub fn convert_to<S: AsRef<str>>(
        &self,
        target: TargetFormat,
        references: &[S],
        output: Option<&Path>,
    ) -> Result<Conversion, ConvertError> {
        if references.is_empty() {
            return Err(ConvertError::EmptyInput);
        }

        let work = self.work_dir()?;
        debug!(work_dir = %work.path().display(), "created work directory");

        let mut progress = Progress::new();
        let result = self.run(&mut progress, target, references, output, work.path());

        let work_path = work.path().to_path_buf();
        if let Err(e) = work.close() {
            warn!(work_dir = %work_path.display(), error = %e, "failed to remove work directory");
        }

        match &result {
            Ok(conversion) => {
                progress.enter(Stage::Done);
                info!(
                    format = %target,
                    output = %conversion.output.display(),
                    sizes = ?conversion.packaged,
                    "conversion complete"
                );
            }
            Err(e) => {
                let failed_in = progress.stage;
                progress.enter(Stage::Failed);
                info!(format = %target, stage = %failed_in, error = %e, "conversion failed");
            }
        }
        result
    }

    fn work_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("iconmaker-");
        match &self.work_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }

    fn run<S: AsRef<str>>(
        &self,
        progress: &mut Progress,
        target: TargetFormat,
        references: &[S],
        output: Option<&Path>,
        work_dir: &Path,
    ) -> Result<Conversion, ConvertError> {
        progress.enter(Stage::Resolving);
        let resolved = references
            .iter()
            .map(|reference| {
                let reference = reference.as_ref();
                let path = source::resolve(self.fetcher.as_ref(), reference, work_dir)?;
                Ok(LocalImage {
                    reference: reference.to_string(),
                    path,
                })
            })
            .collect::<Result<Vec<_>, ConvertError>>()?;

        progress.enter(Stage::Normalizing);
        let normalized = normalize_sources(self.imaging.as_ref(), resolved, work_dir)?;

        progress.enter(Stage::Classifying);
        let mut map = classify_sizes(self.imaging.as_ref(), &normalized)?;
        debug!(sizes = ?map.sizes(), "classified images");

        progress.enter(Stage::Synthesizing);
        let synthesized = synthesize_missing(self.imaging.as_ref(), &mut map, work_dir)?;

        progress.enter(Stage::Filtering);
        let admissible = admissible_images(target, &map);
        if admissible.is_empty() {
            return Err(ConvertError::EmptyResult {
                target,
                sizes: map.sizes().into_iter().collect(),
            });
        }
        let packaged: Vec<u32> = admissible.iter().map(|image| image.size).collect();
        let inputs: Vec<PathBuf> = admissible.iter().map(|image| image.path.clone()).collect();
        debug!(format = %target, sizes = ?packaged, "admissible images");

        progress.enter(Stage::Packaging);
        let staged = work_dir.join(format!("output.{}", target.extension()));
        let packaging_error = |e: crate::package::PackageError| ConvertError::Packaging {
            target,
            diagnostics: e.to_string(),
        };
        self.packager
            .package(target, &inputs, &staged)
            .map_err(packaging_error)?;
        let contained = self
            .packager
            .verify(target, &staged)
            .map_err(packaging_error)?;
        debug!(sizes = ?contained, "verified staged container");

        let output = self.deliver(target, &staged, output)?;
        Ok(Conversion {
            output,
            target,
            images: map.into_entries(),
            packaged,
            synthesized,
        })
    }

    /// Copy the staged container to `output`, or to a fresh `output_*` file.
    ///
    /// An explicit `output` is written through a sibling temp file that is
    /// renamed into place, so a failed copy never leaves a partial file there.
    fn deliver(
        &self,
        target: TargetFormat,
        staged: &Path,
        output: Option<&Path>,
    ) -> Result<PathBuf, ConvertError> {
        if let Some(path) = output {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let partial = tempfile::Builder::new()
                .prefix(".iconmaker-")
                .tempfile_in(dir)?;
            fs::copy(staged, partial.path())?;
            partial.persist(path).map_err(|e| e.error)?;
            return Ok(path.to_path_buf());
        }

        let suffix = format!(".{}", target.extension());
        let mut builder = tempfile::Builder::new();
        builder.prefix("output_").suffix(&suffix);
        let file = match &self.work_root {
            Some(root) => builder.tempfile_in(root)?,
            None => builder.tempfile()?,
        };
        let path = file.into_temp_path().keep().map_err(|e| e.error)?;
        if let Err(e) = fs::copy(staged, &path) {
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }
        Ok(path)
    }
}
