//! External binaries: location and bounded execution.
//!
//! Tool locations are resolved once, when a backend is built, and stored in a
//! [`Tool`]. A configured location is used when it names an executable file;
//! otherwise its basename is searched for on the search path (the process
//! `PATH` unless the config supplies one).
//!
//! [`Tool::run`] captures stdout/stderr and kills the child when it exceeds
//! its timeout. A timeout is reported like any other failure.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("unable to locate {name} binary (looked for {preferred})")]
    NotFound { name: String, preferred: String },
    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} exited with {status}: {diagnostics}", program.display())]
    Failed {
        program: PathBuf,
        status: ExitStatus,
        diagnostics: String,
    },
    #[error("{} timed out after {}s", program.display(), timeout.as_secs())]
    TimedOut { program: PathBuf, timeout: Duration },
}

/// Captured output of a successful tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A located external binary with its execution bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    name: String,
    path: PathBuf,
    timeout: Duration,
}

impl Tool {
    /// Locate `preferred` (an absolute path or a bare name) and wrap it.
    pub fn resolve(
        preferred: &str,
        search_dirs: &[PathBuf],
        timeout: Duration,
    ) -> Result<Self, ToolError> {
        let name = Path::new(preferred)
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or(preferred)
            .to_string();
        let path = locate(preferred, search_dirs).ok_or_else(|| ToolError::NotFound {
            name: name.clone(),
            preferred: preferred.to_string(),
        })?;
        debug!(tool = %name, path = %path.display(), "resolved external tool");
        Ok(Self {
            name,
            path,
            timeout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the tool to completion and return its output.
    ///
    /// Non-zero exit and timeout are errors carrying the tool's diagnostics.
    pub fn run<I, S>(&self, args: I) -> Result<ToolOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!(command = ?command, "running external tool");

        let mut child = command.spawn().map_err(|source| ToolError::Spawn {
            program: self.path.clone(),
            source,
        })?;

        // Drain both pipes on their own threads so a chatty child cannot
        // block on a full pipe while we wait for it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait_with_timeout(&mut child)?;
        let output = ToolOutput {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };

        if status.success() {
            Ok(output)
        } else {
            Err(ToolError::Failed {
                program: self.path.clone(),
                status,
                diagnostics: diagnostics(&output),
            })
        }
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<ExitStatus, ToolError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolError::TimedOut {
                        program: self.path.clone(),
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolError::Spawn {
                        program: self.path.clone(),
                        source,
                    });
                }
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Prefer stderr; fall back to stdout for tools that report errors there.
fn diagnostics(output: &ToolOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        output.stdout.trim().to_string()
    } else {
        stderr.to_string()
    }
}

/// Directories to search for tools.
///
/// An explicit list wins; otherwise the process `PATH` is split.
pub fn search_dirs(configured: Option<&[PathBuf]>) -> Vec<PathBuf> {
    match configured {
        Some(dirs) => dirs.to_vec(),
        None => std::env::var_os("PATH")
            .map(|path| std::env::split_paths(&path).collect())
            .unwrap_or_default(),
    }
}

/// Find an executable.
///
/// A `preferred` value that is itself an executable file is returned as-is.
/// Otherwise its basename is looked up in each of `search_dirs` in order.
pub fn locate(preferred: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    let preferred_path = Path::new(preferred);
    if preferred_path.components().count() > 1 && is_executable(preferred_path) {
        return Some(preferred_path.to_path_buf());
    }
    let name = preferred_path.file_name()?;
    search_dirs
        .iter()
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn locate_missing_tool_returns_none() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            locate("/usr/local/bin/png2ico", &[tmp.path().to_path_buf()]),
            None
        );
        assert_eq!(locate("png2ico", &[]), None);
    }

    #[cfg(unix)]
    #[test]
    fn locate_falls_back_to_search_path_by_basename() {
        let tmp = TempDir::new().unwrap();
        let script = write_script(tmp.path(), "png2ico", "exit 0");

        let found = locate("/nonexistent/bin/png2ico", &[tmp.path().to_path_buf()]);
        assert_eq!(found, Some(script));
    }

    #[cfg(unix)]
    #[test]
    fn locate_accepts_preferred_absolute_path() {
        let tmp = TempDir::new().unwrap();
        let script = write_script(tmp.path(), "convert", "exit 0");

        let found = locate(script.to_str().unwrap(), &[]);
        assert_eq!(found, Some(script));
    }

    #[cfg(unix)]
    #[test]
    fn locate_skips_non_executable_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("png2icns"), "not a program").unwrap();

        assert_eq!(locate("png2icns", &[tmp.path().to_path_buf()]), None);
    }

    #[test]
    fn resolve_reports_tool_name() {
        let err = Tool::resolve("/usr/local/bin/no-such-tool", &[], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound { ref name, .. } if name == "no-such-tool"));
    }

    #[test]
    fn search_dirs_prefers_configured_list() {
        let dirs = vec![PathBuf::from("/opt/tools")];
        assert_eq!(search_dirs(Some(dirs.as_slice())), dirs);
    }

    #[cfg(unix)]
    #[test]
    fn run_captures_stdout() {
        let tmp = TempDir::new().unwrap();
        write_script(tmp.path(), "echoer", "echo \"$1 $2\"");
        let tool =
            Tool::resolve("echoer", &[tmp.path().to_path_buf()], Duration::from_secs(10)).unwrap();

        let output = tool.run(["16", "16"]).unwrap();
        assert_eq!(output.stdout.trim(), "16 16");
    }

    #[cfg(unix)]
    #[test]
    fn run_failure_carries_stderr() {
        let tmp = TempDir::new().unwrap();
        write_script(tmp.path(), "broken", "echo 'bad input' >&2\nexit 3");
        let tool =
            Tool::resolve("broken", &[tmp.path().to_path_buf()], Duration::from_secs(10)).unwrap();

        let err = tool.run(Vec::<&str>::new()).unwrap_err();
        match err {
            ToolError::Failed { diagnostics, .. } => assert_eq!(diagnostics, "bad input"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn run_times_out() {
        let tmp = TempDir::new().unwrap();
        write_script(tmp.path(), "sleeper", "exec sleep 5");
        let tool = Tool::resolve(
            "sleeper",
            &[tmp.path().to_path_buf()],
            Duration::from_millis(100),
        )
        .unwrap();

        let err = tool.run(Vec::<&str>::new()).unwrap_err();
        assert!(matches!(err, ToolError::TimedOut { .. }));
    }

    #[test]
    fn diagnostics_falls_back_to_stdout() {
        let output = ToolOutput {
            stdout: "usage: png2ico out.ico in.png\n".into(),
            stderr: "  \n".into(),
        };
        assert_eq!(diagnostics(&output), "usage: png2ico out.ico in.png");
    }
}
