//! One-shot subprocess execution with piped stdio and a hard timeout.
//!
//! The child never runs through a shell. Its environment is inherited, with
//! PATH replaced by the augmented search path so that interpreters the
//! executable depends on (e.g. `node` under a version manager) resolve the
//! same way the executable itself did.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::ChatError;

/// Prepend `extra_dirs` to `base`. Returns `base` unchanged when there is
/// nothing to prepend.
pub fn augmented_path(extra_dirs: &[PathBuf], base: Option<&OsStr>) -> OsString {
    let inherited = base.map(|p| std::env::split_paths(p)).into_iter().flatten();
    let dirs: Vec<PathBuf> = extra_dirs.iter().cloned().chain(inherited).collect();
    // join_paths only fails when a component contains the separator itself.
    std::env::join_paths(&dirs)
        .unwrap_or_else(|_| base.map(OsStr::to_os_string).unwrap_or_default())
}

/// Locate `program` on `search_path`. Paths containing a separator are
/// checked directly, relative ones against the current directory.
pub fn resolve_executable(program: &Path, search_path: &OsStr) -> Result<PathBuf, ChatError> {
    let cwd = std::env::current_dir()?;
    which::which_in(program, Some(search_path), cwd)
        .map_err(|_| ChatError::ExecutableNotFound(program.display().to_string()))
}

/// A fully specified subprocess call.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub input: String,
    pub search_path: OsString,
    pub timeout: Duration,
}

/// Everything the child wrote, buffered until exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    /// `None` when the child was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Resolve, spawn, feed `input` on stdin, and collect output.
///
/// On timeout the child is killed (via `kill_on_drop`) and
/// [`ChatError::Timeout`] is returned; output collected so far is discarded.
pub async fn run_with_input(invocation: &Invocation) -> Result<CapturedOutput, ChatError> {
    if invocation.timeout.is_zero() {
        return Err(ChatError::Config("timeout must be non-zero".to_owned()));
    }
    let path = resolve_executable(&invocation.program, &invocation.search_path)?;
    debug!(path = %path.display(), args = ?invocation.args, "spawning");

    let mut child = Command::new(&path)
        .args(&invocation.args)
        .env("PATH", &invocation.search_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| {
            error!(path = %path.display(), error = %source, "spawn failed");
            ChatError::Spawn {
                path: path.clone(),
                source,
            }
        })?;

    // Write on a separate task so a child that fills its stdout pipe before
    // draining stdin cannot deadlock us.
    let writer = child.stdin.take().map(|mut stdin| {
        let input = invocation.input.clone().into_bytes();
        tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        })
    });

    let started = Instant::now();
    let output = match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            error!(
                path = %path.display(),
                timeout_ms = invocation.timeout.as_millis() as u64,
                "process timed out, killed"
            );
            if let Some(writer) = writer {
                writer.abort();
            }
            return Err(ChatError::Timeout(invocation.timeout));
        }
    };

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            // The child may exit without reading all of its input; its exit
            // status is the more useful signal.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("child closed stdin early");
            }
            Ok(Err(e)) => return Err(ChatError::Io(e)),
            Err(join) => return Err(ChatError::Io(std::io::Error::other(join))),
        }
    }

    let captured = CapturedOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!(
        code = ?captured.code,
        stdout_bytes = captured.stdout.len(),
        stderr_bytes = captured.stderr.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "process exited"
    );

    Ok(captured)
}
