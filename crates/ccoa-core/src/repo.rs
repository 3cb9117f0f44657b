//! Clone capability and repository structure rendering.

use std::future::Future;
use std::ops::ControlFlow;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use url::Url;

const STDERR_LIMIT: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    #[error("failed to start git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git clone failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },

    #[error("git clone timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CloneError>> + Send + 'a>>;

/// Materializes a remote repository into a local directory.
pub trait RepoFetcher: Send + Sync {
    /// Clone `url` into `dest`, which must not exist yet.
    fn fetch<'a>(&'a self, url: &'a Url, dest: &'a Path) -> FetchFuture<'a>;
}

/// Clones through the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCloner {
    program: String,
    depth: u32,
    timeout: Duration,
}

impl GitCloner {
    /// `depth` of 0 clones the full history.
    #[must_use]
    pub fn new(depth: u32, timeout: Duration) -> Self {
        Self {
            program: "git".into(),
            depth,
            timeout,
        }
    }

    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn clone_into(&self, url: &Url, dest: &Path) -> Result<(), CloneError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("clone").arg("--quiet");
        if self.depth > 0 {
            cmd.arg("--depth").arg(self.depth.to_string());
        }
        cmd.arg("--")
            .arg(url.as_str())
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::info!(url = %url, dest = %dest.display(), depth = self.depth, "cloning repository");
        let child = cmd.spawn().map_err(CloneError::Spawn)?;
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CloneError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(CloneError::Spawn)?;

        if output.status.success() {
            tracing::info!(url = %url, "repository cloned");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = truncate(stderr.trim(), STDERR_LIMIT);
            tracing::error!(url = %url, status = %output.status, "git clone failed: {stderr}");
            Err(CloneError::Failed {
                status: output.status.to_string(),
                stderr,
            })
        }
    }
}

impl RepoFetcher for GitCloner {
    fn fetch<'a>(&'a self, url: &'a Url, dest: &'a Path) -> FetchFuture<'a> {
        Box::pin(self.clone_into(url, dest))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_owned();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

/// Indented listing of a checked-out tree for the planning prompt.
///
/// Directories are suffixed with `/` and indented four spaces per level,
/// `.git` is skipped, and after `limit` files the listing ends with `...`.
#[must_use]
pub fn repo_structure(root: &Path, limit: usize) -> String {
    let mut lines = Vec::new();
    let mut count = 0usize;
    let _ = render_dir(root, 0, limit, &mut count, &mut lines);
    lines.join("\n")
}

fn render_dir(
    dir: &Path,
    level: usize,
    limit: usize,
    count: &mut usize,
    lines: &mut Vec<String>,
) -> ControlFlow<()> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    lines.push(format!("{:indent$}{name}/", "", indent = 4 * level));

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), "cannot list directory: {e}");
            return ControlFlow::Continue(());
        }
    };
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in entries.flatten() {
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        if is_dir {
            if entry.file_name() != ".git" {
                dirs.push(entry.path());
            }
        } else {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files.sort();
    dirs.sort();

    let sub_indent = 4 * (level + 1);
    for file in files {
        if *count >= limit {
            lines.push(format!("{:sub_indent$}...", ""));
            return ControlFlow::Break(());
        }
        lines.push(format!("{:sub_indent$}{file}", ""));
        *count += 1;
    }
    for sub in dirs {
        render_dir(&sub, level + 1, limit, count, lines)?;
    }
    ControlFlow::Continue(())
}
