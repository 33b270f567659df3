//! Version-control engine capability
//!
//! The shadow store is driven through [`VcsEngine`], a small set of async
//! verbs: probe, init, stage-all, commit, read head, restore, clean, plus
//! read-only log and tree listing. [`GitEngine`] implements them by spawning
//! the `git` binary.
//!
//! ## Isolation
//!
//! Every call made against a [`StoreLayout`] runs with an environment that
//! points git at the shadow store and nothing else:
//!
//! - `GIT_DIR` is the store's metadata directory and `GIT_WORK_TREE` the real
//!   project, so the two pointers are configured independently
//! - `GIT_CONFIG_GLOBAL` is the store's dedicated config file,
//!   `GIT_CONFIG_NOSYSTEM` disables the system config, and `HOME` /
//!   `XDG_CONFIG_HOME` point into the store so no user-level file is consulted
//! - inherited variables that would redirect the index, object store,
//!   identity or config are removed
//!
//! Nothing is ever written with `--global`.
//!
//! ## Timeouts
//!
//! Each invocation is bounded by the engine's timeout. A child that overruns
//! it is killed when its future is dropped.

use crate::error::{Result, ShadowError};
use crate::types::{Snapshot, StoreLayout};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

/// Inherited variables that would leak user state into the shadow store
const SCRUBBED_ENV: &[&str] = &[
    "GIT_INDEX_FILE",
    "GIT_OBJECT_DIRECTORY",
    "GIT_ALTERNATE_OBJECT_DIRECTORIES",
    "GIT_COMMON_DIR",
    "GIT_CEILING_DIRECTORIES",
    "GIT_NAMESPACE",
    "GIT_CONFIG",
    "GIT_CONFIG_PARAMETERS",
    "GIT_CONFIG_COUNT",
    "GIT_CONFIG_SYSTEM",
    "GIT_AUTHOR_NAME",
    "GIT_AUTHOR_EMAIL",
    "GIT_AUTHOR_DATE",
    "GIT_COMMITTER_NAME",
    "GIT_COMMITTER_EMAIL",
    "GIT_COMMITTER_DATE",
];

/// Field separator used in `git log` output
const LOG_FIELD_SEP: char = '\u{1f}';

/// Capability the shadow store needs from a version-control engine
///
/// All methods except [`probe`](VcsEngine::probe) run against one store
/// layout. Implementations must never touch user-level configuration.
pub trait VcsEngine: Send + Sync {
    /// Whether the engine can be invoked at all. Never fails.
    fn probe(&self) -> impl Future<Output = bool> + Send;

    /// Whether the layout's metadata directory holds a repository root
    fn is_repository(&self, layout: &StoreLayout) -> impl Future<Output = Result<bool>> + Send;

    /// Create a repository in the layout's metadata directory
    fn init_repository(
        &self,
        layout: &StoreLayout,
        default_branch: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Stage every non-ignored file of the work tree, including deletions
    fn stage_all(&self, layout: &StoreLayout) -> impl Future<Output = Result<()>> + Send;

    /// Commit the staged state
    fn commit(
        &self,
        layout: &StoreLayout,
        message: &str,
        allow_empty: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Current head reference, trimmed
    fn head(&self, layout: &StoreLayout) -> impl Future<Output = Result<String>> + Send;

    /// Make the index match `reference` and write its files into the work tree
    fn restore_from(
        &self,
        layout: &StoreLayout,
        reference: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove untracked files and directories from the work tree
    ///
    /// Ignored files are left alone.
    fn clean_untracked(&self, layout: &StoreLayout) -> impl Future<Output = Result<()>> + Send;

    /// Snapshots reachable from head, newest first
    fn log(
        &self,
        layout: &StoreLayout,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<Snapshot>>> + Send;

    /// Paths recorded at `reference`, relative to the work tree
    fn tracked_files(
        &self,
        layout: &StoreLayout,
        reference: &str,
    ) -> impl Future<Output = Result<Vec<PathBuf>>> + Send;
}

/// [`VcsEngine`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitEngine {
    binary: PathBuf,
    timeout: Duration,
}

impl GitEngine {
    /// Engine invoking `binary` with a per-call `timeout`
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Executable this engine invokes
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn render(&self, args: &[&str]) -> String {
        let mut rendered = self.binary.display().to_string();
        for arg in args {
            rendered.push(' ');
            rendered.push_str(arg);
        }
        rendered
    }

    /// Command with the isolation environment of `layout` applied
    fn isolated(&self, layout: &StoreLayout, with_git_dir: bool) -> Command {
        let mut cmd = Command::new(&self.binary);
        for var in SCRUBBED_ENV {
            cmd.env_remove(var);
        }
        cmd.env("GIT_CONFIG_GLOBAL", &layout.config_file)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("HOME", &layout.history_dir)
            .env("XDG_CONFIG_HOME", &layout.history_dir)
            .env("GIT_TERMINAL_PROMPT", "0");
        if with_git_dir {
            cmd.env("GIT_DIR", &layout.git_dir)
                .env("GIT_WORK_TREE", &layout.work_tree)
                .current_dir(&layout.work_tree);
        } else {
            cmd.env_remove("GIT_DIR")
                .env_remove("GIT_WORK_TREE")
                .current_dir(&layout.history_dir);
        }
        cmd
    }

    /// Run `cmd` to completion within the timeout and return its stdout
    async fn execute(&self, mut cmd: Command, args: &[&str]) -> Result<String> {
        let rendered = self.render(args);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        debug!("Running {}", rendered);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ShadowError::EngineTimeout {
                    command: rendered,
                    timeout: self.timeout,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // `git commit` reports "nothing to commit" on stdout
            let stderr = if stderr.is_empty() {
                stdout.trim().to_string()
            } else {
                stderr
            };
            return Err(ShadowError::EngineCommand {
                command: rendered,
                code: output.status.code(),
                stderr,
            });
        }

        trace!("{} -> {:?}", rendered, stdout);
        Ok(stdout)
    }

    async fn run(&self, layout: &StoreLayout, args: &[&str]) -> Result<String> {
        self.execute(self.isolated(layout, true), args).await
    }
}

impl Default for GitEngine {
    fn default() -> Self {
        Self::new("git", Duration::from_secs(30))
    }
}

impl VcsEngine for GitEngine {
    async fn probe(&self) -> bool {
        match self.execute(Command::new(&self.binary), &["--version"]).await {
            Ok(_) => true,
            Err(e) => {
                debug!("Engine probe failed: {}", e);
                false
            }
        }
    }

    async fn is_repository(&self, layout: &StoreLayout) -> Result<bool> {
        if !layout.git_dir.is_dir() {
            return Ok(false);
        }
        match self.run(layout, &["rev-parse", "--git-dir"]).await {
            Ok(_) => Ok(true),
            Err(ShadowError::EngineCommand { stderr, .. }) => {
                debug!("{:?} is not a repository: {}", layout.git_dir, stderr);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn init_repository(&self, layout: &StoreLayout, default_branch: &str) -> Result<()> {
        let target = layout.history_dir.to_string_lossy().into_owned();
        let branch = format!("--initial-branch={}", default_branch);
        let cmd = self.isolated(layout, false);
        self.execute(cmd, &["init", "--quiet", &branch, &target]).await?;
        Ok(())
    }

    async fn stage_all(&self, layout: &StoreLayout) -> Result<()> {
        self.run(layout, &["add", "--all", "--", "."]).await?;
        Ok(())
    }

    async fn commit(&self, layout: &StoreLayout, message: &str, allow_empty: bool) -> Result<()> {
        let mut args = vec!["commit", "--quiet", "--no-verify", "--allow-empty-message"];
        if allow_empty {
            args.push("--allow-empty");
        }
        args.extend(["-m", message]);
        self.run(layout, &args).await?;
        Ok(())
    }

    async fn head(&self, layout: &StoreLayout) -> Result<String> {
        let out = self.run(layout, &["rev-parse", "HEAD"]).await?;
        Ok(out.trim().to_string())
    }

    async fn restore_from(&self, layout: &StoreLayout, reference: &str) -> Result<()> {
        // The index must match `reference` before cleaning, otherwise files
        // tracked by a later snapshot would survive the clean.
        self.run(layout, &["read-tree", reference]).await?;
        self.run(layout, &["checkout-index", "--all", "--force"]).await?;
        Ok(())
    }

    async fn clean_untracked(&self, layout: &StoreLayout) -> Result<()> {
        self.run(layout, &["clean", "-f", "-d", "--quiet"]).await?;
        Ok(())
    }

    async fn log(&self, layout: &StoreLayout, limit: Option<usize>) -> Result<Vec<Snapshot>> {
        let format = "--format=%H%x1f%ct%x1f%s";
        let count = limit.map(|n| format!("--max-count={}", n));
        let mut args = vec!["log", format];
        if let Some(count) = count.as_deref() {
            args.push(count);
        }
        let out = self.run(layout, &args).await?;
        out.lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_log_line)
            .collect()
    }

    async fn tracked_files(&self, layout: &StoreLayout, reference: &str) -> Result<Vec<PathBuf>> {
        let out = self
            .run(layout, &["ls-tree", "-r", "-z", "--name-only", reference])
            .await?;
        Ok(out
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect())
    }
}

/// Parse one `%H%x1f%ct%x1f%s` record
fn parse_log_line(line: &str) -> Result<Snapshot> {
    let mut fields = line.splitn(3, LOG_FIELD_SEP);
    let reference = fields.next().unwrap_or_default().trim();
    let seconds = fields.next().unwrap_or_default().trim();
    let message = fields.next().unwrap_or_default();

    if reference.is_empty() {
        return Err(ShadowError::internal(format!("Malformed log record: {:?}", line)));
    }
    let seconds: i64 = seconds
        .parse()
        .map_err(|_| ShadowError::internal(format!("Malformed commit time in {:?}", line)))?;
    let timestamp: DateTime<Utc> = DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| ShadowError::internal(format!("Commit time out of range: {}", seconds)))?;

    Ok(Snapshot {
        reference: reference.to_string(),
        message: message.to_string(),
        timestamp,
    })
}
