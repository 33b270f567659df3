//! Core data types used throughout shadowtrail
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **Identity**: [`ProjectIdentity`], the canonical root and its fingerprint
//! - **Layout**: [`StoreLayout`], where one project's shadow store lives on disk
//! - **History**: [`Snapshot`], one recorded state of the working tree
//! - **Lifecycle**: [`StoreState`], the state machine of a shadow store
//! - **Configuration**: [`ShadowConfig`], engine and identity settings
//!
//! ## Examples
//!
//! ```rust
//! use shadowtrail::types::ShadowConfig;
//!
//! let config = ShadowConfig {
//!     default_branch: "trunk".to_string(),
//!     ..Default::default()
//! };
//! assert_eq!(config.engine_timeout().as_secs(), 30);
//! ```

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the git metadata directory inside a history directory
pub const GIT_DIR_NAME: &str = ".git";
/// Name of the dedicated identity/config file inside a history directory
pub const CONFIG_FILE_NAME: &str = ".gitconfig";
/// Name of the mirrored ignore file inside a history directory
pub const IGNORE_FILE_NAME: &str = ".gitignore";
/// Name of the lock file serializing repository creation
pub const LOCK_FILE_NAME: &str = "shadowtrail.lock";
/// Message of the bootstrap commit created on first initialization
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial commit";

/// First eight characters of a reference or fingerprint, for display
///
/// Cuts on a character boundary, so caller-supplied references that are not
/// plain hex are safe to pass.
pub fn abbreviate(reference: &str) -> &str {
    match reference.char_indices().nth(8) {
        Some((end, _)) => &reference[..end],
        None => reference,
    }
}

/// Canonical identity of a project
///
/// Derived on demand from a project root and never persisted. Two values
/// built from the same resolved path always carry the same fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectIdentity {
    /// Absolute, symlink-free project root
    pub root_path: PathBuf,
    /// SHA-256 hex digest of `root_path`
    pub fingerprint: String,
}

impl ProjectIdentity {
    /// First eight characters of the fingerprint, for log lines
    pub fn short(&self) -> &str {
        abbreviate(&self.fingerprint)
    }
}

/// On-disk layout of one project's shadow store
///
/// The git metadata lives under `history_dir`, which sits in the global
/// root and never inside `work_tree`. The engine is pointed at both
/// independently, so staging the work tree never recurses into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLayout {
    /// `<global root>/history/<fingerprint>`
    pub history_dir: PathBuf,
    /// Engine metadata directory (`history_dir/.git`)
    pub git_dir: PathBuf,
    /// Dedicated identity/config file (`history_dir/.gitconfig`)
    pub config_file: PathBuf,
    /// Mirror of the project's ignore rules (`history_dir/.gitignore`)
    pub ignore_file: PathBuf,
    /// Lock held while the repository is created (`history_dir/shadowtrail.lock`)
    pub lock_file: PathBuf,
    /// The user's real project directory
    pub work_tree: PathBuf,
}

impl StoreLayout {
    /// Lay out a shadow store rooted at `history_dir` for `work_tree`
    pub fn new(history_dir: PathBuf, work_tree: PathBuf) -> Self {
        Self {
            git_dir: history_dir.join(GIT_DIR_NAME),
            config_file: history_dir.join(CONFIG_FILE_NAME),
            ignore_file: history_dir.join(IGNORE_FILE_NAME),
            lock_file: history_dir.join(LOCK_FILE_NAME),
            history_dir,
            work_tree,
        }
    }

    /// The project's own ignore file
    pub fn project_ignore_file(&self) -> PathBuf {
        self.work_tree.join(IGNORE_FILE_NAME)
    }
}

/// A recorded state of the working tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Commit id assigned by the engine
    pub reference: String,
    /// Message given when the snapshot was taken
    pub message: String,
    /// Commit time as recorded by the engine
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// Abbreviated reference for display
    pub fn short_ref(&self) -> &str {
        abbreviate(&self.reference)
    }
}

/// Lifecycle of a shadow store
///
/// `Unchecked` moves to `EngineUnavailable` (terminal) when the engine
/// cannot be invoked, otherwise to `Uninitialized` and then `Initialized`.
/// An initialized store stays initialized across process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    /// Nothing probed yet
    Unchecked,
    /// The engine could not be invoked
    EngineUnavailable,
    /// The engine works but the store has no repository
    Uninitialized,
    /// The store has a repository with a resolvable head
    Initialized,
}

impl StoreState {
    /// Whether snapshots and restores can run against the store
    pub fn is_ready(self) -> bool {
        self == StoreState::Initialized
    }
}

impl std::fmt::Display for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StoreState::Unchecked => "unchecked",
            StoreState::EngineUnavailable => "engine unavailable",
            StoreState::Uninitialized => "uninitialized",
            StoreState::Initialized => "initialized",
        };
        f.write_str(label)
    }
}

/// Configuration for a shadow history manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Base directory for all cross-project state (`None` = from environment)
    pub global_root: Option<PathBuf>,
    /// Git executable to invoke
    pub git_binary: PathBuf,
    /// Upper bound for a single engine invocation, in milliseconds
    pub engine_timeout_ms: u64,
    /// Author and committer name of snapshots
    pub author_name: String,
    /// Author and committer email of snapshots
    pub author_email: String,
    /// Branch created by the bootstrap commit
    pub default_branch: String,
    /// Record a snapshot even when nothing changed since the previous one
    pub allow_empty_snapshots: bool,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            global_root: None,
            git_binary: PathBuf::from("git"),
            engine_timeout_ms: 30_000,
            author_name: "shadowtrail".to_string(),
            author_email: "shadowtrail@localhost".to_string(),
            default_branch: "main".to_string(),
            allow_empty_snapshots: false,
        }
    }
}

impl ShadowConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Engine timeout as a [`Duration`]
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_timeout_ms)
    }

    /// Render the dedicated git config written into the shadow store
    ///
    /// Signing is disabled and the excludes file points at the mirrored
    /// ignore rules, so nothing from the user's own configuration applies.
    pub fn render_git_config(&self, layout: &StoreLayout) -> String {
        format!(
            "[user]\n\tname = {}\n\temail = {}\n\
             [commit]\n\tgpgsign = false\n\
             [tag]\n\tgpgsign = false\n\
             [core]\n\texcludesFile = {}\n\tautocrlf = false\n\
             [init]\n\tdefaultBranch = {}\n",
            quote_config_value(&self.author_name),
            quote_config_value(&self.author_email),
            quote_config_value(&layout.ignore_file.to_string_lossy()),
            quote_config_value(&self.default_branch),
        )
    }
}

/// Quote a value for a git config file
fn quote_config_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}
