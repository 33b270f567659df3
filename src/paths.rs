//! Project identity and storage locations
//!
//! Every project shares one global root. Per-project state is sharded under
//! it by the project's fingerprint, a SHA-256 digest of the canonical root
//! path, so two projects never share a subtree and no cross-project locking
//! is needed:
//!
//! ```text
//! <global root>/
//! ├── history/<fingerprint>/   shadow store (see `shadow`)
//! └── tmp/<fingerprint>/       scratch space
//! ```
//!
//! Project roots are canonicalized before hashing. A relative path or a path
//! through a symlink resolves to the same fingerprint as the real directory.

use crate::error::{Result, ShadowError};
use crate::types::{abbreviate, ProjectIdentity, StoreLayout};
use crate::utils;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the global root
pub const GLOBAL_ROOT_ENV: &str = "SHADOWTRAIL_HOME";
/// Directory name of the global root under the home directory
pub const GLOBAL_ROOT_DIR_NAME: &str = ".shadowtrail";
/// Subdirectory of the global root holding shadow stores
pub const HISTORY_DIR_NAME: &str = "history";
/// Subdirectory of the global root holding scratch space
pub const TMP_DIR_NAME: &str = "tmp";

/// Resolves per-project locations under a fixed global root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    global_root: PathBuf,
}

impl PathResolver {
    /// Resolver rooted at an explicit directory
    pub fn new(global_root: impl Into<PathBuf>) -> Self {
        Self {
            global_root: global_root.into(),
        }
    }

    /// Resolver rooted at [`global_root`]
    pub fn from_env() -> Self {
        Self::new(global_root())
    }

    /// The global root this resolver uses
    pub fn global_root(&self) -> &Path {
        &self.global_root
    }

    /// Directory holding every project's shadow store
    pub fn history_root(&self) -> PathBuf {
        self.global_root.join(HISTORY_DIR_NAME)
    }

    /// Directory holding every project's scratch space
    pub fn tmp_root(&self) -> PathBuf {
        self.global_root.join(TMP_DIR_NAME)
    }

    /// Canonicalize `project_root` and fingerprint it
    pub fn identity(&self, project_root: &Path) -> Result<ProjectIdentity> {
        project_identity(project_root)
    }

    /// Shadow store directory for a project. Does not create it.
    pub fn history_dir(&self, project_root: &Path) -> Result<PathBuf> {
        let identity = self.identity(project_root)?;
        Ok(self.history_root().join(identity.fingerprint))
    }

    /// Scratch directory for a project. Does not create it.
    pub fn temp_dir(&self, project_root: &Path) -> Result<PathBuf> {
        let identity = self.identity(project_root)?;
        Ok(self.tmp_root().join(identity.fingerprint))
    }

    /// Create the project's scratch directory if needed and return it
    pub fn ensure_temp_dir(&self, project_root: &Path) -> Result<PathBuf> {
        let dir = self.temp_dir(project_root)?;
        utils::ensure_dir(&dir)?;
        Ok(dir)
    }

    /// Full shadow store layout for an already resolved identity
    pub fn layout(&self, identity: &ProjectIdentity) -> StoreLayout {
        StoreLayout::new(
            self.history_root().join(&identity.fingerprint),
            identity.root_path.clone(),
        )
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Base directory for all cross-project state
///
/// Uses `SHADOWTRAIL_HOME` if set, otherwise `~/.shadowtrail`. Without a
/// resolvable home directory it falls back to the system temp directory.
pub fn global_root() -> PathBuf {
    if let Ok(dir) = std::env::var(GLOBAL_ROOT_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(GLOBAL_ROOT_DIR_NAME)
}

/// Fingerprint a canonical path
///
/// SHA-256 over the path's bytes, as 64 lowercase hex characters. The input
/// is hashed as given; use [`canonicalize_root`] first for caller-supplied
/// paths.
pub fn fingerprint(canonical_path: &Path) -> String {
    utils::hash_data(canonical_path.as_os_str().as_encoded_bytes())
}

/// Resolve a project root to an absolute, symlink-free path
pub fn canonicalize_root(project_root: &Path) -> Result<PathBuf> {
    project_root
        .canonicalize()
        .map_err(|source| ShadowError::PathResolution {
            path: project_root.to_path_buf(),
            source,
        })
}

/// Canonicalize a project root and compute its fingerprint
pub fn project_identity(project_root: &Path) -> Result<ProjectIdentity> {
    let root_path = canonicalize_root(project_root)?;
    let fingerprint = fingerprint(&root_path);
    debug!("Resolved {:?} to {:?} ({})", project_root, root_path, abbreviate(&fingerprint));
    Ok(ProjectIdentity {
        root_path,
        fingerprint,
    })
}

/// Shadow store directory for a project under the environment's global root
pub fn history_dir(project_root: &Path) -> Result<PathBuf> {
    PathResolver::from_env().history_dir(project_root)
}

/// Scratch directory for a project under the environment's global root
pub fn temp_dir(project_root: &Path) -> Result<PathBuf> {
    PathResolver::from_env().temp_dir(project_root)
}

/// Create the project's scratch directory under the environment's global root
pub fn ensure_temp_dir(project_root: &Path) -> Result<PathBuf> {
    PathResolver::from_env().ensure_temp_dir(project_root)
}
