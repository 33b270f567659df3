//! Error types for shadowtrail
//!
//! Low-level failures (I/O, engine invocations, timeouts) are collected in
//! [`ShadowError`] alongside the operation-level variants callers match on.
//! Manager operations never surface a low-level variant directly: each one is
//! wrapped into the operation that failed, and the original cause stays
//! reachable through [`std::error::Error::source`].

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Type alias for Results in the shadowtrail library
pub type Result<T> = std::result::Result<T, ShadowError>;

/// Message shown when checkpointing is requested but git cannot be run
pub const ENGINE_UNAVAILABLE_MESSAGE: &str =
    "Checkpointing is enabled, but Git is not installed. Please install Git or disable checkpointing to continue.";

/// Main error type for all shadowtrail operations
#[derive(Debug, Error)]
pub enum ShadowError {
    /// The version-control engine is not installed or cannot be invoked
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Setting up the shadow store failed
    #[error("Failed to initialize checkpointing for {project:?}: {source}")]
    CheckpointInitFailed {
        /// Project whose store could not be initialized
        project: PathBuf,
        /// Underlying cause
        #[source]
        source: Box<ShadowError>,
    },

    /// Creating a snapshot failed
    #[error("Failed to create checkpoint for {project:?}: {source}")]
    CheckpointFailed {
        /// Project being snapshotted
        project: PathBuf,
        /// Underlying cause
        #[source]
        source: Box<ShadowError>,
    },

    /// Restoring a snapshot failed; the working tree may be partially restored
    #[error("Failed to restore checkpoint for {project:?}, working tree state is undefined: {source}")]
    RestoreFailed {
        /// Project being restored
        project: PathBuf,
        /// Underlying cause
        #[source]
        source: Box<ShadowError>,
    },

    /// The shadow store has not been initialized or could not be read
    #[error("Checkpoint history unavailable for {project:?}: {source}")]
    HistoryUnavailable {
        /// Project whose history was requested
        project: PathBuf,
        /// Underlying cause
        #[source]
        source: Box<ShadowError>,
    },

    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A project root could not be resolved to a canonical path
    #[error("Cannot resolve project path {path:?}: {source}")]
    PathResolution {
        /// Path as supplied by the caller
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The engine ran but exited unsuccessfully
    #[error("`{command}` failed ({}): {stderr}", render_exit(.code))]
    EngineCommand {
        /// Rendered command line
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Trimmed standard error output
        stderr: String,
    },

    /// The engine did not finish within the configured timeout
    #[error("`{command}` timed out after {}", render_timeout(.timeout))]
    EngineTimeout {
        /// Rendered command line
        command: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// Another initializer kept the store lock for too long
    #[error("Shadow store lock {path:?} still held after {}", render_timeout(.waited))]
    StoreBusy {
        /// Lock file
        path: PathBuf,
        /// How long this caller waited
        waited: Duration,
    },

    /// The shadow store has no repository yet
    #[error("Shadow store not initialized at {0:?}")]
    NotInitialized(PathBuf),

    /// A snapshot reference that cannot be handed to the engine
    #[error("Invalid snapshot reference: {0:?}")]
    InvalidReference(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

fn render_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "terminated by signal".to_string(),
    }
}

fn render_timeout(timeout: &Duration) -> String {
    humantime::format_duration(*timeout).to_string()
}

impl ShadowError {
    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        ShadowError::Internal(msg.into())
    }

    /// Create an invalid configuration error with a custom message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        ShadowError::InvalidConfiguration(msg.into())
    }

    /// Wrap `self` as the cause of a failed initialization
    pub(crate) fn into_init_failed(self, project: &std::path::Path) -> Self {
        ShadowError::CheckpointInitFailed {
            project: project.to_path_buf(),
            source: Box::new(self),
        }
    }

    /// Wrap `self` as the cause of a failed snapshot
    pub(crate) fn into_checkpoint_failed(self, project: &std::path::Path) -> Self {
        ShadowError::CheckpointFailed {
            project: project.to_path_buf(),
            source: Box::new(self),
        }
    }

    /// Wrap `self` as the cause of a failed restore
    pub(crate) fn into_restore_failed(self, project: &std::path::Path) -> Self {
        ShadowError::RestoreFailed {
            project: project.to_path_buf(),
            source: Box::new(self),
        }
    }

    /// Wrap `self` as the cause of an unreadable history
    pub(crate) fn into_history_unavailable(self, project: &std::path::Path) -> Self {
        ShadowError::HistoryUnavailable {
            project: project.to_path_buf(),
            source: Box::new(self),
        }
    }

    /// Check if this error must stop checkpointing from being enabled
    ///
    /// Snapshot and restore failures are reported to the caller but leave the
    /// feature usable; a missing engine or a store that cannot be set up does not.
    pub fn is_fatal_to_checkpointing(&self) -> bool {
        matches!(
            self,
            ShadowError::EngineUnavailable(_) | ShadowError::CheckpointInitFailed { .. }
        )
    }

    /// Check if this error came from an engine invocation timing out
    pub fn is_timeout(&self) -> bool {
        match self {
            ShadowError::EngineTimeout { .. } | ShadowError::StoreBusy { .. } => true,
            ShadowError::CheckpointInitFailed { source, .. }
            | ShadowError::CheckpointFailed { source, .. }
            | ShadowError::RestoreFailed { source, .. }
            | ShadowError::HistoryUnavailable { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            ShadowError::EngineUnavailable(msg) => msg.clone(),
            ShadowError::HistoryUnavailable { project, source }
                if matches!(**source, ShadowError::NotInitialized(_)) =>
            {
                format!(
                    "No checkpoint history exists for {:?} yet. Run 'shadowtrail init' first.",
                    project
                )
            }
            ShadowError::RestoreFailed { .. } => {
                format!(
                    "{}. Inspect the working tree before continuing; partial restores are not rolled back.",
                    self
                )
            }
            _ if self.is_timeout() => {
                format!("{}. Increase the engine timeout or check for a hung git process.", self)
            }
            _ => self.to_string(),
        }
    }
}
