//! # shadowtrail - project checkpoints in a shadow git store
//!
//! Snapshot the full state of a working directory before a risky operation
//! and put it back afterwards, without touching the project's own version
//! control history, identity or configuration.
//!
//! ## Overview
//!
//! Each project gets a *shadow store*: a git repository whose metadata lives
//! under a global root while its work tree is the real project directory.
//! Stores are keyed by a SHA-256 fingerprint of the canonical project path,
//! so any number of projects can share one global root:
//!
//! ```text
//! ~/.shadowtrail/
//! ├── history/<fingerprint>/
//! │   ├── .git/         isolated repository
//! │   ├── .gitconfig    dedicated identity, signing disabled
//! │   └── .gitignore    mirror of the project's ignore rules
//! └── tmp/<fingerprint>/
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shadowtrail::ShadowHistory;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let history = ShadowHistory::open("./my_project")?;
//!
//! // Creates the store on first use, refreshes ignore rules afterwards
//! history.initialize().await?;
//!
//! let checkpoint = history.snapshot("before refactor").await?;
//!
//! // ... edit, add and delete files ...
//!
//! // Put every tracked file back and remove files added since
//! history.restore(&checkpoint).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Operations return [`Result<T, ShadowError>`](ShadowError). Callers match
//! on the operation-level variants:
//! - `EngineUnavailable`: git cannot be run; disable checkpointing
//! - `CheckpointInitFailed`: the store could not be set up
//! - `CheckpointFailed`: a snapshot failed; the protected operation may still
//!   proceed
//! - `RestoreFailed`: a restore stopped partway; the working tree is undefined
//! - `HistoryUnavailable`: history was read before initialization
//!
//! The underlying cause is kept as the error's `source()`.
//!
//! ## Module Organization
//!
//! - [`paths`]: project identity and storage locations
//! - [`engine`]: the version-control capability and its git implementation
//! - [`shadow`]: the shadow history manager
//! - [`types`]: shared data types and configuration
//! - [`error`]: error types

pub mod engine;
pub mod error;
pub mod paths;
pub mod shadow;
pub mod types;

mod lock;
mod utils;

pub use engine::{GitEngine, VcsEngine};
pub use error::{Result, ShadowError};
pub use paths::{ensure_temp_dir, fingerprint, global_root, history_dir, temp_dir, PathResolver};
pub use shadow::{ShadowHistory, ShadowHistoryBuilder};
pub use types::*;
