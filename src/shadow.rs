//! Shadow history manager
//!
//! [`ShadowHistory`] owns the lifecycle of one project's shadow store: an
//! isolated git repository whose metadata lives under the global root while
//! its work tree is the real project directory. The user's own repository,
//! identity and configuration are never read or written.
//!
//! ## Lifecycle
//!
//! ```text
//! Unchecked ──probe fails──▶ EngineUnavailable
//!     │
//!     └──▶ Uninitialized ──initialize──▶ Initialized ◀──┐
//!                                            └──────────┘ initialize (no-op)
//! ```
//!
//! [`initialize`](ShadowHistory::initialize) is idempotent and refreshes the
//! mirrored ignore rules on every call. Snapshots and restores assume a
//! single caller per project; different projects never share state.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use shadowtrail::ShadowHistory;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let history = ShadowHistory::builder().build("./my_project")?;
//! history.initialize().await?;
//!
//! let before = history.snapshot("before refactor").await?;
//! // ... risky operation ...
//! history.restore(&before).await?;
//! # Ok(())
//! # }
//! ```

use crate::engine::{GitEngine, VcsEngine};
use crate::error::{Result, ShadowError, ENGINE_UNAVAILABLE_MESSAGE};
use crate::lock::StoreLock;
use crate::paths::{self, PathResolver};
use crate::types::*;
use crate::utils;
use parking_lot::Mutex;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Checkpoint manager for one project
pub struct ShadowHistory<E = GitEngine> {
    identity: ProjectIdentity,
    layout: StoreLayout,
    resolver: PathResolver,
    config: ShadowConfig,
    engine: E,
    /// Last observed lifecycle state
    state: Mutex<StoreState>,
}

impl<E: std::fmt::Debug> std::fmt::Debug for ShadowHistory<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowHistory")
            .field("identity", &self.identity)
            .field("layout", &self.layout)
            .field("config", &self.config)
            .field("engine", &self.engine)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl ShadowHistory<GitEngine> {
    /// Manager for `project_root` with the default configuration
    pub fn open(project_root: impl AsRef<Path>) -> Result<Self> {
        ShadowHistoryBuilder::new().build(project_root)
    }

    /// Start configuring a manager
    pub fn builder() -> ShadowHistoryBuilder {
        ShadowHistoryBuilder::new()
    }
}

impl<E: VcsEngine> ShadowHistory<E> {
    /// Canonical project identity
    pub fn identity(&self) -> &ProjectIdentity {
        &self.identity
    }

    /// On-disk layout of the shadow store
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Active configuration
    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Engine driving the store
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// State seen by the most recent operation, without probing
    pub fn cached_state(&self) -> StoreState {
        *self.state.lock()
    }

    fn set_state(&self, state: StoreState) {
        *self.state.lock() = state;
    }

    /// Probe the engine and the store and report the lifecycle state
    ///
    /// Read-only: nothing is created or written.
    pub async fn state(&self) -> StoreState {
        let state = if !self.engine.probe().await {
            StoreState::EngineUnavailable
        } else {
            match self.engine.is_repository(&self.layout).await {
                Ok(true) => StoreState::Initialized,
                Ok(false) => StoreState::Uninitialized,
                Err(e) => {
                    warn!("Could not inspect shadow store {:?}: {}", self.layout.git_dir, e);
                    StoreState::Uninitialized
                }
            }
        };
        self.set_state(state);
        state
    }

    /// Prepare the shadow store, creating it on first use
    ///
    /// Steps, in order:
    /// 1. probe the engine; failure is [`ShadowError::EngineUnavailable`] and
    ///    nothing is created
    /// 2. create the history directory
    /// 3. write the dedicated identity/config file
    /// 4. under the store lock, create the repository with an empty bootstrap
    ///    commit, unless one already exists
    /// 5. mirror the project's ignore rules
    ///
    /// Concurrent calls for the same project, from this process or others,
    /// produce one repository with a single bootstrap commit.
    ///
    /// Failures in steps 2-5 are reported as
    /// [`ShadowError::CheckpointInitFailed`]. Calling this again on an
    /// initialized store only refreshes the config and ignore rules.
    #[instrument(skip(self), fields(project = %self.identity.short()))]
    pub async fn initialize(&self) -> Result<()> {
        if !self.engine.probe().await {
            self.set_state(StoreState::EngineUnavailable);
            return Err(ShadowError::EngineUnavailable(
                ENGINE_UNAVAILABLE_MESSAGE.to_string(),
            ));
        }

        info!("Initializing shadow store for {:?}", self.identity.root_path);
        match self.initialize_store().await {
            Ok(()) => {
                self.set_state(StoreState::Initialized);
                Ok(())
            }
            Err(e) => Err(e.into_init_failed(&self.identity.root_path)),
        }
    }

    async fn initialize_store(&self) -> Result<()> {
        let history_dir = self.layout.history_dir.clone();
        blocking(move || utils::ensure_dir(&history_dir)).await?;

        let config_file = self.layout.config_file.clone();
        let rendered = self.config.render_git_config(&self.layout);
        blocking(move || utils::atomic_write(&config_file, rendered.as_bytes())).await?;

        // Other processes may be initializing the same project; whoever holds
        // the lock decides whether the repository still has to be created.
        let lock = StoreLock::acquire(&self.layout.lock_file, self.lock_wait()).await?;
        if self.engine.is_repository(&self.layout).await? {
            debug!("Shadow store already initialized at {:?}", self.layout.git_dir);
            // An earlier run may have died between init and the bootstrap commit
            match self.engine.head(&self.layout).await {
                Ok(_) => {}
                Err(ShadowError::EngineCommand { .. }) => {
                    warn!("Shadow store has no head, recreating bootstrap commit");
                    self.bootstrap_commit().await?;
                }
                Err(e) => return Err(e),
            }
        } else {
            self.set_state(StoreState::Uninitialized);
            debug!("Creating repository while holding {:?}", lock.path());
            self.engine
                .init_repository(&self.layout, &self.config.default_branch)
                .await?;
            self.bootstrap_commit().await?;
            info!(
                "Created shadow store at {:?} on branch {}",
                self.layout.history_dir, self.config.default_branch
            );
        }
        drop(lock);

        self.sync_ignore_rules().await
    }

    /// How long to wait for another initializer; it runs at most an init,
    /// a commit and a head lookup, each bounded by the engine timeout.
    fn lock_wait(&self) -> Duration {
        self.config.engine_timeout().saturating_mul(3)
    }

    async fn bootstrap_commit(&self) -> Result<()> {
        self.engine
            .commit(&self.layout, INITIAL_COMMIT_MESSAGE, true)
            .await
    }

    /// Copy the project's ignore file into the shadow store
    ///
    /// A project without an ignore file yields an empty mirror. Any other
    /// read error is returned.
    pub async fn sync_ignore_rules(&self) -> Result<()> {
        let source = self.layout.project_ignore_file();
        let target = self.layout.ignore_file.clone();
        let bytes = blocking(move || {
            let rules = utils::read_to_string_or_empty(&source)?;
            utils::atomic_write(&target, rules.as_bytes())?;
            Ok(rules.len())
        })
        .await?;
        debug!("Synchronized {} bytes of ignore rules", bytes);
        Ok(())
    }

    /// Reference of the most recent snapshot
    ///
    /// Fails with [`ShadowError::HistoryUnavailable`] before initialization.
    pub async fn current_snapshot_ref(&self) -> Result<String> {
        self.read_history(self.engine.head(&self.layout)).await
    }

    /// Record the current state of the working tree
    ///
    /// Every non-ignored file is staged and committed under the store's own
    /// identity. Returns the new snapshot's reference. The message is a label
    /// only; an empty message is recorded as is. When nothing changed
    /// since the previous snapshot the engine's refusal is reported as
    /// [`ShadowError::CheckpointFailed`] unless empty snapshots are enabled.
    ///
    /// A failed snapshot leaves the project untouched; callers decide whether
    /// the operation it was meant to protect goes ahead.
    #[instrument(skip(self), fields(project = %self.identity.short()))]
    pub async fn snapshot(&self, message: &str) -> Result<String> {
        let start = Instant::now();
        match self.try_snapshot(message).await {
            Ok(reference) => {
                info!(
                    "Created snapshot {} in {:?}",
                    abbreviate(&reference),
                    start.elapsed()
                );
                Ok(reference)
            }
            Err(e) => {
                warn!("Snapshot failed: {}", e);
                Err(e.into_checkpoint_failed(&self.identity.root_path))
            }
        }
    }

    /// Return the working tree to the state recorded at `reference`
    ///
    /// Files recorded at `reference` are written first; afterwards every
    /// untracked file and directory is removed. Files excluded by the ignore
    /// rules are kept. On failure the working tree is left as the failing
    /// phase produced it and [`ShadowError::RestoreFailed`] is returned.
    #[instrument(skip(self), fields(project = %self.identity.short()))]
    pub async fn restore(&self, reference: &str) -> Result<()> {
        info!("Restoring snapshot {}", abbreviate(reference));
        let start = Instant::now();
        match self.try_restore(reference).await {
            Ok(()) => {
                info!("Restore completed in {:?}", start.elapsed());
                Ok(())
            }
            Err(e) => Err(e.into_restore_failed(&self.identity.root_path)),
        }
    }

    /// Snapshots reachable from the current head, newest first
    pub async fn list_snapshots(&self, limit: Option<usize>) -> Result<Vec<Snapshot>> {
        self.read_history(self.engine.log(&self.layout, limit)).await
    }

    /// Paths recorded at `reference`, or at the current head when `None`
    pub async fn tracked_files(&self, reference: Option<&str>) -> Result<Vec<PathBuf>> {
        let reference = reference.unwrap_or("HEAD");
        if let Err(e) = validate_reference(reference) {
            return Err(e.into_history_unavailable(&self.identity.root_path));
        }
        self.read_history(self.engine.tracked_files(&self.layout, reference))
            .await
    }

    /// Create the project's scratch directory if needed and return it
    pub async fn ensure_temp_dir(&self) -> Result<PathBuf> {
        let dir = self.resolver.tmp_root().join(&self.identity.fingerprint);
        let target = dir.clone();
        blocking(move || utils::ensure_dir(&target)).await?;
        Ok(dir)
    }

    async fn try_snapshot(&self, message: &str) -> Result<String> {
        self.ensure_repository().await?;
        self.engine.stage_all(&self.layout).await?;
        self.engine
            .commit(&self.layout, message, self.config.allow_empty_snapshots)
            .await?;
        self.engine.head(&self.layout).await
    }

    /// Content first, then untracked removal; the order matters for paths
    /// that exist both at `reference` and as new files in the work tree.
    async fn try_restore(&self, reference: &str) -> Result<()> {
        validate_reference(reference)?;
        self.ensure_repository().await?;
        self.engine.restore_from(&self.layout, reference).await?;
        self.engine.clean_untracked(&self.layout).await
    }

    /// Run a read against an initialized store
    async fn read_history<T>(&self, read: impl Future<Output = Result<T>>) -> Result<T> {
        let result = match self.ensure_repository().await {
            Ok(()) => read.await,
            Err(e) => Err(e),
        };
        result.map_err(|e| e.into_history_unavailable(&self.identity.root_path))
    }

    async fn ensure_repository(&self) -> Result<()> {
        if self.engine.is_repository(&self.layout).await? {
            Ok(())
        } else {
            self.set_state(StoreState::Uninitialized);
            Err(ShadowError::NotInitialized(self.layout.history_dir.clone()))
        }
    }
}

/// Run blocking filesystem work off the async scheduler
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ShadowError::internal(format!("Filesystem task failed: {}", e)))?
}

/// Reject references the engine could read as an option, and anything that
/// cannot name a snapshot (references are ASCII revision expressions)
fn validate_reference(reference: &str) -> Result<()> {
    let valid = !reference.is_empty()
        && !reference.starts_with('-')
        && reference.chars().all(|c| c.is_ascii_graphic());
    if valid {
        Ok(())
    } else {
        Err(ShadowError::InvalidReference(reference.to_string()))
    }
}

/// Builder for [`ShadowHistory`]
///
/// # Examples
///
/// ```rust,no_run
/// use shadowtrail::ShadowHistoryBuilder;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let history = ShadowHistoryBuilder::new()
///     .global_root("/var/lib/shadowtrail")
///     .engine_timeout(Duration::from_secs(10))
///     .author("ci-bot", "ci-bot@example.invalid")
///     .build("./project")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShadowHistoryBuilder {
    config: ShadowConfig,
}

impl ShadowHistoryBuilder {
    /// Builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ShadowConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `root` instead of the environment's global root
    pub fn global_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.global_root = Some(root.into());
        self
    }

    /// Git executable to invoke
    pub fn git_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.config.git_binary = binary.into();
        self
    }

    /// Upper bound for each engine invocation
    pub fn engine_timeout(mut self, timeout: Duration) -> Self {
        self.config.engine_timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    /// Identity recorded on snapshots
    pub fn author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.config.author_name = name.into();
        self.config.author_email = email.into();
        self
    }

    /// Branch created on first initialization
    pub fn default_branch(mut self, branch: impl Into<String>) -> Self {
        self.config.default_branch = branch.into();
        self
    }

    /// Record snapshots even when nothing changed
    pub fn allow_empty_snapshots(mut self, allow: bool) -> Self {
        self.config.allow_empty_snapshots = allow;
        self
    }

    /// Build a manager driving git
    pub fn build(self, project_root: impl AsRef<Path>) -> Result<ShadowHistory<GitEngine>> {
        let engine = GitEngine::new(self.config.git_binary.clone(), self.config.engine_timeout());
        self.build_with_engine(project_root, engine)
    }

    /// Build a manager driving a custom engine
    pub fn build_with_engine<E: VcsEngine>(
        self,
        project_root: impl AsRef<Path>,
        engine: E,
    ) -> Result<ShadowHistory<E>> {
        self.validate()?;

        let resolver = match &self.config.global_root {
            Some(root) => PathResolver::new(root.clone()),
            None => PathResolver::from_env(),
        };
        let identity = paths::project_identity(project_root.as_ref())?;
        if !identity.root_path.is_dir() {
            return Err(ShadowError::invalid_config(format!(
                "Project root {:?} is not a directory",
                identity.root_path
            )));
        }
        let layout = resolver.layout(&identity);
        if layout.history_dir.starts_with(&layout.work_tree) {
            return Err(ShadowError::invalid_config(format!(
                "Global root {:?} must not live inside the project {:?}",
                resolver.global_root(),
                layout.work_tree
            )));
        }

        debug!(
            "Shadow store for {:?} at {:?}",
            identity.root_path, layout.history_dir
        );
        Ok(ShadowHistory {
            identity,
            layout,
            resolver,
            config: self.config,
            engine,
            state: Mutex::new(StoreState::Unchecked),
        })
    }

    fn validate(&self) -> Result<()> {
        let config = &self.config;
        if config.engine_timeout_ms == 0 {
            return Err(ShadowError::invalid_config("engine timeout must be non-zero"));
        }
        if config.git_binary.as_os_str().is_empty() {
            return Err(ShadowError::invalid_config("git binary must not be empty"));
        }
        let branch = config.default_branch.trim();
        if branch.is_empty() || branch.starts_with('-') || branch.contains(char::is_whitespace) {
            return Err(ShadowError::invalid_config(format!(
                "invalid default branch {:?}",
                config.default_branch
            )));
        }
        if config.author_name.trim().is_empty() || config.author_email.trim().is_empty() {
            return Err(ShadowError::invalid_config("author name and email are required"));
        }
        Ok(())
    }
}
