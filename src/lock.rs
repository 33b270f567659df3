//! Cross-process lock around shadow store creation
//!
//! An advisory exclusive lock on `history_dir/shadowtrail.lock`. Independent
//! processes, and independent managers inside one process, initializing the
//! same project take turns: the first creates the repository, the rest find
//! it already there. The operating system drops the lock when the holder
//! exits, so a crashed initializer never wedges the store.

use crate::error::{Result, ShadowError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Delay between attempts while another holder has the lock
const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Held lock; released when dropped
#[derive(Debug)]
pub(crate) struct StoreLock {
    path: PathBuf,
    _file: File,
}

impl StoreLock {
    /// Wait up to `wait` for the lock at `path`
    pub(crate) async fn acquire(path: &Path, wait: Duration) -> Result<Self> {
        let start = Instant::now();
        loop {
            let attempt = path.to_path_buf();
            let acquired = tokio::task::spawn_blocking(move || Self::try_acquire(&attempt))
                .await
                .map_err(|e| ShadowError::internal(format!("Lock task failed: {}", e)))??;
            if let Some(lock) = acquired {
                debug!("Acquired store lock {:?} after {:?}", path, start.elapsed());
                return Ok(lock);
            }
            if start.elapsed() >= wait {
                return Err(ShadowError::StoreBusy {
                    path: path.to_path_buf(),
                    waited: wait,
                });
            }
            trace!("Store lock {:?} is held, retrying", path);
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    /// Take the lock without waiting; `None` when someone else holds it
    pub(crate) fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                _file: file,
            })),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(error: &std::io::Error) -> bool {
    error.kind() == std::io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
