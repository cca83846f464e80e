//! Worker slot leasing shared between optimizer processes.
//!
//! The registry is a plain text file of whitespace-separated slot ids. Every
//! read-modify-write of it happens while holding an advisory lock file
//! (`<registry>.lock`, created with `create_new`), so two processes starting
//! at the same instant cannot lease the same id.

use crate::error::{SynResult, SynoptError};
use crate::util::atomic_write;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_SLOT_CAPACITY: usize = 10;

const LOCK_ATTEMPTS: usize = 400;
const LOCK_BACKOFF: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct SlotRegistry {
    path: PathBuf,
    capacity: usize,
}

impl SlotRegistry {
    pub fn new<P: Into<PathBuf>>(path: P, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids currently recorded in the registry. A missing file means none.
    ///
    /// Tokens are kept verbatim so ids written by other tools survive a
    /// rewrite.
    pub fn leased(&self) -> SynResult<BTreeSet<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.split_whitespace().map(str::to_string).collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Leases the lowest free id in `[0, capacity)`.
    pub fn acquire(&self) -> SynResult<SlotLease> {
        let _guard = FileLock::acquire(&self.path)?;

        let mut taken = self.leased()?;
        let id = (0..self.capacity)
            .find(|i| !taken.contains(&i.to_string()))
            .ok_or(SynoptError::ResourceExhausted {
                capacity: self.capacity,
            })?;

        taken.insert(id.to_string());
        self.store(&taken)?;

        info!("🔒 Leased worker slot {}", id);
        Ok(SlotLease {
            registry: self.clone(),
            id,
            released: false,
        })
    }

    fn release_id(&self, id: usize) -> SynResult<()> {
        let _guard = FileLock::acquire(&self.path)?;

        let mut taken = self.leased()?;
        if !taken.remove(&id.to_string()) {
            warn!("Slot {} was not present in {}", id, self.path.display());
        }
        self.store(&taken)?;

        info!("🔓 Released worker slot {}", id);
        Ok(())
    }

    fn store(&self, taken: &BTreeSet<String>) -> SynResult<()> {
        let mut content = String::new();
        for id in taken {
            content.push_str(id);
            content.push(' ');
        }
        atomic_write(&self.path, content)?;
        Ok(())
    }
}

/// An exclusively held slot id.
///
/// Call [`SlotLease::release`] to observe release errors; dropping an
/// unreleased lease releases it on a best-effort basis.
#[derive(Debug)]
pub struct SlotLease {
    registry: SlotRegistry,
    id: usize,
    released: bool,
}

impl SlotLease {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn release(mut self) -> SynResult<()> {
        self.released = true;
        self.registry.release_id(self.id)
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.registry.release_id(self.id) {
                warn!("⚠️  Could not release worker slot {}: {}", self.id, e);
            }
        }
    }
}

/// Exclusive `<target>.lock` held until dropped.
pub(crate) struct FileLock {
    path: PathBuf,
}

impl FileLock {
    pub(crate) fn acquire(target: &Path) -> SynResult<Self> {
        let mut name = target.as_os_str().to_owned();
        name.push(".lock");
        let path = PathBuf::from(name);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        for attempt in 0..LOCK_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if attempt == 0 {
                        debug!("Waiting for lock {}", path.display());
                    }
                    thread::sleep(LOCK_BACKOFF);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SynoptError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!(
                "lock {} is still held; remove it if no synopt process is running",
                path.display()
            ),
        )))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
