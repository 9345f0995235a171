//! Run-folder locking for single-owner safety.
//!
//! Два уровня:
//! - sentinel `<run>/.lock` создаётся с create_new: если файл уже есть,
//!   папкой владеет другая сессия (или процесс упал, не убрав её);
//! - на открытом sentinel берётся fs2 exclusive lock (try, без ожидания),
//!   чтобы сканер восстановления мог отличить живого владельца от мёртвого.
//!
//! Lock is released on Drop (sentinel file itself is removed by release()).

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::consts::LOCK_FILE_NAME;

pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlock and delete the sentinel.
    pub fn release(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        std::fs::remove_file(&path).with_context(|| format!("remove lock {}", path.display()))
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // fs2 unlock errors on drop are ignored deliberately.
        let _ = self.file.unlock();
    }
}

pub fn lock_file_path(folder: &Path) -> PathBuf {
    folder.join(LOCK_FILE_NAME)
}

/// Create the sentinel (create_new) and lock it exclusively without blocking.
///
/// Returns the raw io::Error so the caller can classify it as a startup-lock
/// failure; AlreadyExists / WouldBlock mean the folder is owned elsewhere.
pub fn create_exclusive(folder: &Path) -> io::Result<LockGuard> {
    let path = lock_file_path(folder);
    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .open(&path)?;
    if let Err(e) = file.try_lock_exclusive() {
        drop(file);
        let _ = std::fs::remove_file(&path);
        return Err(e);
    }
    Ok(LockGuard { file, path })
}

/// True for the errors of `create_exclusive` that mean "owned elsewhere":
/// the sentinel already exists, or fs2 reports lock contention.
pub fn is_contended(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::AlreadyExists | io::ErrorKind::WouldBlock
    ) || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Owner state of a run folder as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Sentinel present and locked by a live owner.
    Held,
    /// Sentinel present but nobody holds the lock (owner crashed).
    Abandoned,
    /// No sentinel at all.
    Missing,
}

/// Read the sentinel state without taking ownership.
pub fn lock_state(folder: &Path) -> Result<LockState> {
    let path = lock_file_path(folder);
    let file = match OpenOptions::new().read(true).write(true).open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LockState::Missing),
        Err(e) => return Err(e).with_context(|| format!("open lock file {}", path.display())),
    };
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = file.unlock();
            Ok(LockState::Abandoned)
        }
        Err(_) => Ok(LockState::Held),
    }
}
