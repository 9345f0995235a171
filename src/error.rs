//! Typed errors of the public page-store API.
//!
//! Внутренние хелперы (journal I/O, CLI) работают на anyhow с контекстом;
//! на границе сессии/страницы ошибки сводятся к StoreError, чтобы вызывающий
//! мог отличить "сессия занята" от обычного I/O.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Recovery folder or its lock is already held (another process or session).
    #[error("recovery session already in use: {}", folder.display())]
    StartupLock {
        folder: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Run folder still holds payloads or a journal of an earlier run.
    /// Nothing in it is touched; recover or purge it first.
    #[error("run folder {} holds data of an earlier run", folder.display())]
    LeftoverRun { folder: PathBuf },

    /// Initial write of a page payload failed (disk full, permissions, ...).
    #[error("failed to persist page to {}", path.display())]
    PersistenceWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("image processing failed")]
    Image(#[from] image::ImageError),

    #[error("failed to decode page image {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("recovery journal: {0:#}")]
    Journal(anyhow::Error),

    #[error("i/o on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("rotation by {0} degrees is not a right angle")]
    InvalidAngle(i32),

    #[error("page already disposed")]
    Disposed,
}

impl StoreError {
    pub fn is_startup_lock(&self) -> bool {
        matches!(self, StoreError::StartupLock { .. })
    }

    pub fn is_leftover_run(&self) -> bool {
        matches!(self, StoreError::LeftoverRun { .. })
    }

    pub fn is_persistence_write(&self) -> bool {
        matches!(self, StoreError::PersistenceWrite { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
