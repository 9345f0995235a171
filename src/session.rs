//! session: recovery-сессия процесса и контекст, который её лениво создаёт.
//!
//! RecoveryContext создаётся один раз на процесс и передаётся в каждое
//! создание страницы. Первая страница поднимает RecoverySession:
//!   <recovery_root>/<run>/  +  .lock (create_new + fs2)  +  index.json (пустой)
//! Дальше acquire() возвращает ту же живую сессию.
//!
//! Сессия освобождается, когда журнал становится пустым (ушла последняя
//! страница): снимается lock, каталог удаляется целиком. После этого
//! следующий acquire() создаёт новую сессию.
//!
//! Все мутации журнала и решение об освобождении идут под одним Mutex.

use log::{debug, info, warn};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::StoreConfig;
use crate::consts::{LOCK_FILE_NAME, RUN_NAME_BYTES, SEQ_START};
use crate::encoder::EncoderConfig;
use crate::error::{StoreError, StoreResult};
use crate::journal::{IndexEntry, RecoveryIndex};
use crate::lock::{self, LockGuard};
use crate::metrics;
use crate::orientation::Orientation;
use crate::util::{fsync_dir, random_hex};

struct SessionState {
    index: RecoveryIndex,
    lock: Option<LockGuard>,
    released: bool,
}

/// One recovery folder with its lock and journal, shared by every page of a run.
pub struct RecoverySession {
    folder: PathBuf,
    fsync: bool,
    state: Mutex<SessionState>,
}

impl RecoverySession {
    fn open(cfg: &StoreConfig) -> StoreResult<Self> {
        let name = cfg
            .run_name
            .clone()
            .unwrap_or_else(|| random_hex(RUN_NAME_BYTES));
        let folder = cfg.recovery_root.join(name);

        let created = !folder.exists();
        fs::create_dir_all(&folder).map_err(|source| StoreError::Io {
            path: folder.clone(),
            source,
        })?;

        let guard = match lock::create_exclusive(&folder) {
            Ok(g) => g,
            Err(source) => {
                if created {
                    // только что созданный пустой каталог за собой убираем
                    let _ = fs::remove_dir(&folder);
                }
                return Err(if lock::is_contended(&source) {
                    StoreError::StartupLock { folder, source }
                } else {
                    StoreError::Io {
                        path: lock::lock_file_path(&folder),
                        source,
                    }
                });
            }
        };

        // Под lock'ом: в каталоге не должно быть ничего, кроме нашего sentinel.
        // Чужой журнал или payload-файлы принадлежат прерванному run'у.
        match has_foreign_entries(&folder) {
            Ok(false) => {}
            Ok(true) => {
                let _ = guard.release();
                warn!("run folder {} is not empty, refusing to reuse it", folder.display());
                return Err(StoreError::LeftoverRun { folder });
            }
            Err(source) => {
                let _ = guard.release();
                return Err(StoreError::Io {
                    path: folder,
                    source,
                });
            }
        }

        let index = match RecoveryIndex::create(&folder, cfg.journal_atomic, cfg.fsync) {
            Ok(idx) => idx,
            Err(e) => {
                let _ = guard.release();
                return Err(StoreError::Journal(e));
            }
        };

        info!("recovery session started at {}", folder.display());
        metrics::record_session_acquired();

        Ok(Self {
            folder,
            fsync: cfg.fsync,
            state: Mutex::new(SessionState {
                index,
                lock: Some(guard),
                released: false,
            }),
        })
    }

    // Состояние всегда согласовано (журнал меняется swap-after-write),
    // поэтому poison можно игнорировать.
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn is_released(&self) -> bool {
        self.state().released
    }

    /// Copy of the journal entries (creation order).
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.state().index.entries().to_vec()
    }

    pub fn len(&self) -> usize {
        self.state().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().index.is_empty()
    }

    /// Write a payload and register it with a 0° transform, all-or-nothing.
    ///
    /// Returns Ok(None) when the session was released in the meantime; the
    /// caller retries on a fresh session.
    pub(crate) fn persist_page(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> StoreResult<Option<PathBuf>> {
        let mut st = self.state();
        if st.released {
            return Ok(None);
        }

        let path = self.folder.join(file_name);
        if let Err(source) = write_new_file(&path, bytes, self.fsync) {
            return Err(StoreError::PersistenceWrite { path, source });
        }
        if self.fsync {
            let _ = fsync_dir(&path);
        }

        if let Err(e) = st
            .index
            .add(IndexEntry::new(file_name, Orientation::Deg0))
        {
            let _ = fs::remove_file(&path);
            return Err(StoreError::Journal(e));
        }
        debug!("persisted {} ({} bytes)", path.display(), bytes.len());
        Ok(Some(path))
    }

    pub(crate) fn update_transform(&self, file_name: &str, transform: Orientation) -> StoreResult<()> {
        let mut st = self.state();
        if st.released {
            return Ok(());
        }
        let found = st
            .index
            .update_transform(file_name, transform)
            .map_err(StoreError::Journal)?;
        if !found {
            warn!(
                "journal {} has no entry for {}",
                st.index.path().display(),
                file_name
            );
        }
        Ok(())
    }

    /// Remove the entry; tear the session down if it was the last one.
    /// Returns true when the session got released by this call.
    pub(crate) fn unregister(&self, file_name: &str) -> StoreResult<bool> {
        let mut st = self.state();
        if st.released {
            return Ok(false);
        }
        st.index.remove(file_name).map_err(StoreError::Journal)?;
        if st.index.is_empty() {
            self.release_locked(&mut st);
            return Ok(true);
        }
        Ok(false)
    }

    /// Drop the lock, delete the folder recursively. Failures are logged.
    fn release_locked(&self, st: &mut SessionState) {
        if st.released {
            return;
        }
        st.released = true;
        if let Some(guard) = st.lock.take() {
            if let Err(e) = guard.release() {
                warn!("recovery lock cleanup failed: {e:#}");
                metrics::record_cleanup_error();
            }
        }
        match fs::remove_dir_all(&self.folder) {
            Ok(()) => info!("recovery session released, removed {}", self.folder.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    "failed to remove recovery folder {}: {}",
                    self.folder.display(),
                    e
                );
                metrics::record_cleanup_error();
            }
        }
        metrics::record_session_released();
    }
}

impl Drop for RecoverySession {
    fn drop(&mut self) {
        let mut st = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if st.released {
            return;
        }
        if st.index.is_empty() {
            self.release_locked(&mut st);
        } else {
            // Страницы не дошли до dispose: каталог остаётся для восстановления,
            // отпускаем только fs2-lock (sentinel остаётся на диске).
            warn!(
                "recovery session dropped with {} page(s), keeping {}",
                st.index.len(),
                self.folder.display()
            );
            st.lock.take();
        }
    }
}

// Файл, который уже существовал (create_new -> AlreadyExists), не наш и не
// удаляется; недописанный собственный файл удаляется.
fn write_new_file(path: &Path, bytes: &[u8], fsync: bool) -> io::Result<()> {
    let mut f = OpenOptions::new().create_new(true).write(true).open(path)?;
    let res = f.write_all(bytes).and_then(|()| {
        if fsync {
            f.sync_all()
        } else {
            Ok(())
        }
    });
    if res.is_err() {
        drop(f);
        let _ = fs::remove_file(path);
    }
    res
}

fn has_foreign_entries(folder: &Path) -> io::Result<bool> {
    for e in fs::read_dir(folder)? {
        if e?.file_name() != LOCK_FILE_NAME {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Explicit per-process owner of the lazily acquired session and of the
/// payload sequence counter.
pub struct RecoveryContext {
    cfg: StoreConfig,
    encoder: EncoderConfig,
    slot: Mutex<Option<Arc<RecoverySession>>>,
    next_seq: AtomicU64,
}

impl RecoveryContext {
    pub fn new(cfg: StoreConfig) -> Self {
        let encoder = EncoderConfig::from(&cfg);
        Self {
            cfg,
            encoder,
            slot: Mutex::new(None),
            next_seq: AtomicU64::new(SEQ_START),
        }
    }

    pub fn from_env() -> Self {
        Self::new(StoreConfig::from_env())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    pub fn encoder_config(&self) -> &EncoderConfig {
        &self.encoder
    }

    /// Live session, creating it on first use. A second call while the
    /// session is live returns the same instance.
    pub fn acquire(&self) -> StoreResult<Arc<RecoverySession>> {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(s) = slot.as_ref() {
            if !s.is_released() {
                return Ok(Arc::clone(s));
            }
        }
        let session = Arc::new(RecoverySession::open(&self.cfg)?);
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Live session if one exists; never creates.
    pub fn current(&self) -> Option<Arc<RecoverySession>> {
        let slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        slot.as_ref().filter(|s| !s.is_released()).cloned()
    }

    /// Next payload number. Monotonic for the context lifetime, not reset
    /// when a session is released.
    pub(crate) fn next_file_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }
}
