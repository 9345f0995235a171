//! Lightweight global metrics for the page store.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Sessions (acquire/release)
//! - Pages (create/rotate/materialize/dispose)
//! - Journal (persist)
//! - Cleanup failures (dispose best-effort)

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Sessions -----
static SESSIONS_ACQUIRED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_RELEASED: AtomicU64 = AtomicU64::new(0);

// ----- Pages -----
static PAGES_CREATED: AtomicU64 = AtomicU64::new(0);
static PAGES_DISPOSED: AtomicU64 = AtomicU64::new(0);
static PAGE_BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static PAGES_ROTATED: AtomicU64 = AtomicU64::new(0);
static PAGES_MATERIALIZED: AtomicU64 = AtomicU64::new(0);
static PAGES_PASSTHROUGH: AtomicU64 = AtomicU64::new(0);

// ----- Journal -----
static JOURNAL_PERSISTS: AtomicU64 = AtomicU64::new(0);
static JOURNAL_BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);

// ----- Cleanup -----
static CLEANUP_ERRORS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    // Sessions
    pub sessions_acquired: u64,
    pub sessions_released: u64,

    // Pages
    pub pages_created: u64,
    pub pages_disposed: u64,
    pub page_bytes_written: u64,
    pub pages_rotated: u64,
    pub pages_materialized: u64,
    /// Pages written verbatim from already-encoded bytes.
    pub pages_passthrough: u64,

    // Journal
    pub journal_persists: u64,
    pub journal_bytes_written: u64,

    // Cleanup
    pub cleanup_errors: u64,
}

impl MetricsSnapshot {
    pub fn avg_page_bytes(&self) -> f64 {
        if self.pages_created == 0 {
            0.0
        } else {
            self.page_bytes_written as f64 / self.pages_created as f64
        }
    }

    pub fn live_sessions(&self) -> u64 {
        self.sessions_acquired.saturating_sub(self.sessions_released)
    }
}

// ----- Recorders (Sessions) -----
pub fn record_session_acquired() {
    SESSIONS_ACQUIRED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_session_released() {
    SESSIONS_RELEASED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Pages) -----
pub fn record_page_created(bytes: usize, passthrough: bool) {
    PAGES_CREATED.fetch_add(1, Ordering::Relaxed);
    PAGE_BYTES_WRITTEN.fetch_add(bytes as u64, Ordering::Relaxed);
    if passthrough {
        PAGES_PASSTHROUGH.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_page_disposed() {
    PAGES_DISPOSED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_page_rotated() {
    PAGES_ROTATED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_page_materialized() {
    PAGES_MATERIALIZED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Journal) -----
pub fn record_journal_persist(bytes: usize) {
    JOURNAL_PERSISTS.fetch_add(1, Ordering::Relaxed);
    JOURNAL_BYTES_WRITTEN.fetch_add(bytes as u64, Ordering::Relaxed);
}

// ----- Recorders (Cleanup) -----
pub fn record_cleanup_error() {
    CLEANUP_ERRORS.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        sessions_acquired: SESSIONS_ACQUIRED.load(Ordering::Relaxed),
        sessions_released: SESSIONS_RELEASED.load(Ordering::Relaxed),

        pages_created: PAGES_CREATED.load(Ordering::Relaxed),
        pages_disposed: PAGES_DISPOSED.load(Ordering::Relaxed),
        page_bytes_written: PAGE_BYTES_WRITTEN.load(Ordering::Relaxed),
        pages_rotated: PAGES_ROTATED.load(Ordering::Relaxed),
        pages_materialized: PAGES_MATERIALIZED.load(Ordering::Relaxed),
        pages_passthrough: PAGES_PASSTHROUGH.load(Ordering::Relaxed),

        journal_persists: JOURNAL_PERSISTS.load(Ordering::Relaxed),
        journal_bytes_written: JOURNAL_BYTES_WRITTEN.load(Ordering::Relaxed),

        cleanup_errors: CLEANUP_ERRORS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    SESSIONS_ACQUIRED.store(0, Ordering::Relaxed);
    SESSIONS_RELEASED.store(0, Ordering::Relaxed);

    PAGES_CREATED.store(0, Ordering::Relaxed);
    PAGES_DISPOSED.store(0, Ordering::Relaxed);
    PAGE_BYTES_WRITTEN.store(0, Ordering::Relaxed);
    PAGES_ROTATED.store(0, Ordering::Relaxed);
    PAGES_MATERIALIZED.store(0, Ordering::Relaxed);
    PAGES_PASSTHROUGH.store(0, Ordering::Relaxed);

    JOURNAL_PERSISTS.store(0, Ordering::Relaxed);
    JOURNAL_BYTES_WRITTEN.store(0, Ordering::Relaxed);

    CLEANUP_ERRORS.store(0, Ordering::Relaxed);
}
