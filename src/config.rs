//! Centralized configuration and builder for the page store.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - StoreConfig::from_env() reads PK_* env vars on top of the defaults.
//! - StoreBuilder returns a StoreConfig, which RecoveryContext consumes.
//!
//! Env:
//! - PK_RECOVERY_DIR  : recovery root (default <tmp>/pagekeep/recovery)
//! - PK_RUN_NAME      : fixed run folder name (default: random hex per run)
//! - PK_JPEG_QUALITY  : 1..=100 (default 75)
//! - PK_THUMB_SIZE    : max thumbnail side in px (default 256)
//! - PK_PICK_SMALLEST : encode PNG and JPEG, keep the smaller (default off)
//! - PK_JOURNAL_ATOMIC: journal persist via tmp+rename (default on)
//! - PK_FSYNC         : fsync payloads and journal (default off)

use std::fmt;
use std::path::PathBuf;

use crate::consts::{DEFAULT_JPEG_QUALITY, DEFAULT_THUMB_SIZE};

/// Top-level configuration of a recovery context.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory holding one subfolder per process run.
    /// Env: PK_RECOVERY_DIR
    pub recovery_root: PathBuf,

    /// Fixed run folder name. None => random hex name per session.
    /// Env: PK_RUN_NAME
    pub run_name: Option<String>,

    /// JPEG quality for lossy pages (clamped to 1..=100).
    /// Env: PK_JPEG_QUALITY (default 75)
    pub jpeg_quality: u8,

    /// Max thumbnail side in pixels.
    /// Env: PK_THUMB_SIZE (default 256)
    pub thumbnail_size: u32,

    /// Encode both PNG and JPEG for lossy-eligible pages and keep the smaller.
    /// Env: PK_PICK_SMALLEST = 0|1 (default 0)
    pub pick_smallest: bool,

    /// Persist the journal via tmp+rename instead of truncate+write.
    /// Env: PK_JOURNAL_ATOMIC = 0|1 (default 1)
    pub journal_atomic: bool,

    /// fsync payload files and the journal after writing.
    /// Env: PK_FSYNC = 0|1 (default 0)
    pub fsync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            recovery_root: default_recovery_root(),
            run_name: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            thumbnail_size: DEFAULT_THUMB_SIZE,
            pick_smallest: false,
            journal_atomic: true,
            fsync: false,
        }
    }
}

pub fn default_recovery_root() -> PathBuf {
    std::env::temp_dir().join("pagekeep").join("recovery")
}

fn env_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "on" || s == "yes"
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("PK_RECOVERY_DIR") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.recovery_root = PathBuf::from(s);
            }
        }

        if let Ok(v) = std::env::var("PK_RUN_NAME") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.run_name = Some(s.to_string());
            }
        }

        if let Ok(v) = std::env::var("PK_JPEG_QUALITY") {
            if let Ok(n) = v.trim().parse::<u8>() {
                cfg.jpeg_quality = n.clamp(1, 100);
            }
        }

        if let Ok(v) = std::env::var("PK_THUMB_SIZE") {
            if let Ok(n) = v.trim().parse::<u32>() {
                if n > 0 {
                    cfg.thumbnail_size = n;
                }
            }
        }

        if let Ok(v) = std::env::var("PK_PICK_SMALLEST") {
            cfg.pick_smallest = env_flag(&v);
        }

        if let Ok(v) = std::env::var("PK_JOURNAL_ATOMIC") {
            cfg.journal_atomic = env_flag(&v);
        }

        if let Ok(v) = std::env::var("PK_FSYNC") {
            cfg.fsync = env_flag(&v);
        }

        cfg
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_recovery_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.recovery_root = root.into();
        self
    }

    pub fn with_run_name<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.run_name = name.map(Into::into);
        self
    }

    pub fn with_jpeg_quality(mut self, q: u8) -> Self {
        self.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn with_thumbnail_size(mut self, px: u32) -> Self {
        self.thumbnail_size = px.max(1);
        self
    }

    pub fn with_pick_smallest(mut self, on: bool) -> Self {
        self.pick_smallest = on;
        self
    }

    pub fn with_journal_atomic(mut self, on: bool) -> Self {
        self.journal_atomic = on;
        self
    }

    pub fn with_fsync(mut self, on: bool) -> Self {
        self.fsync = on;
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> Self {
        self
    }
}

impl fmt::Display for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreConfig {{ \
             recovery_root: {}, \
             run_name: {}, \
             jpeg_quality: {}, \
             thumbnail_size: {}, \
             pick_smallest: {}, \
             journal_atomic: {}, \
             fsync: {} \
             }}",
            self.recovery_root.display(),
            self.run_name.as_deref().unwrap_or("random"),
            self.jpeg_quality,
            self.thumbnail_size,
            self.pick_smallest,
            self.journal_atomic,
            self.fsync,
        )
    }
}

/// Lightweight builder that produces a StoreConfig.
#[derive(Clone, Debug)]
pub struct StoreBuilder {
    cfg: StoreConfig,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: StoreConfig::from_env(),
        }
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: StoreConfig::default(),
        }
    }

    pub fn recovery_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.cfg.recovery_root = root.into();
        self
    }

    pub fn run_name<S: Into<String>>(mut self, name: Option<S>) -> Self {
        self.cfg.run_name = name.map(Into::into);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.cfg.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn thumbnail_size(mut self, px: u32) -> Self {
        self.cfg.thumbnail_size = px.max(1);
        self
    }

    pub fn pick_smallest(mut self, on: bool) -> Self {
        self.cfg.pick_smallest = on;
        self
    }

    pub fn journal_atomic(mut self, on: bool) -> Self {
        self.cfg.journal_atomic = on;
        self
    }

    pub fn fsync(mut self, on: bool) -> Self {
        self.cfg.fsync = on;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.cfg
    }
}
