//! recover: разбор run-каталогов, оставшихся после упавших процессов.
//!
//! Run считается брошенным (stale), если его sentinel отсутствует или fs2-lock
//! на нём берётся (владелец умер). Живые run'ы только показываются и никогда
//! не трогаются.
//!
//! Повреждённый журнал (обрезанный JSON и т.п.) не валит весь скан: ошибка
//! сохраняется в RecoverableRun::journal_error.

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::{JOURNAL_FILE, LOCK_FILE_NAME};
use crate::encoder::{decode, encode, PageFormat};
use crate::journal::{read_entries, IndexEntry};
use crate::lock::{lock_state, LockState};
use crate::orientation::Orientation;

#[derive(Debug, Clone)]
pub struct RecoverableRun {
    pub folder: PathBuf,
    pub lock: LockState,
    pub entries: Vec<IndexEntry>,
    pub journal_error: Option<String>,
}

impl RecoverableRun {
    pub fn is_stale(&self) -> bool {
        self.lock != LockState::Held
    }

    /// Journal file present. A session writes it only after its lock is
    /// taken, so a folder without one may still be starting up.
    pub fn has_journal(&self) -> bool {
        self.folder.join(JOURNAL_FILE).is_file()
    }

    pub fn name(&self) -> String {
        self.folder
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Pages in journal order.
    pub fn pages(&self) -> Vec<RecoveredPage> {
        self.entries
            .iter()
            .map(|e| RecoveredPage {
                path: self.folder.join(&e.file_name),
                format: Path::new(&e.file_name)
                    .extension()
                    .and_then(|x| x.to_str())
                    .and_then(PageFormat::from_extension),
                file_name: e.file_name.clone(),
                transform: e.transform,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RecoveredPage {
    pub file_name: String,
    pub path: PathBuf,
    pub format: Option<PageFormat>,
    pub transform: Orientation,
}

impl RecoveredPage {
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Decode the payload and apply the journal transform.
    pub fn materialize(&self) -> Result<DynamicImage> {
        let format = self
            .format
            .ok_or_else(|| anyhow!("unknown payload format for {}", self.file_name))?;
        let bytes =
            fs::read(&self.path).with_context(|| format!("read payload {}", self.path.display()))?;
        let img = decode(&bytes, format)
            .with_context(|| format!("decode payload {}", self.path.display()))?;
        Ok(self.transform.apply_owned(img))
    }
}

fn looks_like_run(folder: &Path) -> bool {
    folder.join(LOCK_FILE_NAME).exists() || folder.join(JOURNAL_FILE).exists()
}

/// Inspect one run folder.
pub fn inspect_run(folder: &Path) -> Result<RecoverableRun> {
    let lock = lock_state(folder)?;
    let (entries, journal_error) = match read_entries(folder) {
        Ok(v) => (v, None),
        Err(e) => (Vec::new(), Some(format!("{e:#}"))),
    };
    Ok(RecoverableRun {
        folder: folder.to_path_buf(),
        lock,
        entries,
        journal_error,
    })
}

/// All run folders under `root`, sorted by name. A missing root is empty.
pub fn scan_root(root: &Path) -> Result<Vec<RecoverableRun>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for e in fs::read_dir(root).with_context(|| format!("read_dir {}", root.display()))? {
        let p = e?.path();
        if !p.is_dir() || !looks_like_run(&p) {
            continue;
        }
        match inspect_run(&p) {
            Ok(run) => out.push(run),
            Err(e) => warn!("skip run {}: {e:#}", p.display()),
        }
    }
    out.sort_by(|a, b| a.folder.cmp(&b.folder));
    debug!("scan {}: {} run(s)", root.display(), out.len());
    Ok(out)
}

/// Delete stale run folders. With `dry_run` only reports what would go.
/// Stale folders without a journal are skipped: they may belong to a
/// session that has not finished opening.
pub fn purge_stale(root: &Path, dry_run: bool) -> Result<Vec<PathBuf>> {
    let mut purged = Vec::new();
    for run in scan_root(root)? {
        if !run.is_stale() {
            continue;
        }
        if !run.has_journal() {
            debug!("skip {}: no journal yet", run.folder.display());
            continue;
        }
        if !dry_run {
            fs::remove_dir_all(&run.folder)
                .with_context(|| format!("remove run {}", run.folder.display()))?;
            info!("purged stale run {}", run.folder.display());
        }
        purged.push(run.folder);
    }
    Ok(purged)
}

/// Write every page of `run` into `out_dir` as PNG with its transform applied.
/// Pages whose payload is missing are skipped with a warning.
pub fn export_run(run: &RecoverableRun, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    let mut written = Vec::new();
    for (i, page) in run.pages().iter().enumerate() {
        if !page.exists() {
            warn!("payload {} listed in journal but missing", page.path.display());
            continue;
        }
        let img = page.materialize()?;
        let bytes = encode(&img, PageFormat::Png, 100)?;
        let dst = out_dir.join(format!("page-{:04}.png", i + 1));
        fs::write(&dst, bytes).with_context(|| format!("write {}", dst.display()))?;
        written.push(dst);
    }
    Ok(written)
}
