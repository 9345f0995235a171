// tests/recovery_scan.rs
//
// Сканер восстановления:
// - живой run виден как Held и не трогается purge;
// - "упавший" run (копия каталога без владельца) виден как stale, журнал читается,
//   страницы материализуются с учётом transform;
// - purge_stale(dry_run) ничего не удаляет, обычный purge удаляет только stale;
// - export_run пишет PNG в порядке журнала и пропускает отсутствующие payload.

use anyhow::Result;
use image::{DynamicImage, Luma, GrayImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use pagekeep::consts::{JOURNAL_FILE, LOCK_FILE_NAME};
use pagekeep::lock::LockState;
use pagekeep::recover::{export_run, inspect_run};
use pagekeep::{
    purge_stale, scan_root, BitDepth, Orientation, RecoveryContext, ScannedPage, StoreConfig,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("pktest-{prefix}-{pid}-{t}-{id}"))
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for e in fs::read_dir(src)? {
        let e = e?;
        fs::copy(e.path(), dst.join(e.file_name()))?;
    }
    Ok(())
}

fn stripes(w: u32, h: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, _| Luma([(x * 20 % 256) as u8])))
}

#[test]
fn scan_tells_live_runs_from_crashed_ones() -> Result<()> {
    let root = unique_root("scan");
    let ctx = RecoveryContext::new(StoreConfig::default().with_recovery_root(&root));

    let mut a = ScannedPage::from_raster(&ctx, stripes(10, 4), BitDepth::Grayscale, true)?;
    let b = ScannedPage::from_raster(&ctx, stripes(6, 6), BitDepth::Grayscale, true)?;
    a.rotate(Orientation::Deg90)?;
    let live = a.session().folder().to_path_buf();

    // снимок каталога = то, что останется после падения процесса
    let crashed = root.join("zz-crashed");
    copy_dir(&live, &crashed)?;

    // и каталог совсем без sentinel
    let orphan = root.join("zz-orphan");
    copy_dir(&live, &orphan)?;
    fs::remove_file(orphan.join(LOCK_FILE_NAME))?;

    // посторонний каталог без lock/журнала сканер не видит
    fs::create_dir_all(root.join("not-a-run"))?;

    let runs = scan_root(&root)?;
    assert_eq!(runs.len(), 3);

    let live_run = runs.iter().find(|r| r.folder == live).expect("live run");
    assert_eq!(live_run.lock, LockState::Held);
    assert!(!live_run.is_stale());

    let crashed_run = runs.iter().find(|r| r.folder == crashed).expect("crashed run");
    assert_eq!(crashed_run.lock, LockState::Abandoned);
    assert!(crashed_run.is_stale());
    assert!(crashed_run.journal_error.is_none());
    assert_eq!(crashed_run.name(), "zz-crashed");

    let pages = crashed_run.pages();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].file_name, a.file_name());
    assert_eq!(pages[0].transform, Orientation::Deg90);
    assert_eq!(pages[1].transform, Orientation::Deg0);
    assert_eq!(pages[0].materialize()?.to_luma8(), stripes(10, 4).rotate90().to_luma8());

    let orphan_run = runs.iter().find(|r| r.folder == orphan).expect("orphan run");
    assert_eq!(orphan_run.lock, LockState::Missing);
    assert!(orphan_run.is_stale());

    drop(a);
    drop(b);
    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn purge_removes_only_stale_runs() -> Result<()> {
    let root = unique_root("purge");
    let ctx = RecoveryContext::new(StoreConfig::default().with_recovery_root(&root));
    let page = ScannedPage::from_raster(&ctx, stripes(4, 4), BitDepth::Grayscale, false)?;
    let live = page.session().folder().to_path_buf();

    let crashed = root.join("crashed");
    copy_dir(&live, &crashed)?;

    let would = purge_stale(&root, true)?;
    assert_eq!(would, vec![crashed.clone()]);
    assert!(crashed.exists(), "dry run must not delete anything");

    let purged = purge_stale(&root, false)?;
    assert_eq!(purged, vec![crashed.clone()]);
    assert!(!crashed.exists());
    assert!(live.exists());
    assert!(live.join(LOCK_FILE_NAME).exists());

    drop(page);
    assert!(purge_stale(&root, false)?.is_empty());
    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn purge_skips_folders_without_journal() -> Result<()> {
    let root = unique_root("purge-nojournal");

    // sentinel уже есть, журнала ещё нет: так выглядит открывающаяся сессия
    let opening = root.join("opening");
    fs::create_dir_all(&opening)?;
    fs::write(opening.join(LOCK_FILE_NAME), b"")?;

    // журнал без sentinel: брошенный run
    let orphan = root.join("orphan");
    fs::create_dir_all(&orphan)?;
    fs::write(orphan.join(JOURNAL_FILE), br#"{"version":1,"images":[]}"#)?;

    let runs = scan_root(&root)?;
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.is_stale()));

    let purged = purge_stale(&root, false)?;
    assert_eq!(purged, vec![orphan.clone()]);
    assert!(opening.join(LOCK_FILE_NAME).exists());
    assert!(!orphan.exists());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn export_writes_pages_in_journal_order() -> Result<()> {
    let root = unique_root("export");
    let ctx = RecoveryContext::new(StoreConfig::default().with_recovery_root(&root));

    let mut first = ScannedPage::from_raster(&ctx, stripes(8, 2), BitDepth::Grayscale, true)?;
    let second = ScannedPage::from_raster(&ctx, stripes(3, 5), BitDepth::Grayscale, true)?;
    let third = ScannedPage::from_raster(&ctx, stripes(2, 2), BitDepth::Grayscale, true)?;
    first.rotate(Orientation::Deg270)?;

    let crashed = root.join("crashed");
    copy_dir(first.session().folder(), &crashed)?;
    // payload третьей страницы потерян
    fs::remove_file(crashed.join(third.file_name()))?;

    let run = inspect_run(&crashed)?;
    let out = root.join("out");
    let written = export_run(&run, &out)?;
    assert_eq!(written.len(), 2);
    assert_eq!(written[0], out.join("page-0001.png"));

    let p1 = image::open(&written[0])?;
    assert_eq!(p1.to_luma8(), stripes(8, 2).rotate270().to_luma8());
    let p2 = image::open(&written[1])?;
    assert_eq!((p2.width(), p2.height()), (3, 5));

    drop((first, second, third));
    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn damaged_journal_is_reported_not_fatal() -> Result<()> {
    let root = unique_root("damaged");
    let run = root.join("broken");
    fs::create_dir_all(&run)?;
    fs::write(run.join(LOCK_FILE_NAME), b"")?;
    fs::write(run.join(JOURNAL_FILE), b"{\"version\":1,\"images\":[{\"file_na")?;

    let runs = scan_root(&root)?;
    assert_eq!(runs.len(), 1);
    assert!(runs[0].is_stale());
    assert!(runs[0].entries.is_empty());
    assert!(runs[0].journal_error.is_some());

    // отсутствующий корень = пусто, не ошибка
    assert!(scan_root(&root.join("nope"))?.is_empty());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
