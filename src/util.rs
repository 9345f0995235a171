//! util: общие файловые хелперы (атомарная запись, fsync каталога, имена).

use anyhow::{Context, Result};
#[cfg(unix)]
use std::fs::File;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::consts::{JOURNAL_TMP_EXT, SEQ_WIDTH};

#[cfg(unix)]
pub fn fsync_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}
#[cfg(not(unix))]
pub fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Перезаписать файл через tmp+rename (+ fsync каталога best-effort).
pub fn write_file_atomic(path: &Path, bytes: &[u8], fsync: bool) -> Result<()> {
    let tmp = path.with_extension(JOURNAL_TMP_EXT);
    let _ = fs::remove_file(&tmp); // best-effort

    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .with_context(|| format!("open tmp {}", tmp.display()))?;
        f.write_all(bytes)?;
        if fsync {
            f.sync_all()?;
        }
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    if fsync {
        let _ = fsync_dir(path);
    }
    Ok(())
}

/// Перезаписать файл на месте (truncate+write). Не атомарно.
pub fn write_file_in_place(path: &Path, bytes: &[u8], fsync: bool) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    f.write_all(bytes)?;
    if fsync {
        f.sync_all()?;
    }
    Ok(())
}

/// Имя payload-файла: 5-значный номер + расширение формата.
pub fn payload_file_name(seq: u64, ext: &str) -> String {
    format!("{:0width$}.{}", seq, ext, width = SEQ_WIDTH)
}

/// Случайная hex-строка из `n` байт (OsRng).
pub fn random_hex(n: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; n];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex_encode(&buf)
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}
