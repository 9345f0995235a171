//! journal: recovery index, упорядоченный список {file_name, transform}.
//!
//! Файл <run>/index.json (serde_json, pretty):
//!   { "version": 1, "images": [ {"file_name":"00001.jpg","transform":90}, ... ] }
//!
//! Правила:
//! - порядок записей = порядок создания страниц;
//! - одна запись на живую страницу, дубликатов нет;
//! - каждая мутация заканчивается полной перезаписью файла; в памяти изменение
//!   применяется только после успешной записи.
//! - запись через tmp+rename (atomic=true) или truncate+write (atomic=false).
//!   Во втором случае падение посреди записи оставит обрезанный JSON.
//!
//! Синхронизации внутри нет: конкурентный доступ сериализует владелец (сессия).

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::{JOURNAL_FILE, JOURNAL_VERSION};
use crate::metrics;
use crate::orientation::Orientation;
use crate::util::{write_file_atomic, write_file_in_place};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub file_name: String,
    pub transform: Orientation,
}

impl IndexEntry {
    pub fn new<S: Into<String>>(file_name: S, transform: Orientation) -> Self {
        Self {
            file_name: file_name.into(),
            transform,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalDoc {
    version: u32,
    images: Vec<IndexEntry>,
}

pub fn journal_path(folder: &Path) -> PathBuf {
    folder.join(JOURNAL_FILE)
}

#[derive(Debug)]
pub struct RecoveryIndex {
    path: PathBuf,
    entries: Vec<IndexEntry>,
    atomic: bool,
    fsync: bool,
}

impl RecoveryIndex {
    /// Новый пустой журнал в `folder` (сразу записывается на диск).
    pub fn create(folder: &Path, atomic: bool, fsync: bool) -> Result<Self> {
        let idx = Self {
            path: journal_path(folder),
            entries: Vec::new(),
            atomic,
            fsync,
        };
        idx.persist()?;
        Ok(idx)
    }

    /// Открыть существующий журнал (проверка версии).
    pub fn load(folder: &Path) -> Result<Self> {
        let entries = read_entries(folder)?;
        Ok(Self {
            path: journal_path(folder),
            entries,
            atomic: true,
            fsync: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, file_name: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.file_name == file_name)
    }

    /// Append an entry and persist. Duplicate names are rejected.
    pub fn add(&mut self, entry: IndexEntry) -> Result<()> {
        if self.get(&entry.file_name).is_some() {
            bail!(
                "duplicate journal entry {} in {}",
                entry.file_name,
                self.path.display()
            );
        }
        let mut next = self.entries.clone();
        next.push(entry);
        self.commit(next)
    }

    /// Remove all entries with `file_name` and persist. Returns how many went away.
    pub fn remove(&mut self, file_name: &str) -> Result<usize> {
        let mut next = self.entries.clone();
        next.retain(|e| e.file_name != file_name);
        let removed = self.entries.len() - next.len();
        self.commit(next)?;
        Ok(removed)
    }

    /// Replace the transform of `file_name` and persist. False if no such entry.
    pub fn update_transform(&mut self, file_name: &str, transform: Orientation) -> Result<bool> {
        let mut next = self.entries.clone();
        let mut found = false;
        for e in next.iter_mut().filter(|e| e.file_name == file_name) {
            e.transform = transform;
            found = true;
        }
        self.commit(next)?;
        Ok(found)
    }

    /// Serialize the full list to disk, overwriting previous contents.
    pub fn persist(&self) -> Result<()> {
        write_doc(&self.path, &self.entries, self.atomic, self.fsync)
    }

    fn commit(&mut self, next: Vec<IndexEntry>) -> Result<()> {
        write_doc(&self.path, &next, self.atomic, self.fsync)?;
        self.entries = next;
        Ok(())
    }
}

fn write_doc(path: &Path, entries: &[IndexEntry], atomic: bool, fsync: bool) -> Result<()> {
    let doc = JournalDoc {
        version: JOURNAL_VERSION,
        images: entries.to_vec(),
    };
    let json = serde_json::to_vec_pretty(&doc).context("serialize recovery journal")?;
    if atomic {
        write_file_atomic(path, &json, fsync)?;
    } else {
        write_file_in_place(path, &json, fsync)?;
    }
    metrics::record_journal_persist(json.len());
    Ok(())
}

/// Прочитать записи журнала из `folder` (для восстановления).
pub fn read_entries(folder: &Path) -> Result<Vec<IndexEntry>> {
    let path = journal_path(folder);
    let buf = fs::read(&path).with_context(|| format!("read journal {}", path.display()))?;
    let doc: JournalDoc = serde_json::from_slice(&buf)
        .with_context(|| format!("parse journal {}", path.display()))?;
    if doc.version != JOURNAL_VERSION {
        return Err(anyhow!(
            "unsupported journal version {} in {} (expected {})",
            doc.version,
            path.display(),
            JOURNAL_VERSION
        ));
    }
    Ok(doc.images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::random_hex;

    fn tmp_folder(tag: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "pk-journal-{tag}-{}-{}",
            std::process::id(),
            random_hex(4)
        ));
        fs::create_dir_all(&p).unwrap();
        p
    }

    #[test]
    fn mutations_are_persisted_in_order() -> Result<()> {
        let dir = tmp_folder("order");
        let mut idx = RecoveryIndex::create(&dir, true, false)?;
        assert!(read_entries(&dir)?.is_empty());

        idx.add(IndexEntry::new("00001.png", Orientation::Deg0))?;
        idx.add(IndexEntry::new("00002.jpg", Orientation::Deg0))?;
        idx.add(IndexEntry::new("00003.jpg", Orientation::Deg0))?;
        assert!(idx.update_transform("00002.jpg", Orientation::Deg270)?);
        assert_eq!(idx.remove("00001.png")?, 1);

        let on_disk = read_entries(&dir)?;
        assert_eq!(on_disk, idx.entries());
        assert_eq!(
            on_disk,
            vec![
                IndexEntry::new("00002.jpg", Orientation::Deg270),
                IndexEntry::new("00003.jpg", Orientation::Deg0),
            ]
        );

        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn duplicates_rejected_and_unknown_names_ignored() -> Result<()> {
        let dir = tmp_folder("dup");
        let mut idx = RecoveryIndex::create(&dir, false, false)?;
        idx.add(IndexEntry::new("00001.png", Orientation::Deg0))?;
        assert!(idx.add(IndexEntry::new("00001.png", Orientation::Deg90)).is_err());
        assert_eq!(idx.len(), 1);

        assert!(!idx.update_transform("nope.png", Orientation::Deg90)?);
        assert_eq!(idx.remove("nope.png")?, 0);
        assert_eq!(read_entries(&dir)?.len(), 1);

        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn load_rejects_foreign_version() -> Result<()> {
        let dir = tmp_folder("ver");
        fs::write(journal_path(&dir), br#"{"version":7,"images":[]}"#)?;
        assert!(RecoveryIndex::load(&dir).is_err());

        fs::write(journal_path(&dir), br#"{"version":1,"images":[{"file_name":"00001.png","transform":180}]}"#)?;
        let idx = RecoveryIndex::load(&dir)?;
        assert_eq!(idx.entries()[0].transform, Orientation::Deg180);

        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn failed_persist_leaves_memory_untouched() -> Result<()> {
        let dir = tmp_folder("fail");
        let mut idx = RecoveryIndex::create(&dir, true, false)?;
        idx.add(IndexEntry::new("00001.png", Orientation::Deg0))?;
        fs::remove_dir_all(&dir)?;

        assert!(idx.add(IndexEntry::new("00002.png", Orientation::Deg0)).is_err());
        assert!(idx.update_transform("00001.png", Orientation::Deg90).is_err());
        assert_eq!(idx.entries(), &[IndexEntry::new("00001.png", Orientation::Deg0)]);
        Ok(())
    }
}
