//! Durable JSON documents.
//!
//! Documents are replaced atomically: the full document is written to a
//! temporary file in the same directory, synced, then renamed over the
//! target. A reader never observes a partial write. Writers in different
//! processes serialize on an exclusive lock held on a sibling `.lock` file.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

/// Path of the lock file guarding `path`
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Exclusive cross-process lock; released on drop
pub struct DocumentLock {
    _file: File,
}

/// Block until the exclusive lock for `path` is held
pub fn lock(path: &Path) -> io::Result<DocumentLock> {
    let lock_path = lock_path_for(path);
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    file.lock_exclusive()?;
    Ok(DocumentLock { _file: file })
}

/// Read a document, or its default when the file does not exist yet
pub fn read_or_default<T>(path: &Path) -> Result<T, PersistError>
where
    T: DeserializeOwned + Default,
{
    match std::fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(T::default()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Replace the document at `path` atomically
pub fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Errors reading or writing a document
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_is_sibling() {
        let p = Path::new("/tmp/state/state.json");
        assert_eq!(lock_path_for(p), PathBuf::from("/tmp/state/state.json.lock"));
    }

    #[test]
    fn test_missing_file_reads_default() {
        let temp = TempDir::new().unwrap();
        let doc: BTreeMap<String, u32> = read_or_default(&temp.path().join("nope.json")).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("doc.json");

        let mut doc = BTreeMap::new();
        doc.insert("a".to_string(), 1u32);
        write_atomic(&path, &doc).unwrap();

        let back: BTreeMap<String, u32> = read_or_default(&path).unwrap();
        assert_eq!(back, doc);

        // No temp files left behind
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        std::fs::write(&path, "{not json").unwrap();
        let result: Result<BTreeMap<String, u32>, _> = read_or_default(&path);
        assert!(matches!(result, Err(PersistError::Serialization(_))));
    }
}
