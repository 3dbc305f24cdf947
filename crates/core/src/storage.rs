//! Filesystem access behind a small trait.
//!
//! The cache only ever talks to storage through [`Storage`], which keeps
//! the facade testable with doubles that fail on demand.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The file does not exist.
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A non-directory occupies the requested directory path.
    #[error("not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    /// A path could not be built from its parts.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Any other I/O failure.
    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl StorageError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound { path: path.to_path_buf() }
        } else {
            StorageError::Io { path: path.to_path_buf(), source }
        }
    }
}

/// Directory and file primitives over raw byte buffers.
pub trait Storage {
    /// Make sure `path` is a directory, creating intermediate directories.
    ///
    /// Returns true if anything was created.
    fn ensure_dir(&self, path: &Path) -> Result<bool, StorageError>;

    /// Read a whole file.
    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Create or replace a file with `bytes`.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError>;

    /// Delete a file. A missing file is reported as [`StorageError::NotFound`].
    fn delete(&self, path: &Path) -> Result<(), StorageError>;

    /// Whether `path` names an existing regular file.
    fn exists(&self, path: &Path) -> bool;

    /// Names of the regular files directly inside `dir`.
    fn list(&self, dir: &Path) -> Result<Vec<String>, StorageError>;
}

/// Join a directory and a bare file name.
///
/// Rejects empty parts and names that would escape the directory.
pub fn concat_path(dir: &Path, name: &str) -> Result<PathBuf, StorageError> {
    if dir.as_os_str().is_empty() {
        return Err(StorageError::InvalidPath("empty directory".into()));
    }
    if name.is_empty() {
        return Err(StorageError::InvalidPath("empty file name".into()));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(StorageError::InvalidPath(format!("file name {name:?} is not a bare name")));
    }
    Ok(dir.join(name))
}

/// Appended to a target path while [`FsStorage::write`] stages its bytes.
pub const STAGING_SUFFIX: &str = ".tmp";

/// [`Storage`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn ensure_dir(&self, path: &Path) -> Result<bool, StorageError> {
        if path.is_dir() {
            return Ok(false);
        }
        if path.exists() {
            return Err(StorageError::NotADirectory { path: path.to_path_buf() });
        }
        fs::create_dir_all(path).map_err(|e| StorageError::from_io(path, e))?;
        Ok(true)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        fs::read(path).map_err(|e| StorageError::from_io(path, e))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let mut staging = path.as_os_str().to_owned();
        staging.push(STAGING_SUFFIX);
        let staging = PathBuf::from(staging);

        fs::write(&staging, bytes).map_err(|e| StorageError::from_io(&staging, e))?;
        if let Err(e) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            return Err(StorageError::from_io(path, e));
        }
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<(), StorageError> {
        fs::remove_file(path).map_err(|e| StorageError::from_io(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| StorageError::from_io(dir, e))? {
            let entry = entry.map_err(|e| StorageError::from_io(dir, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        assert!(FsStorage.ensure_dir(&nested).unwrap());
        assert!(nested.is_dir());
        assert!(!FsStorage.ensure_dir(&nested).unwrap());
    }

    #[test]
    fn test_ensure_dir_over_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, b"x").unwrap();

        let result = FsStorage.ensure_dir(&file);
        assert!(matches!(result, Err(StorageError::NotADirectory { .. })));
    }

    #[test]
    fn test_write_read_delete() {
        let dir = tempdir().unwrap();
        let path = concat_path(dir.path(), "testfile0").unwrap();
        let buffer = b"23\nfad\0hAppd".to_vec();

        FsStorage.write(&path, &buffer).unwrap();
        assert!(FsStorage.exists(&path));
        assert_eq!(FsStorage.read(&path).unwrap(), buffer);

        FsStorage.delete(&path).unwrap();
        assert!(!FsStorage.exists(&path));
    }

    #[test]
    fn test_write_replaces_and_leaves_no_staging_file() {
        let dir = tempdir().unwrap();
        let path = concat_path(dir.path(), "replaced").unwrap();

        FsStorage.write(&path, b"first version").unwrap();
        FsStorage.write(&path, b"2nd").unwrap();

        assert_eq!(FsStorage.read(&path).unwrap(), b"2nd");
        assert_eq!(FsStorage.list(dir.path()).unwrap(), vec!["replaced".to_string()]);
    }

    #[test]
    fn test_write_empty_buffer() {
        let dir = tempdir().unwrap();
        let path = concat_path(dir.path(), "empty").unwrap();

        FsStorage.write(&path, &[]).unwrap();
        assert!(FsStorage.exists(&path));
        assert!(FsStorage.read(&path).unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let path = concat_path(dir.path(), "missing").unwrap();

        assert!(matches!(FsStorage.delete(&path), Err(StorageError::NotFound { .. })));
        assert!(matches!(FsStorage.read(&path), Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn test_exists_is_false_for_directories() {
        let dir = tempdir().unwrap();
        assert!(!FsStorage.exists(dir.path()));
    }

    #[test]
    fn test_list_skips_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("file.CDF"), b"x").unwrap();

        assert_eq!(FsStorage.list(dir.path()).unwrap(), vec!["file.CDF".to_string()]);
    }

    #[test]
    fn test_concat_path_rejects_invalid_parts() {
        let dir = Path::new("/tmp/cache");
        assert!(matches!(concat_path(dir, ""), Err(StorageError::InvalidPath(_))));
        assert!(matches!(concat_path(Path::new(""), "a"), Err(StorageError::InvalidPath(_))));
        assert!(matches!(concat_path(dir, "../escape"), Err(StorageError::InvalidPath(_))));
        assert!(matches!(concat_path(dir, ".."), Err(StorageError::InvalidPath(_))));
        assert_eq!(concat_path(dir, "00ff.CDF").unwrap(), dir.join("00ff.CDF"));
    }
}
