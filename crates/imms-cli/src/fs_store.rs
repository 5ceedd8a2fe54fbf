//! Filesystem-backed object store for local pipeline runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use imms_batch::{ObjectError, ObjectStore};

/// Object store rooted at a directory. Keys map to relative paths, so the
/// pipeline's `ack/`, `archive/` and `forwardedFile/` prefixes become
/// subdirectories.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

fn map_err(key: &str, err: &io::Error) -> ObjectError {
    if err.kind() == io::ErrorKind::NotFound {
        ObjectError::NotFound(key.to_string())
    } else {
        ObjectError::Store(format!("[{key}]: {err}"))
    }
}

fn ensure_parent(path: &Path, key: &str) -> Result<(), ObjectError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| map_err(key, &err))?;
    }
    Ok(())
}

impl ObjectStore for FsObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, ObjectError> {
        fs::read(self.path(key)).map_err(|err| map_err(key, &err))
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<(), ObjectError> {
        let path = self.path(key);
        ensure_parent(&path, key)?;
        fs::write(path, body).map_err(|err| map_err(key, &err))
    }

    fn delete(&self, key: &str) -> Result<(), ObjectError> {
        fs::remove_file(self.path(key)).map_err(|err| map_err(key, &err))
    }

    fn copy(&self, source: &str, destination: &str) -> Result<(), ObjectError> {
        let to = self.path(destination);
        ensure_parent(&to, destination)?;
        fs::copy(self.path(source), to)
            .map(|_| ())
            .map_err(|err| map_err(source, &err))
    }

    fn exists(&self, key: &str) -> Result<bool, ObjectError> {
        Ok(self.path(key).exists())
    }
}
