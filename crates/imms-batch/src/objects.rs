//! Object storage contract for batch and ack files.

use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("object not found: [{0}]")]
    NotFound(String),
    #[error("object store failure: {0}")]
    Store(String),
}

/// Blob storage keyed by string paths. Implementations must make `copy`
/// then `delete` safe to use as a move.
pub trait ObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, ObjectError>;
    fn put(&self, key: &str, body: &[u8]) -> Result<(), ObjectError>;
    fn delete(&self, key: &str) -> Result<(), ObjectError>;
    fn copy(&self, source: &str, destination: &str) -> Result<(), ObjectError>;
    fn exists(&self, key: &str) -> Result<bool, ObjectError>;
}

/// Move an object by copying and then deleting the source.
pub fn move_object(store: &dyn ObjectStore, source: &str, destination: &str) -> Result<(), ObjectError> {
    store.copy(source, destination)?;
    store.delete(source)?;
    tracing::info!(source, destination, "object moved");
    Ok(())
}

/// In-memory object store for tests and single-process runs.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored key, in order. Test helper.
    pub fn keys(&self) -> Vec<String> {
        match self.objects.lock() {
            Ok(objects) => objects.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, ObjectError> {
        self.objects
            .lock()
            .map_err(|_| ObjectError::Store("object store mutex poisoned".to_string()))
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, ObjectError> {
        self.lock()?
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<(), ObjectError> {
        self.lock()?.insert(key.to_string(), body.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), ObjectError> {
        self.lock()?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| ObjectError::NotFound(key.to_string()))
    }

    fn copy(&self, source: &str, destination: &str) -> Result<(), ObjectError> {
        let mut objects = self.lock()?;
        let body = objects
            .get(source)
            .cloned()
            .ok_or_else(|| ObjectError::NotFound(source.to_string()))?;
        objects.insert(destination.to_string(), body);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, ObjectError> {
        Ok(self.lock()?.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_copies_then_deletes() {
        let store = MemoryObjectStore::new();
        store.put("in/file.csv", b"data").unwrap();
        move_object(&store, "in/file.csv", "archive/file.csv").unwrap();
        assert!(!store.exists("in/file.csv").unwrap());
        assert_eq!(store.get("archive/file.csv").unwrap(), b"data");
    }

    #[test]
    fn missing_objects_are_not_found() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.get("nope"),
            Err(ObjectError::NotFound(_))
        ));
        assert!(matches!(
            move_object(&store, "nope", "archive/nope"),
            Err(ObjectError::NotFound(_))
        ));
    }
}
