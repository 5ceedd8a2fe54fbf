//! In-memory [`RecordStore`] backed by a mutex-guarded map.
//!
//! Preconditions are evaluated under the same lock as the write, so the
//! conditional semantics hold under concurrent callers. Index queries scan
//! the map; fine at the scale of a test run or a CLI invocation.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::store::{
    FILENAME_INDEX, IDENTIFIER_INDEX, Mutation, Precondition, QUEUE_NAME_INDEX, RecordStore,
    StoreError,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Value>>, StoreError> {
        self.items
            .lock()
            .map_err(|_| StoreError::Unhandled("store mutex poisoned".to_string()))
    }
}

fn precondition_holds(existing: Option<&Value>, precondition: &Precondition) -> bool {
    match precondition {
        Precondition::KeyAbsent => existing.is_none(),
        Precondition::KeyExists => existing.is_some(),
        Precondition::KeyExistsWithout(attr) => {
            existing.is_some_and(|item| item.get(attr).is_none())
        }
        Precondition::KeyExistsWith(attr) => existing.is_some_and(|item| item.get(attr).is_some()),
    }
}

/// The index key an item contributes to the named index, if it has the
/// relevant attributes.
fn index_key(index: &str, item: &Value) -> Option<String> {
    let attr = |name: &str| item.get(name).and_then(Value::as_str);
    match index {
        FILENAME_INDEX => attr("filename").map(str::to_string),
        QUEUE_NAME_INDEX => {
            Some(format!("{}#{}", attr("queue_name")?, attr("status")?))
        }
        IDENTIFIER_INDEX => attr("IdentifierPK").map(str::to_string),
        _ => None,
    }
}

impl RecordStore for MemoryStore {
    fn conditional_put(
        &self,
        key: &str,
        item: Value,
        precondition: Precondition,
    ) -> Result<(), StoreError> {
        let mut items = self.lock()?;
        if !precondition_holds(items.get(key), &precondition) {
            return Err(StoreError::PreconditionFailed {
                key: key.to_string(),
            });
        }
        items.insert(key.to_string(), item);
        Ok(())
    }

    fn conditional_update(
        &self,
        key: &str,
        mutations: Vec<Mutation>,
        precondition: Precondition,
    ) -> Result<Value, StoreError> {
        let mut items = self.lock()?;
        if !precondition_holds(items.get(key), &precondition) {
            return Err(StoreError::PreconditionFailed {
                key: key.to_string(),
            });
        }
        let item = items
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(fields) = item.as_object_mut() else {
            return Err(StoreError::Unhandled(format!(
                "item under key [{key}] is not an object"
            )));
        };
        for mutation in mutations {
            match mutation {
                Mutation::Set(attr, value) => {
                    fields.insert(attr.to_string(), value);
                }
                Mutation::Remove(attr) => {
                    fields.remove(attr);
                }
                Mutation::Increment(attr) => {
                    let current = fields.get(attr).and_then(Value::as_i64).unwrap_or(0);
                    fields.insert(attr.to_string(), Value::from(current + 1));
                }
            }
        }
        Ok(item.clone())
    }

    fn query_by_index(
        &self,
        index: &str,
        key_value: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, StoreError> {
        let items = self.lock()?;
        let mut matches: Vec<Value> = items
            .values()
            .filter(|item| index_key(index, item).as_deref() == Some(key_value))
            .cloned()
            .collect();
        if let Some(limit) = limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_absent_guard_rejects_overwrite() {
        let store = MemoryStore::new();
        store
            .conditional_put("a", json!({"x": 1}), Precondition::KeyAbsent)
            .unwrap();
        let err = store
            .conditional_put("a", json!({"x": 2}), Precondition::KeyAbsent)
            .unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed { .. }));
    }

    #[test]
    fn update_mutations_apply_in_order() {
        let store = MemoryStore::new();
        store
            .conditional_put("a", json!({"Version": 1, "DeletedAt": "t"}), Precondition::KeyAbsent)
            .unwrap();
        let updated = store
            .conditional_update(
                "a",
                vec![
                    Mutation::Increment("Version"),
                    Mutation::Remove("DeletedAt"),
                    Mutation::Set("status", json!("Processed")),
                ],
                Precondition::KeyExists,
            )
            .unwrap();
        assert_eq!(updated, json!({"Version": 2, "status": "Processed"}));
    }

    #[test]
    fn attribute_presence_guards() {
        let store = MemoryStore::new();
        store
            .conditional_put("a", json!({"finalized": true}), Precondition::KeyAbsent)
            .unwrap();
        assert!(
            store
                .conditional_update(
                    "a",
                    vec![],
                    Precondition::KeyExistsWithout("finalized"),
                )
                .is_err()
        );
        assert!(
            store
                .conditional_update("a", vec![], Precondition::KeyExistsWith("finalized"))
                .is_ok()
        );
    }

    #[test]
    fn queue_index_combines_queue_and_status() {
        let store = MemoryStore::new();
        store
            .conditional_put(
                "m1",
                json!({"queue_name": "EMIS_FLU", "status": "Queued", "filename": "f1"}),
                Precondition::KeyAbsent,
            )
            .unwrap();
        store
            .conditional_put(
                "m2",
                json!({"queue_name": "EMIS_FLU", "status": "Processing", "filename": "f2"}),
                Precondition::KeyAbsent,
            )
            .unwrap();
        let queued = store
            .query_by_index(QUEUE_NAME_INDEX, "EMIS_FLU#Queued", None)
            .unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0]["filename"], "f1");
        let by_name = store.query_by_index(FILENAME_INDEX, "f2", None).unwrap();
        assert_eq!(by_name.len(), 1);
    }
}
