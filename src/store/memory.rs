// In-process store backend
//
// Used for local runs without Redis and by the test suite. Semantics follow
// the Redis commands it stands in for: missing keys behave as empty, and a
// key holding the wrong kind of value is an error.

use super::KeyValueStore;
use crate::error::StoreError;
use async_trait::async_trait;
use rand::seq::IteratorRandom;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

enum Value {
    Set(HashSet<String>),
    Hash(HashMap<String, i64>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Set(_) => "set",
            Value::Hash(_) => "hash",
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Members of the set at `key`, in no particular order
    pub fn members(&self, key: &str) -> Vec<String> {
        match self.lock().get(key) {
            Some(Value::Set(set)) => set.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Current value of `field` in the hash at `key`
    pub fn counter(&self, key: &str, field: &str) -> Option<i64> {
        match self.lock().get(key) {
            Some(Value::Hash(hash)) => hash.get(field).copied(),
            _ => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        // A panic while holding the lock cannot leave a half-applied command
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &Value) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

fn set_mut<'a>(
    data: &'a mut HashMap<String, Value>,
    key: &str,
) -> Result<&'a mut HashSet<String>, StoreError> {
    let value = data
        .entry(key.to_string())
        .or_insert_with(|| Value::Set(HashSet::new()));
    match value {
        Value::Set(set) => Ok(set),
        other => Err(wrong_type(key, "set", other)),
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_cardinality(&self, key: &str) -> Result<usize, StoreError> {
        match self.lock().get(key) {
            None => Ok(0),
            Some(Value::Set(set)) => Ok(set.len()),
            Some(other) => Err(wrong_type(key, "set", other)),
        }
    }

    async fn random_member(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.lock().get(key) {
            None => Ok(None),
            Some(Value::Set(set)) => Ok(set.iter().choose(&mut rand::thread_rng()).cloned()),
            Some(other) => Err(wrong_type(key, "set", other)),
        }
    }

    async fn add_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut data = self.lock();
        Ok(set_mut(&mut data, key)?.insert(member.to_string()))
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<usize, StoreError> {
        // Redis never stores an empty set
        if members.is_empty() {
            return Ok(0);
        }
        let mut data = self.lock();
        let set = set_mut(&mut data, key)?;
        Ok(members
            .iter()
            .filter(|member| set.insert((*member).clone()))
            .count())
    }

    async fn delete_key(&self, key: &str) -> Result<usize, StoreError> {
        Ok(usize::from(self.lock().remove(key).is_some()))
    }

    async fn increment_field(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, StoreError> {
        let mut data = self.lock();
        let value = data
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(HashMap::new()));
        match value {
            Value::Hash(hash) => {
                let counter = hash.entry(field.to_string()).or_insert(0);
                *counter += delta;
                Ok(*counter)
            }
            other => Err(wrong_type(key, "hash", other)),
        }
    }
}
