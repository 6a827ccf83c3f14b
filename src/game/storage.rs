//! Key-value persistence for snapshots and the bounded history payload.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StorageError {
    Unavailable,
    #[serde(rename_all = "camelCase")]
    Read { key: String, message: String },
    #[serde(rename_all = "camelCase")]
    Write { key: String, message: String },
    #[serde(rename_all = "camelCase")]
    Encode { key: String, message: String },
    #[serde(rename_all = "camelCase")]
    Decode { key: String, message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable => write!(f, "storage is unavailable"),
            StorageError::Read { key, message } => write!(f, "reading {key} failed: {message}"),
            StorageError::Write { key, message } => write!(f, "writing {key} failed: {message}"),
            StorageError::Encode { key, message } => {
                write!(f, "encoding {key} failed: {message}")
            }
            StorageError::Decode { key, message } => {
                write!(f, "decoding {key} failed: {message}")
            }
        }
    }
}

impl std::error::Error for StorageError {}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// `window.localStorage`. Only usable inside a browser.
pub struct BrowserStorage {
    storage: web_sys::Storage,
}

fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

impl BrowserStorage {
    pub fn local() -> Result<Self, StorageError> {
        let window = web_sys::window().ok_or(StorageError::Unavailable)?;
        let storage = window
            .local_storage()
            .map_err(|_| StorageError::Unavailable)?
            .ok_or(StorageError::Unavailable)?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for BrowserStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage.get_item(key).map_err(|err| StorageError::Read {
            key: key.to_string(),
            message: js_message(&err),
        })
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage
            .set_item(key, value)
            .map_err(|err| StorageError::Write {
                key: key.to_string(),
                message: js_message(&err),
            })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.storage
            .remove_item(key)
            .map_err(|err| StorageError::Write {
                key: key.to_string(),
                message: js_message(&err),
            })
    }
}

pub fn save_json<S, T>(store: &mut S, key: &str, value: &T) -> Result<(), StorageError>
where
    S: KeyValueStore + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_string(value).map_err(|err| StorageError::Encode {
        key: key.to_string(),
        message: err.to_string(),
    })?;
    store.set(key, &json)
}

/// A missing key is `Ok(None)`; a blob that no longer decodes is an error.
pub fn load_json<S, T>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| StorageError::Decode {
            key: key.to_string(),
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::GameState;

    #[test]
    fn memory_store_round_trips_values() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("k"), Ok(None));
        store.set("k", "v").expect("memory set");
        assert_eq!(store.get("k"), Ok(Some("v".to_string())));
        store.remove("k").expect("memory remove");
        assert!(store.is_empty());
    }

    #[test]
    fn json_helpers_store_snapshots() {
        let mut store = MemoryStore::new();
        let state = GameState::sample();
        save_json(&mut store, "save", &state).expect("save");
        let loaded: Option<GameState> = load_json(&store, "save").expect("load");
        assert_eq!(loaded, Some(state));

        let missing: Option<GameState> = load_json(&store, "other").expect("load");
        assert!(missing.is_none());
    }

    #[test]
    fn undecodable_blob_is_a_decode_error() {
        let mut store = MemoryStore::new();
        store.set("save", "{\"players\": 3}").expect("memory set");
        let result: Result<Option<GameState>, _> = load_json(&store, "save");
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }

    #[test]
    fn boxed_store_delegates() {
        let mut store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        store.set("a", "1").expect("boxed set");
        assert_eq!(store.get("a"), Ok(Some("1".to_string())));
    }
}
