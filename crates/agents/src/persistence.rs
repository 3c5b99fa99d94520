//! Key-value storage behind conversation memories
//!
//! Memories serialize a [`MemoryRecord`] as JSON under an opaque key, so any
//! string store (in-memory map, redis, a database table) can back them.

use async_trait::async_trait;
use orchestrator_core::{errors::MemoryError, Message};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted state of one conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Retained messages, oldest first
    pub messages: Vec<Message>,

    /// Running summary of messages that were folded away
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Last write (Unix milliseconds)
    #[serde(default)]
    pub updated_at: i64,
}

impl MemoryRecord {
    /// Read and decode the record under `key`; a missing key is an empty record
    pub async fn load(store: &dyn MemoryStore, key: &str) -> Result<Self, MemoryError> {
        match store.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Self::default()),
        }
    }

    /// Encode and write the record under `key`
    pub async fn store(mut self, store: &dyn MemoryStore, key: &str) -> Result<(), MemoryError> {
        self.updated_at = chrono::Utc::now().timestamp_millis();
        let raw = serde_json::to_string(&self)?;
        store.set(key, raw).await
    }
}

/// Trait for pluggable memory storage backends
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Fetch the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, MemoryError>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: String) -> Result<(), MemoryError>;

    /// Remove `key`; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), MemoryError>;

    /// Get backend name for logging/debugging
    fn backend_name(&self) -> &'static str {
        "custom"
    }
}

/// In-memory backend (default, non-persistent)
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, MemoryError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), MemoryError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), MemoryError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }
}
