//! # Command Persistence
//!
//! Contract for the key-value backend that keeps pending commands across
//! restarts, the record shape written through it, and an in-memory backend.
//! Keys are `"{orchestrator_id}-{reference_id}"`; values are JSON documents.
//! Encryption of sensitive payloads belongs in a backend decorator, keyed off
//! `metadata.is_sensitive_data`.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::DomainCommand;
use crate::error::CommandSyncResult;
use crate::queue::{QueueCommand, QueueInfo};

/// Asynchronous key-value persistence backend
#[async_trait]
pub trait CommandStore: Send + Sync + 'static {
    async fn save(&self, key: &str, value: Value) -> CommandSyncResult<()>;

    async fn remove(&self, key: &str) -> CommandSyncResult<()>;

    async fn load(&self, key: &str) -> CommandSyncResult<Option<Value>>;

    /// Every value whose key starts with `prefix`, in no particular order
    async fn load_by_key_prefix(&self, prefix: &str) -> CommandSyncResult<Vec<Value>>;
}

/// Persistence key for a command owned by `orchestrator_id`
pub fn command_key(orchestrator_id: &str, reference_id: &str) -> String {
    format!("{}{reference_id}", key_prefix(orchestrator_id))
}

/// Prefix shared by every key owned by `orchestrator_id`
pub fn key_prefix(orchestrator_id: &str) -> String {
    format!("{orchestrator_id}-")
}

/// Queue-command-shaped record written to the store
///
/// Both parts are optional on the way in so that damaged records surface as
/// `ArgumentRequired` during reconstruction instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedCommand {
    #[serde(default)]
    pub command: Option<DomainCommand>,
    #[serde(default)]
    pub queue_info: Option<QueueInfo>,
}

impl PersistedCommand {
    pub fn from_queue_command(queue_command: &QueueCommand) -> Self {
        Self {
            command: Some(queue_command.command().as_ref().clone()),
            queue_info: Some(queue_command.queue_info()),
        }
    }

    pub fn to_value(&self) -> CommandSyncResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: Value) -> CommandSyncResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Rebuild a queue command from this record
    pub fn into_queue_command(self) -> CommandSyncResult<QueueCommand> {
        QueueCommand::try_from_parts(self.command, self.queue_info)
    }
}

/// Process-local store backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryCommandStore {
    entries: DashMap<String, Value>,
}

impl InMemoryCommandStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CommandStore for InMemoryCommandStore {
    async fn save(&self, key: &str, value: Value) -> CommandSyncResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> CommandSyncResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn load(&self, key: &str) -> CommandSyncResult<Option<Value>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn load_by_key_prefix(&self, prefix: &str) -> CommandSyncResult<Vec<Value>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.value().clone())
            .collect())
    }
}
