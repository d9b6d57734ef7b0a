//! # Domain Commands
//!
//! The caller-defined unit of work carried through the queue. A domain command
//! knows nothing about queueing; it is a type tag, a JSON payload and the
//! metadata the orchestrator needs for persistence and consolidation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A unit of caller-defined work
///
/// # Examples
///
/// ```rust
/// use command_sync::command::{CommandMetadata, DomainCommand};
/// use serde_json::json;
///
/// let command = DomainCommand::new(
///     "update_profile",
///     json!({"display_name": "Ada"}),
///     CommandMetadata::for_resource("profile-7").patch(),
/// );
///
/// assert!(command.is_resource_patch());
/// assert!(command.reference_id().starts_with("profile-7"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainCommand {
    /// Type tag used by executors to route the command
    pub command_type: String,

    /// Command payload, normally a JSON object
    pub payload: Value,

    /// Identity and scoping metadata
    pub metadata: CommandMetadata,
}

/// Metadata attached to every domain command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// Resource the command acts on
    pub resource_id: Option<String>,

    /// Optional enclosing context (for example a parent collection)
    pub context_id: Option<String>,

    /// Unique id of this command instance
    pub uuid: Uuid,

    /// When the command was created by the caller
    pub timestamp: DateTime<Utc>,

    /// Partial update of `resource_id`; eligible for consolidation
    #[serde(default)]
    pub is_patch: bool,

    /// Payload holds sensitive data; persistence backends may encrypt it
    #[serde(default)]
    pub is_sensitive_data: bool,
}

impl CommandMetadata {
    /// Metadata for a command that is not scoped to any resource
    pub fn new() -> Self {
        Self {
            resource_id: None,
            context_id: None,
            uuid: Uuid::new_v4(),
            timestamp: Utc::now(),
            is_patch: false,
            is_sensitive_data: false,
        }
    }

    /// Metadata for a command acting on `resource_id`
    pub fn for_resource(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: Some(resource_id.into()),
            ..Self::new()
        }
    }

    pub fn with_context(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }

    /// Mark the command as a consolidatable partial update
    pub fn patch(mut self) -> Self {
        self.is_patch = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.is_sensitive_data = true;
        self
    }
}

impl Default for CommandMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainCommand {
    pub fn new(
        command_type: impl Into<String>,
        payload: Value,
        metadata: CommandMetadata,
    ) -> Self {
        Self {
            command_type: command_type.into(),
            payload,
            metadata,
        }
    }

    /// Persistence key suffix and consolidation key
    ///
    /// Concatenation of context id, resource id and uuid, with absent parts
    /// contributing an empty string.
    pub fn reference_id(&self) -> String {
        format!(
            "{}{}{}",
            self.metadata.context_id.as_deref().unwrap_or(""),
            self.metadata.resource_id.as_deref().unwrap_or(""),
            self.metadata.uuid
        )
    }

    /// Resource id when this command is a consolidatable patch
    pub fn patch_resource_id(&self) -> Option<&str> {
        if self.metadata.is_patch {
            self.metadata.resource_id.as_deref()
        } else {
            None
        }
    }

    pub fn is_resource_patch(&self) -> bool {
        self.patch_resource_id().is_some()
    }

    /// Same command identity carrying a different payload
    pub fn with_payload(&self, payload: Value) -> Self {
        Self {
            command_type: self.command_type.clone(),
            payload,
            metadata: self.metadata.clone(),
        }
    }
}
