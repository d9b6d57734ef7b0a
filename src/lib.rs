#![allow(clippy::doc_markdown)] // Allow technical terms like JSON, TOML in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Command Sync Core
//!
//! Asynchronous command-execution queue for clients that must keep working
//! while offline.
//!
//! ## Overview
//!
//! Work is expressed as [`DomainCommand`]s. A [`CommandQueueConsumer`] runs
//! them one dispatch at a time through a caller-supplied executor, gated by
//! dispatch conditions (an in-flight limit, a connectivity flag) and retried
//! according to a [`RetryPolicy`]. A [`CommandSyncOrchestrator`] sits in
//! front of the consumer for a single identity: it persists every admitted
//! command so a restart picks up where it left off, and folds repeated patch
//! commands for the same resource into one request.
//!
//! ## Module Organization
//!
//! - [`command`] - Domain commands and their metadata
//! - [`queue`] - Queue command wrapper, status and completion signal
//! - [`retry`] - Retry conditions and the retry policy evaluator
//! - [`consumer`] - Dispatch loop, dispatch conditions and the executor seam
//! - [`store`] - Persistence contract and in-memory backend
//! - [`consolidation`] - Payload merge strategies
//! - [`sync`] - Per-identity orchestrator and the orchestrator registry
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use command_sync::{
//!     executor_fn, CommandMetadata, CommandQueueConsumer, CommandSyncOrchestrator, DomainCommand,
//!     InMemoryCommandStore, JsonMergeConsolidator,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Arc::new(executor_fn(|command: Arc<DomainCommand>| async move {
//!     println!("syncing {}", command.reference_id());
//!     anyhow::Ok(true)
//! }));
//!
//! let orchestrator = CommandSyncOrchestrator::new(
//!     "user-42",
//!     CommandQueueConsumer::new("user-42-queue", executor),
//!     Arc::new(InMemoryCommandStore::new()),
//!     Some(Arc::new(JsonMergeConsolidator)),
//! );
//! orchestrator.initialize().await?;
//! orchestrator.start()?;
//!
//! let queued = orchestrator
//!     .handle_command(DomainCommand::new(
//!         "update_profile",
//!         json!({"display_name": "Ada"}),
//!         CommandMetadata::for_resource("profile-42").patch(),
//!     ))
//!     .await?;
//! assert!(queued.await_completion().await);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property tests
//! ```

pub mod command;
pub mod config;
pub mod consolidation;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod queue;
pub mod retry;
pub mod store;
pub mod sync;

pub use command::{CommandMetadata, DomainCommand};
pub use config::{CommandSyncConfig, LoggingConfig, QueueConfig};
pub use consolidation::{JsonMergeConsolidator, PayloadConsolidator};
pub use consumer::{
    executor_fn, max_in_flight, CommandExecutor, CommandQueueConsumer, ConditionFlag,
    DispatchCondition,
};
pub use error::{CommandSyncError, CommandSyncResult};
pub use queue::{CommandStatus, QueueCommand, QueueCommandId, QueueInfo, QueueState};
pub use retry::{condition_fn, AttemptCountCondition, RetryCondition, RetryPolicy};
pub use store::{CommandStore, InMemoryCommandStore, PersistedCommand};
pub use sync::{CommandSyncOrchestrator, CommandSyncRegistry};
