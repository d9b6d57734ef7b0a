//! # Command Queue Consumer
//!
//! The scheduler half of the crate: pending set, dispatch conditions, the
//! executor seam and the retry handler.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use command_sync::command::{CommandMetadata, DomainCommand};
//! use command_sync::consumer::{executor_fn, max_in_flight, CommandQueueConsumer};
//! use command_sync::queue::QueueCommand;
//! use command_sync::retry::RetryPolicy;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Arc::new(executor_fn(|command: Arc<DomainCommand>| async move {
//!     println!("sending {}", command.command_type);
//!     anyhow::Ok(true)
//! }));
//!
//! let consumer = CommandQueueConsumer::builder("profile-sync", executor)
//!     .with_condition(max_in_flight(2))
//!     .with_retry_policy(RetryPolicy::with_max_retries(3))
//!     .build();
//! consumer.start();
//!
//! let command = QueueCommand::new(DomainCommand::new(
//!     "update_profile",
//!     json!({"display_name": "Ada"}),
//!     CommandMetadata::for_resource("profile-7"),
//! ));
//! consumer.enqueue(command.clone())?;
//! assert!(command.await_completion().await);
//! # Ok(())
//! # }
//! ```

pub mod conditions;
pub mod executor;
pub mod queue_consumer;

pub use conditions::{max_in_flight, ConditionFlag, DispatchCondition};
pub use executor::{executor_fn, CommandExecutor, FnExecutor};
pub use queue_consumer::{CommandQueueConsumer, CommandQueueConsumerBuilder};
