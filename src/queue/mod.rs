//! # Queue Commands
//!
//! Queue-side wrapper around domain commands: lifecycle status, attempt
//! bookkeeping, status observers and the one-shot completion signal.

pub mod completion;
pub mod queue_command;
pub mod status;

pub use completion::CompletionSignal;
pub use queue_command::{ListenerId, QueueCommand, QueueCommandId, StatusListener};
pub use status::{CommandStatus, QueueInfo, QueueState};
