//! # Command Sync
//!
//! Durable, consolidating front end over the command queue consumer.

pub mod orchestrator;
pub mod registry;

pub use orchestrator::CommandSyncOrchestrator;
pub use registry::CommandSyncRegistry;
