#![allow(dead_code)]

pub mod executors;
pub mod stores;
pub mod strategies;

pub use executors::*;
pub use stores::*;

use std::future::Future;
use std::time::Duration;

use command_sync::{CommandMetadata, DomainCommand, QueueCommand};
use serde_json::json;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Plain command tagged with `label` in its payload
pub fn labeled_command(label: &str) -> DomainCommand {
    DomainCommand::new("test", json!({ "label": label }), CommandMetadata::new())
}

pub fn labeled_queue_command(label: &str) -> QueueCommand {
    QueueCommand::new(labeled_command(label))
}

/// Patch command for `resource_id` carrying `payload`
pub fn patch_command(resource_id: &str, payload: serde_json::Value) -> DomainCommand {
    DomainCommand::new(
        "patch_resource",
        payload,
        CommandMetadata::for_resource(resource_id).patch(),
    )
}

/// Await `future`, failing the test if it takes longer than [`TEST_TIMEOUT`]
pub async fn within_timeout<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(TEST_TIMEOUT, future)
        .await
        .expect("operation timed out")
}

/// Poll `predicate` until it holds or [`TEST_TIMEOUT`] elapses
pub async fn eventually<P: FnMut() -> bool>(mut predicate: P) {
    within_timeout(async {
        while !predicate() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
}

/// Give spawned tasks a chance to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
