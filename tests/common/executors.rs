use std::sync::Arc;

use async_trait::async_trait;
use command_sync::{CommandExecutor, DomainCommand};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use super::eventually;

/// Executor whose outcomes are decided by the test
///
/// In manual mode every call parks until [`ControlledExecutor::finish`] is
/// called with its index. In scripted mode call `n` returns `outcomes[n]`,
/// and `true` once the script runs out.
pub struct ControlledExecutor {
    calls: Mutex<Vec<Call>>,
    outcomes: Option<Vec<bool>>,
}

struct Call {
    command: Arc<DomainCommand>,
    gate: Option<oneshot::Sender<bool>>,
}

impl ControlledExecutor {
    pub fn manual() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            outcomes: None,
        })
    }

    pub fn scripted(outcomes: Vec<bool>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            outcomes: Some(outcomes),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::scripted(Vec::new())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn call(&self, index: usize) -> Arc<DomainCommand> {
        Arc::clone(&self.calls.lock()[index].command)
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .map(|call| call.command.payload.clone())
            .collect()
    }

    /// `payload["label"]` of every call, in call order
    pub fn labels(&self) -> Vec<String> {
        self.payloads()
            .iter()
            .map(|payload| payload["label"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub async fn wait_for_calls(&self, count: usize) {
        eventually(|| self.call_count() >= count).await;
    }

    /// Resolve a parked manual call
    pub fn finish(&self, index: usize, success: bool) {
        let gate = self.calls.lock()[index]
            .gate
            .take()
            .expect("call already finished");
        gate.send(success).expect("executor call was dropped");
    }
}

#[async_trait]
impl CommandExecutor for ControlledExecutor {
    async fn execute(&self, command: Arc<DomainCommand>) -> anyhow::Result<bool> {
        let receiver = {
            let mut calls = self.calls.lock();
            let index = calls.len();
            if let Some(outcomes) = &self.outcomes {
                calls.push(Call {
                    command,
                    gate: None,
                });
                return Ok(outcomes.get(index).copied().unwrap_or(true));
            }
            let (sender, receiver) = oneshot::channel();
            calls.push(Call {
                command,
                gate: Some(sender),
            });
            receiver
        };
        Ok(receiver.await.unwrap_or(false))
    }
}
