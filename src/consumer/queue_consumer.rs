//! # Command Queue Consumer
//!
//! Cooperative scheduler for queue commands. One dispatch loop per consumer
//! pulls the oldest pending command whenever every dispatch condition holds,
//! hands it to the executor without waiting for the result, and goes straight
//! back to checking conditions. Completion reports (from the executor's future
//! or from [`CommandQueueConsumer::completed_command_execution`]) either finish
//! the command or, via the retry policy, put it back in the pending set.
//!
//! ## Wake protocol
//!
//! ```text
//! loop ──► lock ──► running? ──no──► exit
//!                     │
//!                     ├─ pending empty / condition false ──► register waiter ──► await ──┐
//!                     │                                                                  │
//!                     └─ dispatch head ──► spawn execution ──► yield ────────────────────┤
//!                                                                                        │
//! enqueue / completion / notify_conditions_changed ──► lock ──► wake waiter ─────────────┘
//! ```
//!
//! The condition check and waiter registration happen under the same lock as
//! every wake trigger, so a wakeup can never be missed.

use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::conditions::{max_in_flight, DispatchCondition};
use super::executor::CommandExecutor;
use crate::config::QueueConfig;
use crate::error::{CommandSyncError, CommandSyncResult};
use crate::queue::{CommandStatus, QueueCommand, QueueCommandId, QueueInfo, QueueState};
use crate::retry::RetryPolicy;

/// Scheduler holding pending commands and driving the dispatch loop
///
/// Cheap to clone; clones share one queue. `start` must be called from
/// within a Tokio runtime.
#[derive(Clone)]
pub struct CommandQueueConsumer {
    inner: Arc<ConsumerInner>,
}

struct ConsumerInner {
    name: String,
    executor: Arc<dyn CommandExecutor>,
    conditions: Vec<DispatchCondition>,
    retry_policy: Option<RetryPolicy>,
    state: Mutex<ConsumerState>,
}

#[derive(Default)]
struct ConsumerState {
    /// Admission-ordered ready queue
    pending: VecDeque<QueueCommand>,
    /// Membership index for `pending`
    pending_ids: HashSet<QueueCommandId>,
    /// Commands dispatched by this consumer and not yet reported
    in_flight: HashSet<QueueCommandId>,
    queue_state: QueueState,
    running: bool,
    /// A dispatch loop task exists (it may be suspended)
    loop_active: bool,
    /// Single-slot wait handle of the suspended loop
    waiter: Option<oneshot::Sender<()>>,
}

enum LoopStep {
    Exit,
    Wait(oneshot::Receiver<()>),
    Dispatch(QueueCommand, u32),
}

/// Builder for [`CommandQueueConsumer`]
pub struct CommandQueueConsumerBuilder {
    name: String,
    executor: Arc<dyn CommandExecutor>,
    conditions: Vec<DispatchCondition>,
    retry_policy: Option<RetryPolicy>,
}

impl CommandQueueConsumerBuilder {
    pub fn with_condition(mut self, condition: DispatchCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn build(self) -> CommandQueueConsumer {
        CommandQueueConsumer {
            inner: Arc::new(ConsumerInner {
                name: self.name,
                executor: self.executor,
                conditions: self.conditions,
                retry_policy: self.retry_policy,
                state: Mutex::new(ConsumerState::default()),
            }),
        }
    }
}

impl CommandQueueConsumer {
    pub fn builder(
        name: impl Into<String>,
        executor: Arc<dyn CommandExecutor>,
    ) -> CommandQueueConsumerBuilder {
        CommandQueueConsumerBuilder {
            name: name.into(),
            executor,
            conditions: Vec::new(),
            retry_policy: None,
        }
    }

    /// Consumer without dispatch conditions or retries
    pub fn new(name: impl Into<String>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self::builder(name, executor).build()
    }

    /// Consumer gated and retried according to `config`
    pub fn from_config(
        name: impl Into<String>,
        executor: Arc<dyn CommandExecutor>,
        config: &QueueConfig,
    ) -> Self {
        let mut builder = Self::builder(name, executor);
        if let Some(limit) = config.max_in_flight {
            builder = builder.with_condition(max_in_flight(limit));
        }
        if let Some(max_retries) = config.max_retries {
            builder = builder.with_retry_policy(RetryPolicy::with_max_retries(max_retries));
        }
        builder.build()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Admit a command to the pending set and try to wake the loop
    ///
    /// Only `Initial` commands are accepted. Enqueueing a command that is
    /// already pending leaves its position unchanged.
    pub fn enqueue(&self, queue_command: QueueCommand) -> CommandSyncResult<()> {
        let status = queue_command.status();
        if status != CommandStatus::Initial {
            return Err(CommandSyncError::InvalidState(format!(
                "cannot enqueue {} in status {status}",
                queue_command.id()
            )));
        }

        let mut state = self.inner.state.lock();
        if state.pending_ids.insert(queue_command.id()) {
            debug!(
                queue = %self.inner.name,
                queue_command = %queue_command.id(),
                command_type = %queue_command.command().command_type,
                pending = state.pending.len() + 1,
                "Command enqueued"
            );
            state.pending.push_back(queue_command);
        } else {
            debug!(
                queue = %self.inner.name,
                queue_command = %queue_command.id(),
                "Command already pending"
            );
        }
        self.inner.try_wake(&mut state);
        Ok(())
    }

    /// Drop a command from the pending set; in-flight work is unaffected
    ///
    /// Returns `true` if the command was pending.
    pub fn remove(&self, queue_command: &QueueCommand) -> bool {
        let mut state = self.inner.state.lock();
        let removed = state.pending_ids.remove(&queue_command.id());
        if removed {
            let id = queue_command.id();
            state.pending.retain(|pending| pending.id() != id);
            debug!(
                queue = %self.inner.name,
                queue_command = %id,
                "Command removed from pending set"
            );
        }
        removed
    }

    /// Begin dispatching; a second call while running only re-checks the wake condition
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        if state.running {
            self.inner.try_wake(&mut state);
            return;
        }

        state.running = true;
        info!(
            queue = %self.inner.name,
            pending = state.pending.len(),
            "Command queue consumer started"
        );

        if state.loop_active {
            // Previous loop has not observed the stop yet; it will keep going
            self.inner.try_wake(&mut state);
        } else {
            state.loop_active = true;
            tokio::spawn(run_dispatch_loop(Arc::clone(&self.inner)));
        }
    }

    /// Halt future dispatch; already dispatched commands keep running
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if !state.running {
            return;
        }
        state.running = false;
        if let Some(waiter) = state.waiter.take() {
            let _ = waiter.send(());
        }
        info!(
            queue = %self.inner.name,
            in_flight = state.queue_state.process_count,
            "Command queue consumer stopped"
        );
    }

    /// Re-evaluate dispatch conditions after an external change
    pub fn notify_conditions_changed(&self) {
        let mut state = self.inner.state.lock();
        self.inner.try_wake(&mut state);
    }

    /// Report the outcome of a dispatched command
    ///
    /// Reports for commands that are not in flight on this consumer are
    /// ignored, so duplicate reports cannot skew `process_count`.
    pub fn completed_command_execution(&self, queue_command: &QueueCommand, success: bool) {
        self.inner.finish_attempt(queue_command, None, success);
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    pub fn queue_state(&self) -> QueueState {
        self.inner.state.lock().queue_state
    }

    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn is_pending(&self, queue_command: &QueueCommand) -> bool {
        self.inner
            .state
            .lock()
            .pending_ids
            .contains(&queue_command.id())
    }
}

impl ConsumerInner {
    fn conditions_allow(&self, queue_state: &QueueState) -> bool {
        self.conditions.iter().all(|condition| condition(queue_state))
    }

    /// Wake the suspended loop iff it could dispatch right now
    fn try_wake(&self, state: &mut ConsumerState) -> bool {
        if !state.running
            || state.pending.is_empty()
            || state.waiter.is_none()
            || !self.conditions_allow(&state.queue_state)
        {
            return false;
        }
        match state.waiter.take() {
            Some(waiter) => waiter.send(()).is_ok(),
            None => false,
        }
    }

    fn next_step(&self) -> LoopStep {
        let mut state = self.state.lock();
        if !state.running {
            state.loop_active = false;
            return LoopStep::Exit;
        }

        if self.conditions_allow(&state.queue_state) {
            if let Some(queue_command) = state.pending.pop_front() {
                state.pending_ids.remove(&queue_command.id());
                let attempt_no = queue_command.with_info(|info| {
                    info.status = CommandStatus::Processing;
                    info.attempt_no
                });
                state.in_flight.insert(queue_command.id());
                state.queue_state.process_count += 1;
                return LoopStep::Dispatch(queue_command, attempt_no);
            }
        }

        let (sender, receiver) = oneshot::channel();
        state.waiter = Some(sender);
        LoopStep::Wait(receiver)
    }

    /// Run the executor for one attempt without blocking the loop
    fn spawn_execution(self: &Arc<Self>, queue_command: QueueCommand, attempt_no: u32) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let command = Arc::clone(queue_command.command());
            let outcome = AssertUnwindSafe(inner.executor.execute(command))
                .catch_unwind()
                .await;

            let success = match outcome {
                Ok(Ok(success)) => success,
                Ok(Err(execution_error)) => {
                    warn!(
                        queue = %inner.name,
                        queue_command = %queue_command.id(),
                        attempt_no,
                        error = %execution_error,
                        "Command execution failed"
                    );
                    false
                }
                Err(_) => {
                    error!(
                        queue = %inner.name,
                        queue_command = %queue_command.id(),
                        attempt_no,
                        "Command executor panicked"
                    );
                    false
                }
            };

            inner.finish_attempt(&queue_command, Some(attempt_no), success);
        });
    }

    /// Apply a completion report; failures go through the retry handler
    fn finish_attempt(&self, queue_command: &QueueCommand, expected_attempt: Option<u32>, success: bool) {
        let snapshot = queue_command.queue_info();
        if snapshot.status != CommandStatus::Processing
            || expected_attempt.is_some_and(|attempt| attempt != snapshot.attempt_no)
        {
            debug!(
                queue = %self.name,
                queue_command = %queue_command.id(),
                status = %snapshot.status,
                "Ignoring completion report for command not in flight"
            );
            return;
        }

        // Evaluated outside the consumer lock; conditions are caller code
        let retry = !success && {
            let failed = QueueInfo {
                attempt_no: snapshot.attempt_no + 1,
                ..snapshot.clone()
            };
            self.retry_policy
                .as_ref()
                .is_some_and(|policy| policy.should_retry(queue_command.command(), &failed))
        };

        let new_status = {
            let mut state = self.state.lock();
            if !state.in_flight.contains(&queue_command.id()) {
                return;
            }

            let applied = queue_command.with_info(|info| {
                if info.status != CommandStatus::Processing
                    || info.attempt_no != snapshot.attempt_no
                {
                    return None;
                }
                if !success {
                    info.attempt_no += 1;
                }
                info.status = if retry {
                    CommandStatus::Initial
                } else {
                    CommandStatus::Complete
                };
                Some((info.status, info.attempt_no))
            });
            let Some((new_status, attempt_no)) = applied else {
                return;
            };

            state.in_flight.remove(&queue_command.id());
            state.queue_state.process_count = state.queue_state.process_count.saturating_sub(1);

            if new_status == CommandStatus::Initial
                && state.pending_ids.insert(queue_command.id())
            {
                state.pending.push_back(queue_command.clone());
            }

            debug!(
                queue = %self.name,
                queue_command = %queue_command.id(),
                success,
                retry,
                attempt_no,
                process_count = state.queue_state.process_count,
                "Command execution reported"
            );

            self.try_wake(&mut state);
            new_status
        };

        queue_command.notify_status(new_status);
        if new_status == CommandStatus::Complete {
            queue_command.complete(success);
        }
    }
}

async fn run_dispatch_loop(inner: Arc<ConsumerInner>) {
    debug!(queue = %inner.name, "Dispatch loop started");
    loop {
        match inner.next_step() {
            LoopStep::Exit => break,
            LoopStep::Wait(receiver) => {
                // Either a wake or a stop; both are re-checked at the top
                let _ = receiver.await;
            }
            LoopStep::Dispatch(queue_command, attempt_no) => {
                debug!(
                    queue = %inner.name,
                    queue_command = %queue_command.id(),
                    command_type = %queue_command.command().command_type,
                    attempt_no,
                    "Dispatching command"
                );
                queue_command.notify_status(CommandStatus::Processing);
                inner.spawn_execution(queue_command, attempt_no);
                tokio::task::yield_now().await;
            }
        }
    }
    debug!(queue = %inner.name, "Dispatch loop exited");
}
