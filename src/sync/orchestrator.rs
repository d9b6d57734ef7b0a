//! # Command Sync Orchestrator
//!
//! Per-identity coordinator on top of a [`CommandQueueConsumer`]. Every
//! admitted command is persisted before it is enqueued, so a crash loses
//! nothing: [`CommandSyncOrchestrator::initialize`] reloads the records and
//! re-admits them. Patch commands for the same resource are consolidated
//! while still pending, so only the merged payload is ever executed.
//!
//! ## Command flow
//!
//! ```text
//! handle_command ──► consolidate? ──► persist ──► patch index + track ──► enqueue
//!                                                                          │
//!            re-save on retry ◄── status listener ◄───────────────── consumer
//!            depersist + untrack ◄── completion future resolves ◄───────┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::DomainCommand;
use crate::consolidation::PayloadConsolidator;
use crate::consumer::CommandQueueConsumer;
use crate::error::{CommandSyncError, CommandSyncResult};
use crate::logging::log_command_operation;
use crate::queue::{CommandStatus, ListenerId, QueueCommand, QueueCommandId};
use crate::store::{command_key, key_prefix, CommandStore, PersistedCommand};

/// Persistence and consolidation layer for one identity's command queue
///
/// Cheap to clone; clones share the same state. Mutating operations fail with
/// [`CommandSyncError::Uninitialized`] until `initialize` has completed.
#[derive(Clone)]
pub struct CommandSyncOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    id: String,
    consumer: CommandQueueConsumer,
    store: Arc<dyn CommandStore>,
    consolidator: Option<Arc<dyn PayloadConsolidator>>,
    initialized: AtomicBool,
    /// Serializes initialization, admission and disposal
    admission: tokio::sync::Mutex<()>,
    run_state: Mutex<RunState>,
    tracking: Mutex<Tracking>,
}

#[derive(Default)]
struct RunState {
    /// Dispatch is held stopped while a pending patch is replaced
    paused: bool,
    /// Restart the consumer when the pause ends
    resume: bool,
}

#[derive(Default)]
struct Tracking {
    tracked: HashMap<QueueCommandId, TrackedCommand>,
    /// resource id -> pending patch command eligible for consolidation
    patch_index: HashMap<String, QueueCommand>,
}

struct TrackedCommand {
    command: QueueCommand,
    cleanup: Option<JoinHandle<()>>,
}

/// Unregisters the retry listener when the cleanup task ends or is aborted
struct ListenerGuard {
    command: QueueCommand,
    id: ListenerId,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.command.remove_status_listener(self.id);
    }
}

impl CommandSyncOrchestrator {
    pub fn new(
        id: impl Into<String>,
        consumer: CommandQueueConsumer,
        store: Arc<dyn CommandStore>,
        consolidator: Option<Arc<dyn PayloadConsolidator>>,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                id: id.into(),
                consumer,
                store,
                consolidator,
                initialized: AtomicBool::new(false),
                admission: tokio::sync::Mutex::new(()),
                run_state: Mutex::new(RunState::default()),
                tracking: Mutex::new(Tracking::default()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn consumer(&self) -> &CommandQueueConsumer {
        &self.inner.consumer
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Restore persisted commands and re-admit them; no-op after the first success
    ///
    /// Records are re-admitted oldest first. Records that cannot be rebuilt
    /// are skipped and left in the store.
    pub async fn initialize(&self) -> CommandSyncResult<()> {
        let _admission = self.inner.admission.lock().await;
        if self.is_initialized() {
            return Ok(());
        }

        let prefix = key_prefix(&self.inner.id);
        let values = self.inner.store.load_by_key_prefix(&prefix).await?;

        let mut restored = Vec::with_capacity(values.len());
        for value in values {
            match PersistedCommand::from_value(value).and_then(|mut record| {
                if let Some(info) = record.queue_info.as_mut() {
                    info.status = CommandStatus::Initial;
                }
                record.into_queue_command()
            }) {
                Ok(queue_command) => restored.push(queue_command),
                Err(restore_error) => warn!(
                    orchestrator_id = %self.inner.id,
                    error = %restore_error,
                    "Skipping persisted command that could not be restored"
                ),
            }
        }

        restored.sort_by_key(|queue_command| {
            (
                queue_command.queue_info().date_created,
                queue_command.command().metadata.timestamp,
            )
        });

        let restored_count = restored.len();
        for queue_command in restored {
            if let Some(resource_id) = queue_command.command().patch_resource_id() {
                self.inner
                    .tracking
                    .lock()
                    .patch_index
                    .insert(resource_id.to_string(), queue_command.clone());
            }
            self.inner.track(&queue_command);
            self.inner.consumer.enqueue(queue_command)?;
        }

        self.inner.initialized.store(true, Ordering::Release);
        info!(
            orchestrator_id = %self.inner.id,
            restored = restored_count,
            "Command sync orchestrator initialized"
        );
        Ok(())
    }

    /// Admit a domain command: consolidate, persist, track and enqueue it
    ///
    /// Returns the queue command that will actually run, which for a
    /// consolidated patch carries the merged payload. Persistence and
    /// consolidation failures are returned and leave previously admitted
    /// commands exactly as they were.
    pub async fn handle_command(&self, command: DomainCommand) -> CommandSyncResult<QueueCommand> {
        self.ensure_initialized()?;
        let _admission = self.inner.admission.lock().await;

        let patch_resource = command.patch_resource_id().map(str::to_string);
        let queue_command = match patch_resource {
            Some(resource_id) => self.inner.admit_patch(&resource_id, command).await?,
            None => self.inner.admit(QueueCommand::new(command), None).await?,
        };

        log_command_operation(
            "enqueued",
            &self.inner.id,
            &queue_command.reference_id(),
            &queue_command.command().command_type,
            None,
        );
        Ok(queue_command)
    }

    /// Start dispatching; deferred until an in-progress consolidation finishes
    pub fn start(&self) -> CommandSyncResult<()> {
        self.ensure_initialized()?;
        let mut run = self.inner.run_state.lock();
        if run.paused {
            run.resume = true;
        } else {
            self.inner.consumer.start();
        }
        Ok(())
    }

    pub fn stop(&self) -> CommandSyncResult<()> {
        self.ensure_initialized()?;
        let mut run = self.inner.run_state.lock();
        run.resume = false;
        self.inner.consumer.stop();
        Ok(())
    }

    /// Stop dispatching and drop every tracked command from memory and storage
    ///
    /// Waits for any admission in progress, then for all depersist operations.
    /// Commands that were still pending complete with `false`.
    pub async fn dispose(&self) {
        let _admission = self.inner.admission.lock().await;
        {
            let mut run = self.inner.run_state.lock();
            run.resume = false;
            self.inner.consumer.stop();
        }

        let tracked: Vec<TrackedCommand> = {
            let mut tracking = self.inner.tracking.lock();
            tracking.patch_index.clear();
            tracking.tracked.drain().map(|(_, entry)| entry).collect()
        };

        let cleanups = tracked.into_iter().map(|TrackedCommand { command, cleanup }| {
            if let Some(handle) = cleanup {
                handle.abort();
            }
            if self.inner.consumer.remove(&command) {
                command.complete(false);
            }
            let inner = Arc::clone(&self.inner);
            async move { inner.depersist(&command).await }
        });
        let disposed = futures::future::join_all(cleanups).await.len();

        info!(
            orchestrator_id = %self.inner.id,
            disposed,
            "Command sync orchestrator disposed"
        );
    }

    pub fn tracked_len(&self) -> usize {
        self.inner.tracking.lock().tracked.len()
    }

    pub fn patch_index_len(&self) -> usize {
        self.inner.tracking.lock().patch_index.len()
    }

    /// Pending patch command currently registered for `resource_id`
    pub fn pending_patch(&self, resource_id: &str) -> Option<QueueCommand> {
        self.inner
            .tracking
            .lock()
            .patch_index
            .get(resource_id)
            .cloned()
    }

    fn ensure_initialized(&self) -> CommandSyncResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(CommandSyncError::Uninitialized {
                orchestrator_id: self.inner.id.clone(),
            })
        }
    }
}

impl OrchestratorInner {
    fn key_for(&self, queue_command: &QueueCommand) -> String {
        command_key(&self.id, &queue_command.reference_id())
    }

    /// Persist, register and enqueue a new queue command
    async fn admit(
        self: &Arc<Self>,
        queue_command: QueueCommand,
        patch_resource: Option<&str>,
    ) -> CommandSyncResult<QueueCommand> {
        self.persist(&queue_command).await?;

        if let Some(resource_id) = patch_resource {
            self.tracking
                .lock()
                .patch_index
                .insert(resource_id.to_string(), queue_command.clone());
        }
        self.track(&queue_command);

        if let Err(enqueue_error) = self.consumer.enqueue(queue_command.clone()) {
            self.release(&queue_command).await;
            return Err(enqueue_error);
        }
        Ok(queue_command)
    }

    /// Merge `command` into the pending patch for `resource_id`, if there is one
    async fn admit_patch(
        self: &Arc<Self>,
        resource_id: &str,
        command: DomainCommand,
    ) -> CommandSyncResult<QueueCommand> {
        let existing = self.tracking.lock().patch_index.get(resource_id).cloned();
        let (Some(existing), Some(consolidator)) = (existing, self.consolidator.clone()) else {
            return self.admit(QueueCommand::new(command), Some(resource_id)).await;
        };
        if existing.status() != CommandStatus::Initial {
            return self.admit(QueueCommand::new(command), Some(resource_id)).await;
        }

        self.pause_dispatch();
        let result = self
            .replace_pending(resource_id, &existing, consolidator.as_ref(), command)
            .await;
        self.resume_dispatch();
        result
    }

    /// Swap a pending patch for one carrying the merged payload
    ///
    /// The replacement is saved before the pending command is given up, and
    /// the pending command keeps its queue position unless every step succeeds.
    async fn replace_pending(
        self: &Arc<Self>,
        resource_id: &str,
        existing: &QueueCommand,
        consolidator: &dyn PayloadConsolidator,
        command: DomainCommand,
    ) -> CommandSyncResult<QueueCommand> {
        if !self.consumer.is_pending(existing) {
            debug!(
                orchestrator_id = %self.id,
                reference_id = %existing.reference_id(),
                "Pending patch already left the queue, admitting incoming command as-is"
            );
            return self.admit(QueueCommand::new(command), Some(resource_id)).await;
        }

        // Incoming payload first, pending payload second: pending fields win conflicts
        let merged = consolidator.consolidate(&command.payload, &existing.command().payload)?;
        let replacement = QueueCommand::new(command.with_payload(merged));
        self.persist(&replacement).await?;

        // No refresh writes for the superseded record once it is being removed
        if let Some(handle) = self.take_cleanup(existing) {
            handle.abort();
        }
        if let Err(depersist_error) = self.store.remove(&self.key_for(existing)).await {
            self.depersist(&replacement).await;
            self.attach_cleanup(existing);
            return Err(depersist_error);
        }

        self.consumer.remove(existing);
        self.untrack(existing);

        // Callers awaiting the superseded command observe the replacement's outcome
        let superseded = existing.clone();
        let outcome = replacement.await_completion();
        tokio::spawn(async move {
            superseded.complete(outcome.await);
        });

        self.tracking
            .lock()
            .patch_index
            .insert(resource_id.to_string(), replacement.clone());
        self.track(&replacement);
        if let Err(enqueue_error) = self.consumer.enqueue(replacement.clone()) {
            self.release(&replacement).await;
            return Err(enqueue_error);
        }

        log_command_operation(
            "consolidated",
            &self.id,
            &replacement.reference_id(),
            &replacement.command().command_type,
            Some(format!("superseded {}", existing.reference_id()).as_str()),
        );
        Ok(replacement)
    }

    /// Hold the consumer stopped; explicit start/stop calls are recorded for resume
    fn pause_dispatch(&self) {
        let mut run = self.run_state.lock();
        if !run.paused {
            run.paused = true;
            run.resume = self.consumer.is_running();
        }
        self.consumer.stop();
    }

    fn resume_dispatch(&self) {
        let mut run = self.run_state.lock();
        run.paused = false;
        if std::mem::take(&mut run.resume) {
            self.consumer.start();
        }
    }

    async fn persist(&self, queue_command: &QueueCommand) -> CommandSyncResult<()> {
        let key = self.key_for(queue_command);
        let value = PersistedCommand::from_queue_command(queue_command).to_value()?;
        self.store.save(&key, value).await
    }

    /// Remove the persisted record, logging failures
    async fn depersist(&self, queue_command: &QueueCommand) {
        let key = self.key_for(queue_command);
        if let Err(remove_error) = self.store.remove(&key).await {
            warn!(
                orchestrator_id = %self.id,
                key = %key,
                error = %remove_error,
                "Failed to remove persisted command"
            );
        }
    }

    /// Register the command and schedule its cleanup on completion
    fn track(self: &Arc<Self>, queue_command: &QueueCommand) {
        self.tracking.lock().tracked.insert(
            queue_command.id(),
            TrackedCommand {
                command: queue_command.clone(),
                cleanup: None,
            },
        );
        self.attach_cleanup(queue_command);
    }

    /// Spawn the task that re-saves the record after each retry and releases
    /// the command once its completion resolves
    fn attach_cleanup(self: &Arc<Self>, queue_command: &QueueCommand) {
        let (retried_tx, mut retried_rx) = mpsc::unbounded_channel();
        let listener = queue_command.add_status_listener(move |status| {
            if status == CommandStatus::Initial {
                let _ = retried_tx.send(());
            }
        });
        let listener = ListenerGuard {
            command: queue_command.clone(),
            id: listener,
        };

        let inner = Arc::clone(self);
        let completed = queue_command.clone();
        let handle = tokio::spawn(async move {
            let _listener = listener;
            let completion = completed.await_completion();
            tokio::pin!(completion);

            let success = loop {
                tokio::select! {
                    biased;
                    success = &mut completion => break success,
                    Some(()) = retried_rx.recv() => inner.refresh(&completed).await,
                }
            };

            inner.release(&completed).await;
            debug!(
                orchestrator_id = %inner.id,
                reference_id = %completed.reference_id(),
                success,
                "Released completed command"
            );
        });

        let mut tracking = self.tracking.lock();
        match tracking.tracked.get_mut(&queue_command.id()) {
            Some(entry) => entry.cleanup = Some(handle),
            // Untracked before the handle could be stored; nothing left to clean up
            None => handle.abort(),
        }
    }

    fn take_cleanup(&self, queue_command: &QueueCommand) -> Option<JoinHandle<()>> {
        self.tracking
            .lock()
            .tracked
            .get_mut(&queue_command.id())
            .and_then(|entry| entry.cleanup.take())
    }

    /// Re-save a tracked command so its attempt count survives a restart
    async fn refresh(&self, queue_command: &QueueCommand) {
        let tracked = self
            .tracking
            .lock()
            .tracked
            .contains_key(&queue_command.id());
        if !tracked {
            return;
        }
        if let Err(save_error) = self.persist(queue_command).await {
            warn!(
                orchestrator_id = %self.id,
                reference_id = %queue_command.reference_id(),
                error = %save_error,
                "Failed to refresh persisted command after retry"
            );
        }
    }

    /// Depersist and untrack
    async fn release(&self, queue_command: &QueueCommand) {
        self.depersist(queue_command).await;
        self.untrack(queue_command);
        log_command_operation(
            "released",
            &self.id,
            &queue_command.reference_id(),
            &queue_command.command().command_type,
            queue_command
                .completion_result()
                .map(|success| if success { "succeeded" } else { "failed" }),
        );
    }

    /// Drop the command from the tracked set and, if it is the registered entry, the patch index
    fn untrack(&self, queue_command: &QueueCommand) {
        let mut tracking = self.tracking.lock();
        if let Some(resource_id) = queue_command.command().patch_resource_id() {
            let registered = tracking
                .patch_index
                .get(resource_id)
                .is_some_and(|entry| entry.id() == queue_command.id());
            if registered {
                tracking.patch_index.remove(resource_id);
            }
        }
        tracking.tracked.remove(&queue_command.id());
    }
}
