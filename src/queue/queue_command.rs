use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::completion::CompletionSignal;
use super::status::{CommandStatus, QueueInfo};
use crate::command::DomainCommand;
use crate::error::{CommandSyncError, CommandSyncResult};

static NEXT_QUEUE_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a queue command
///
/// Used as the membership key in pending sets and orchestrator indexes so two
/// queue commands wrapping equal domain commands stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueCommandId(u64);

impl QueueCommandId {
    fn next() -> Self {
        Self(NEXT_QUEUE_COMMAND_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for QueueCommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "qc-{}", self.0)
    }
}

/// Handle returned by [`QueueCommand::add_status_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callback invoked synchronously on every status change
pub type StatusListener = Arc<dyn Fn(CommandStatus) + Send + Sync>;

/// Queue wrapper around one domain command
///
/// Cheap to clone; clones share the same queue info, listeners and completion
/// signal. Owned by the orchestrator that created it, with consumers holding
/// membership clones while the command is pending or processing.
#[derive(Clone)]
pub struct QueueCommand {
    inner: Arc<QueueCommandInner>,
}

struct QueueCommandInner {
    id: QueueCommandId,
    command: Arc<DomainCommand>,
    info: Mutex<QueueInfo>,
    listeners: Mutex<Vec<(ListenerId, StatusListener)>>,
    next_listener_id: AtomicU64,
    completion: CompletionSignal,
}

impl QueueCommand {
    /// Wrap a freshly admitted domain command
    pub fn new(command: DomainCommand) -> Self {
        Self::from_parts(Arc::new(command), QueueInfo::new())
    }

    /// Wrap a domain command with existing queue info (e.g. restored from storage)
    pub fn from_parts(command: Arc<DomainCommand>, info: QueueInfo) -> Self {
        Self {
            inner: Arc::new(QueueCommandInner {
                id: QueueCommandId::next(),
                command,
                info: Mutex::new(info),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                completion: CompletionSignal::new(),
            }),
        }
    }

    /// Build from possibly-absent parts, failing with `ArgumentRequired`
    pub fn try_from_parts(
        command: Option<DomainCommand>,
        info: Option<QueueInfo>,
    ) -> CommandSyncResult<Self> {
        let command = command.ok_or_else(|| CommandSyncError::argument_required("command"))?;
        let info = info.ok_or_else(|| CommandSyncError::argument_required("queue_info"))?;
        Ok(Self::from_parts(Arc::new(command), info))
    }

    pub fn id(&self) -> QueueCommandId {
        self.inner.id
    }

    pub fn command(&self) -> &Arc<DomainCommand> {
        &self.inner.command
    }

    pub fn reference_id(&self) -> String {
        self.inner.command.reference_id()
    }

    /// Snapshot of the queue info
    pub fn queue_info(&self) -> QueueInfo {
        self.inner.info.lock().clone()
    }

    pub fn status(&self) -> CommandStatus {
        self.inner.info.lock().status
    }

    pub fn attempt_no(&self) -> u32 {
        self.inner.info.lock().attempt_no
    }

    /// Mutate queue info under its lock
    pub(crate) fn with_info<R>(&self, f: impl FnOnce(&mut QueueInfo) -> R) -> R {
        let mut info = self.inner.info.lock();
        f(&mut info)
    }

    pub fn add_status_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(CommandStatus) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns `false` if it was not registered
    pub fn remove_status_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Invoke every registered listener with `status`
    ///
    /// Listeners run against a snapshot taken before the first call, so they
    /// may add or remove listeners without disturbing this notification.
    pub fn notify_status(&self, status: CommandStatus) {
        let snapshot: Vec<StatusListener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        trace!(
            queue_command = %self.inner.id,
            status = %status,
            listeners = snapshot.len(),
            "Notifying status listeners"
        );

        for listener in snapshot {
            listener(status);
        }
    }

    /// Future resolving once the command completes
    ///
    /// Every call observes the same one-shot result; callers arriving after
    /// completion get the stored value immediately.
    pub fn await_completion(&self) -> impl Future<Output = bool> + Send + 'static {
        self.inner.completion.wait()
    }

    /// Resolve the completion future; only the first call has an effect
    pub fn complete(&self, success: bool) -> bool {
        self.inner.completion.complete(success)
    }

    pub fn completion_result(&self) -> Option<bool> {
        self.inner.completion.result()
    }

    /// Whether both handles refer to the same queue command
    pub fn is_same(&self, other: &QueueCommand) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for QueueCommand {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for QueueCommand {}

impl fmt::Debug for QueueCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueCommand")
            .field("id", &self.inner.id)
            .field("command_type", &self.inner.command.command_type)
            .field("reference_id", &self.inner.command.reference_id())
            .field("info", &*self.inner.info.lock())
            .field("completion", &self.inner.completion.result())
            .finish()
    }
}
