use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use command_sync::{CommandStore, CommandSyncError, CommandSyncResult, InMemoryCommandStore};
use serde_json::Value;
use tokio::sync::Notify;

use super::within_timeout;

/// In-memory store whose writes can be made to fail or to block
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryCommandStore,
    fail_saves: AtomicBool,
    fail_removes: AtomicBool,
    failing_removes: AtomicUsize,
    hold_removes: AtomicBool,
    remove_held: Notify,
    remove_released: Notify,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every save and remove
    pub fn fail_writes(&self, fail: bool) {
        self.fail_saves(fail);
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Fail only the next `count` removes
    pub fn fail_next_removes(&self, count: usize) {
        self.failing_removes.store(count, Ordering::SeqCst);
    }

    /// Park the next remove until [`FlakyStore::release_removes`]
    pub fn hold_removes(&self) {
        self.hold_removes.store(true, Ordering::SeqCst);
    }

    pub fn release_removes(&self) {
        self.hold_removes.store(false, Ordering::SeqCst);
        self.remove_released.notify_one();
    }

    /// Wait until a remove is parked
    pub async fn wait_for_held_remove(&self) {
        within_timeout(self.remove_held.notified()).await;
    }

    fn remove_should_fail(&self) -> bool {
        self.fail_removes.load(Ordering::SeqCst)
            || self
                .failing_removes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
    }
}

#[async_trait]
impl CommandStore for FlakyStore {
    async fn save(&self, key: &str, value: Value) -> CommandSyncResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CommandSyncError::persistence("save", key, "disk full"));
        }
        self.inner.save(key, value).await
    }

    async fn remove(&self, key: &str) -> CommandSyncResult<()> {
        if self.hold_removes.swap(false, Ordering::SeqCst) {
            self.remove_held.notify_one();
            self.remove_released.notified().await;
        }
        if self.remove_should_fail() {
            return Err(CommandSyncError::persistence("remove", key, "disk full"));
        }
        self.inner.remove(key).await
    }

    async fn load(&self, key: &str) -> CommandSyncResult<Option<Value>> {
        self.inner.load(key).await
    }

    async fn load_by_key_prefix(&self, prefix: &str) -> CommandSyncResult<Vec<Value>> {
        self.inner.load_by_key_prefix(prefix).await
    }
}
