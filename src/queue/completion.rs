//! One-shot, idempotent completion signal.
//!
//! Backed by a `tokio::sync::watch` channel holding `Option<bool>`: the first
//! `complete` stores the result and wakes every waiter, later calls are
//! ignored, and waiters arriving after completion read the stored value.

use std::future::Future;

use tokio::sync::watch;

#[derive(Debug)]
pub struct CompletionSignal {
    sender: watch::Sender<Option<bool>>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    /// Resolve with `success`; returns `false` if already resolved
    pub fn complete(&self, success: bool) -> bool {
        self.sender.send_if_modified(|result| {
            if result.is_some() {
                return false;
            }
            *result = Some(success);
            true
        })
    }

    pub fn result(&self) -> Option<bool> {
        *self.sender.borrow()
    }

    pub fn is_complete(&self) -> bool {
        self.result().is_some()
    }

    /// Future resolving to the completion result
    ///
    /// The receiver is created eagerly so the returned future does not borrow
    /// `self`. If the signal is dropped unresolved the future yields `false`.
    pub fn wait(&self) -> impl Future<Output = bool> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async move {
            match receiver.wait_for(Option::is_some).await {
                Ok(result) => {
                    let value = *result;
                    value.unwrap_or(false)
                }
                Err(_) => false,
            }
        }
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}
