//! Dispatch conditions gate the consumer loop on runtime state.
//!
//! A condition is a pure predicate over [`QueueState`]; it is evaluated under
//! the consumer lock on every state change and must not call back into the
//! consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::queue::QueueState;

/// Gating predicate; dispatch proceeds only while every condition holds
pub type DispatchCondition = Arc<dyn Fn(&QueueState) -> bool + Send + Sync>;

/// Cap the number of commands in `Processing` at once
pub fn max_in_flight(limit: usize) -> DispatchCondition {
    Arc::new(move |state: &QueueState| state.process_count < limit)
}

/// Shared on/off switch usable as a dispatch condition
///
/// Typical use is connectivity: flip it with [`ConditionFlag::set`] and then
/// call `notify_conditions_changed` on the consumer so a suspended loop
/// re-evaluates.
#[derive(Debug, Clone)]
pub struct ConditionFlag {
    value: Arc<AtomicBool>,
}

impl ConditionFlag {
    pub fn new(initial: bool) -> Self {
        Self {
            value: Arc::new(AtomicBool::new(initial)),
        }
    }

    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    pub fn as_condition(&self) -> DispatchCondition {
        let value = Arc::clone(&self.value);
        Arc::new(move |_: &QueueState| value.load(Ordering::Acquire))
    }
}
