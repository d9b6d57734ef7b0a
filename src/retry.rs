//! # Retry Policy
//!
//! A [`RetryPolicy`] composes zero or more [`RetryCondition`]s and answers
//! whether a failed command goes back to the pending set. Conditions are
//! OR-ed: one vote to retry is enough. A consumer without a policy never
//! retries.

use std::fmt;
use std::sync::Arc;

use crate::command::DomainCommand;
use crate::queue::QueueInfo;

/// Predicate deciding whether a failed command should run again
///
/// `info.attempt_no` already counts the failure being evaluated.
pub trait RetryCondition: Send + Sync {
    fn should_retry(&self, command: &DomainCommand, info: &QueueInfo) -> bool;

    /// Short description for logging
    fn description(&self) -> &'static str {
        "custom retry condition"
    }
}

/// Retry while fewer than `max_retries` attempts have failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptCountCondition {
    max_retries: u32,
}

impl AttemptCountCondition {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl RetryCondition for AttemptCountCondition {
    fn should_retry(&self, _command: &DomainCommand, info: &QueueInfo) -> bool {
        info.attempt_no < self.max_retries
    }

    fn description(&self) -> &'static str {
        "attempt count below maximum"
    }
}

/// Closure-backed retry condition, see [`condition_fn`]
pub struct FnCondition<F> {
    predicate: F,
}

impl<F> RetryCondition for FnCondition<F>
where
    F: Fn(&DomainCommand, &QueueInfo) -> bool + Send + Sync,
{
    fn should_retry(&self, command: &DomainCommand, info: &QueueInfo) -> bool {
        (self.predicate)(command, info)
    }
}

/// Adapt a closure into a [`RetryCondition`]
pub fn condition_fn<F>(predicate: F) -> FnCondition<F>
where
    F: Fn(&DomainCommand, &QueueInfo) -> bool + Send + Sync,
{
    FnCondition { predicate }
}

/// OR-composition of retry conditions
#[derive(Clone, Default)]
pub struct RetryPolicy {
    conditions: Vec<Arc<dyn RetryCondition>>,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy retrying up to `max_retries` failed attempts
    pub fn with_max_retries(max_retries: u32) -> Self {
        let mut policy = Self::new();
        policy.add_condition(AttemptCountCondition::new(max_retries));
        policy
    }

    pub fn add_condition<C>(&mut self, condition: C)
    where
        C: RetryCondition + 'static,
    {
        self.conditions.push(Arc::new(condition));
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    /// True iff any condition votes to retry; an empty policy never retries
    pub fn should_retry(&self, command: &DomainCommand, info: &QueueInfo) -> bool {
        self.conditions
            .iter()
            .any(|condition| condition.should_retry(command, info))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descriptions: Vec<&str> = self.conditions.iter().map(|c| c.description()).collect();
        f.debug_struct("RetryPolicy")
            .field("conditions", &descriptions)
            .finish()
    }
}
