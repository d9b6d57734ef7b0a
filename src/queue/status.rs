use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a queued command
///
/// Allowed edges are `Initial -> Processing`, `Processing -> Complete` and
/// `Processing -> Initial` (retry). `Complete` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// Admitted and waiting for dispatch
    Initial,
    /// Handed to the executor, awaiting its completion report
    Processing,
    /// Finished, successfully or with retries exhausted
    Complete,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Processing)
    }

    /// Whether `self -> next` is one of the permitted lifecycle edges
    pub fn can_transition_to(&self, next: CommandStatus) -> bool {
        matches!(
            (self, next),
            (Self::Initial, Self::Processing)
                | (Self::Processing, Self::Complete)
                | (Self::Processing, Self::Initial)
        )
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Processing => write!(f, "processing"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

impl std::str::FromStr for CommandStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(Self::Initial),
            "processing" => Ok(Self::Processing),
            "complete" => Ok(Self::Complete),
            _ => Err(format!("Invalid command status: {s}")),
        }
    }
}

/// Queue bookkeeping attached to a domain command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueInfo {
    /// Failed execution cycles so far
    pub attempt_no: u32,

    /// When the command was admitted to the queue
    pub date_created: DateTime<Utc>,

    pub status: CommandStatus,
}

impl QueueInfo {
    pub fn new() -> Self {
        Self {
            attempt_no: 0,
            date_created: Utc::now(),
            status: CommandStatus::Initial,
        }
    }
}

impl Default for QueueInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer-wide state observed by dispatch conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    /// Number of owned commands currently `Processing`
    pub process_count: usize,
}
