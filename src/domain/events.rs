//! Event types for the per-run log.
//!
//! Every record the bot touches leaves at least one event behind, so a run
//! can be audited (and a crashed run picked up with `--resume`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single line in a run's `events.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The run this event belongs to
    pub run_id: Uuid,

    /// Media id of the file (`M<pageid>`), for per-record events
    pub mid: Option<String>,

    pub event_type: RunEventType,

    /// `{mid}:{plan_hash}` for edits, `{run_id}:...` for run and skip events
    pub idempotency_key: String,

    /// Human-readable summary
    pub summary: String,

    /// Error message if something failed
    pub error: Option<String>,
}

impl RunEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        run_id: Uuid,
        mid: Option<String>,
        event_type: RunEventType,
        idempotency_key: String,
        summary: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            run_id,
            mid,
            event_type,
            idempotency_key,
            summary,
            error: None,
        }
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventType {
    RunStarted,

    /// Record not reconciled (wrong categories, conflict, upstream failure)
    RecordSkipped,

    /// Plan computed; nothing submitted (dry run, or nothing to do)
    RecordPlanned,

    EditSubmitted,

    EditFailed,

    RunCompleted,

    /// Stopped early on an unrecoverable write failure
    RunAborted,
}
