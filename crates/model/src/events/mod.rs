use crate::core::identifiers::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A trait for events that can be published on the progress bus.
pub trait Event: Send + Sync + Debug + 'static {
    /// Returns a unique identifier for this event type.
    fn event_type(&self) -> &'static str;
}

/// Pipeline phase an object is passing through, as published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationPhase {
    Fetch,
    Translate,
    Review,
    Deploy,
    Repair,
    Done,
    Failed,
    Skipped,
}

impl MigrationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationPhase::Fetch => "fetch",
            MigrationPhase::Translate => "translate",
            MigrationPhase::Review => "review",
            MigrationPhase::Deploy => "deploy",
            MigrationPhase::Repair => "repair",
            MigrationPhase::Done => "done",
            MigrationPhase::Failed => "failed",
            MigrationPhase::Skipped => "skipped",
        }
    }
}

/// Emitted whenever an object enters or leaves a pipeline phase.
#[derive(Debug, Clone)]
pub struct ObjectProgress {
    pub run_id: String,
    pub object: ObjectId,
    pub phase: MigrationPhase,
    pub detail: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Event for ObjectProgress {
    fn event_type(&self) -> &'static str {
        "object.progress"
    }
}

/// Emitted once when the run starts.
#[derive(Debug, Clone)]
pub struct RunStarted {
    pub run_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Event for RunStarted {
    fn event_type(&self) -> &'static str {
        "run.started"
    }
}

/// Emitted once when the run completes, successfully or not.
#[derive(Debug, Clone)]
pub struct RunCompleted {
    pub run_id: String,
    pub deployed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Event for RunCompleted {
    fn event_type(&self) -> &'static str {
        "run.completed"
    }
}
