//! Command definitions
//!
//! Commands represent intentions to change the system state, decoupled
//! from the HTTP request shapes that produce them.

use uuid::Uuid;

use crate::ingestion::NewEventCandidate;

/// Command to sync a batch of events from one device.
#[derive(Debug, Clone)]
pub struct SyncCommand {
    pub device_id: Uuid,
    pub user_id: Uuid,
    pub events: Vec<NewEventCandidate>,
}

/// Result of a sync call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AckCursor {
    pub device_id: Uuid,
    pub last_acked_sequence: Option<i64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncResult {
    pub ack_cursor: AckCursor,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub rejected_event_ids: Vec<Uuid>,
}

/// Command to merge an anonymous user's data into a registered user.
#[derive(Debug, Clone)]
pub struct MergeCommand {
    pub anonymous_user_id: Uuid,
}
