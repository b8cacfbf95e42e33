//! Ingestion Service
//!
//! Batched idempotent sync: validates a batch's shape, dedupes against the
//! log via a single existence probe, persists newly staged events
//! atomically (falling back to per-event insertion if a concurrent writer
//! raced us), and hands the freshly accepted events to the Projection
//! Updater scoped to the caller's user.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{validate_event_payload, DomainError, ValidatedEvent};
use crate::event_store::{EventStore, EventStoreError, NewEventRow};
use crate::projection::ProjectionUpdater;

/// One candidate event as received from the wire, before validation.
#[derive(Debug, Clone)]
pub struct NewEventCandidate {
    pub event_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub sequence_number: i64,
}

/// Outcome of a sync call.
#[derive(Debug, Clone)]
pub struct IngestionOutcome {
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub rejected_event_ids: Vec<Uuid>,
    pub last_acked_sequence: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),
}

#[derive(Debug, Clone)]
pub struct IngestionService {
    event_store: EventStore,
    updater: ProjectionUpdater,
}

impl IngestionService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            updater: ProjectionUpdater::new(pool),
        }
    }

    pub async fn ingest(
        &self,
        device_id: Uuid,
        user_id: Uuid,
        batch: Vec<NewEventCandidate>,
        correlation_id: Option<Uuid>,
    ) -> Result<IngestionOutcome, IngestionError> {
        // Step 1: batch-shape validation. A malformed batch is rejected in
        // full — every event_id in the batch goes into rejected_event_ids,
        // not just the offending pair — so the caller can see exactly what
        // it needs to resend.
        let shape_valid = !batch.is_empty()
            && batch
                .windows(2)
                .all(|pair| pair[1].sequence_number > pair[0].sequence_number);
        if !shape_valid {
            let rejected_event_ids: Vec<Uuid> = batch.iter().map(|c| c.event_id).collect();
            return Ok(IngestionOutcome {
                accepted_count: 0,
                rejected_count: rejected_event_ids.len(),
                rejected_event_ids,
                last_acked_sequence: None,
            });
        }

        // Step 2: existence probe, single query.
        let event_ids: Vec<Uuid> = batch.iter().map(|c| c.event_id).collect();
        let present = self.event_store.exists(&event_ids).await?;

        // Step 3: per-event classification.
        let mut rejected_event_ids: Vec<Uuid> = Vec::new();
        let mut accepted_sequences: Vec<i64> = Vec::new();
        let mut staged: Vec<(NewEventCandidate, ValidatedEvent)> = Vec::new();

        for candidate in batch {
            match validate_event_payload(&candidate.event_type, &candidate.payload) {
                Err(_) => rejected_event_ids.push(candidate.event_id),
                Ok(validated) => {
                    if present.contains(&candidate.event_id) {
                        accepted_sequences.push(candidate.sequence_number);
                    } else {
                        staged.push((candidate, validated));
                    }
                }
            }
        }

        // Step 4: atomic insert, with per-event fallback on a race.
        let mut newly_inserted: Vec<ValidatedEvent> = Vec::new();

        if !staged.is_empty() {
            let rows: Vec<NewEventRow> = staged
                .iter()
                .map(|(c, _)| NewEventRow {
                    event_id: c.event_id,
                    event_type: c.event_type.clone(),
                    payload: c.payload.clone(),
                    sequence_number: c.sequence_number,
                    correlation_id,
                })
                .collect();

            match self.event_store.append_batch(device_id, user_id, &rows).await {
                Ok(()) => {
                    for (candidate, validated) in staged {
                        accepted_sequences.push(candidate.sequence_number);
                        newly_inserted.push(validated);
                    }
                }
                Err(e) if e.is_unique_violation() => {
                    for ((candidate, validated), row) in staged.into_iter().zip(rows) {
                        match self.event_store.append_one(device_id, user_id, &row).await {
                            Ok(()) => {
                                accepted_sequences.push(candidate.sequence_number);
                                newly_inserted.push(validated);
                            }
                            Err(inner) if inner.is_unique_violation() => {
                                accepted_sequences.push(candidate.sequence_number);
                            }
                            Err(_) => rejected_event_ids.push(candidate.event_id),
                        }
                    }
                }
                Err(_) => {
                    for (candidate, _) in staged {
                        rejected_event_ids.push(candidate.event_id);
                    }
                }
            }
        }

        let accepted_count = accepted_sequences.len();

        // Step 5: projection handoff. Failure here does not fail ingestion —
        // the event log is already durable and can be reconciled by rebuild.
        if !newly_inserted.is_empty() {
            if let Err(e) = self.updater.apply_events(user_id, &newly_inserted).await {
                tracing::warn!(user_id = %user_id, error = %e, "projection update failed after ingestion; event log remains durable");
            }
        }

        // Step 6: ack cursor.
        let last_acked_sequence = accepted_sequences.into_iter().max();

        Ok(IngestionOutcome {
            accepted_count,
            rejected_count: rejected_event_ids.len(),
            rejected_event_ids,
            last_acked_sequence,
        })
    }
}
