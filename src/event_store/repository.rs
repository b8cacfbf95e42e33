//! Event Store Repository
//!
//! Core implementation of the append-only event log. event_id is the
//! idempotency key; (device_id, sequence_number) gives per-device order.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

use super::EventStoreError;

/// A durably stored event, as read back from the log.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub user_id: Uuid,
    pub device_id: Uuid,
    pub sequence_number: i64,
    pub correlation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A candidate event awaiting insertion.
#[derive(Debug, Clone)]
pub struct NewEventRow {
    pub event_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub sequence_number: i64,
    pub correlation_id: Option<Uuid>,
}

/// Durable, append-only store of events.
#[derive(Debug, Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a batch of events for one (device_id, user_id) pair in a
    /// single transaction. Fails atomically on any unique-key collision —
    /// the caller is expected to have already deduped via `exists`.
    pub async fn append_batch(
        &self,
        device_id: Uuid,
        user_id: Uuid,
        rows: &[NewEventRow],
    ) -> Result<(), EventStoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for row in rows {
            Self::insert_one(&mut tx, device_id, user_id, row).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Insert a single event on its own transaction. Used as the fallback
    /// after a batch-transaction race (spec §4.3 step 4).
    pub async fn append_one(
        &self,
        device_id: Uuid,
        user_id: Uuid,
        row: &NewEventRow,
    ) -> Result<(), EventStoreError> {
        let mut tx = self.pool.begin().await?;
        Self::insert_one(&mut tx, device_id, user_id, row).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_one(
        tx: &mut Transaction<'_, Postgres>,
        device_id: Uuid,
        user_id: Uuid,
        row: &NewEventRow,
    ) -> Result<(), EventStoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO events (
                event_id, event_type, payload, user_id, device_id,
                sequence_number, correlation_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(row.event_id)
        .bind(&row.event_type)
        .bind(&row.payload)
        .bind(user_id)
        .bind(device_id)
        .bind(row.sequence_number)
        .bind(row.correlation_id)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false)
                {
                    Err(EventStoreError::UniqueViolation(row.event_id))
                } else {
                    Err(EventStoreError::Database(e))
                }
            }
        }
    }

    /// Return the subset of `event_ids` already present in the log. Must be
    /// a single query regardless of input size (spec §4.2).
    pub async fn exists(&self, event_ids: &[Uuid]) -> Result<HashSet<Uuid>, EventStoreError> {
        if event_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let present: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT event_id FROM events WHERE event_id = ANY($1)
            "#,
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(present.into_iter().collect())
    }

    /// All events in (device_id, sequence_number) order, for a full replay.
    pub async fn list_ordered(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let events = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT event_id, event_type, payload, user_id, device_id,
                   sequence_number, correlation_id, created_at
            FROM events
            ORDER BY device_id, sequence_number
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// One user's events in (device_id, sequence_number) order.
    pub async fn list_ordered_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let events = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT event_id, event_type, payload, user_id, device_id,
                   sequence_number, correlation_id, created_at
            FROM events
            WHERE user_id = $1
            ORDER BY device_id, sequence_number
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Fetch a specific set of events, ordered for handoff to the
    /// projection updater.
    pub async fn list_by_ids(
        &self,
        event_ids: &[Uuid],
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }

        let events = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT event_id, event_type, payload, user_id, device_id,
                   sequence_number, correlation_id, created_at
            FROM events
            WHERE event_id = ANY($1)
            ORDER BY device_id, sequence_number
            "#,
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_row_carries_fields() {
        let row = NewEventRow {
            event_id: Uuid::new_v4(),
            event_type: "WorkoutStarted".to_string(),
            payload: serde_json::json!({}),
            sequence_number: 1,
            correlation_id: None,
        };
        assert_eq!(row.sequence_number, 1);
        assert_eq!(row.event_type, "WorkoutStarted");
    }
}
