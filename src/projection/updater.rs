//! Projection Updater (incremental)
//!
//! Applies a freshly persisted, ordered batch of events for one user to the
//! workout/set projections with upsert semantics. Two-phase to honor the
//! set -> workout foreign key: workout events flush first, then set events.
//! A transaction-local cache stands in for the "session identity map" an
//! ORM would give you for free — without it, a set referencing a workout
//! inserted earlier in the same transaction would see it as missing.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::ValidatedEvent;
use crate::metrics::WeeklyAggregator;

use super::ProjectionError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct WorkoutRow {
    workout_id: Uuid,
    #[allow(dead_code)]
    user_id: Uuid,
    #[allow(dead_code)]
    started_at: DateTime<Utc>,
    #[allow(dead_code)]
    ended_at: Option<DateTime<Utc>>,
    #[allow(dead_code)]
    status: String,
}

/// Incrementally maintains workout/set projections from the event log.
#[derive(Debug, Clone)]
pub struct ProjectionUpdater {
    pool: PgPool,
    aggregator: WeeklyAggregator,
}

impl ProjectionUpdater {
    pub fn new(pool: PgPool) -> Self {
        let aggregator = WeeklyAggregator::new(pool.clone());
        Self { pool, aggregator }
    }

    /// Apply an ordered batch of events belonging to one user. On success,
    /// also triggers a weekly-metrics recompute for the user; a failure in
    /// that step is logged but never unwinds the already-committed
    /// projection update.
    pub async fn apply_events(
        &self,
        user_id: Uuid,
        events: &[ValidatedEvent],
    ) -> Result<(), ProjectionError> {
        let mut tx = self.pool.begin().await?;
        let mut cache: HashMap<Uuid, WorkoutRow> = HashMap::new();

        // Phase A: workout events, in order.
        for validated in events {
            match validated {
                ValidatedEvent::WorkoutStarted(p) => {
                    self.apply_workout_started(&mut tx, &mut cache, user_id, p.workout_id, p.started_at)
                        .await?;
                }
                ValidatedEvent::WorkoutEnded(p) => {
                    self.apply_workout_ended(&mut tx, &mut cache, user_id, p.workout_id, p.ended_at)
                        .await?;
                }
                ValidatedEvent::ExerciseAdded(_) | ValidatedEvent::SetCompleted(_) => {}
            }
        }

        // Phase B: set events, only after phase A has flushed.
        for validated in events {
            if let ValidatedEvent::SetCompleted(p) = validated {
                let exists = cache.contains_key(&p.workout_id)
                    || Self::workout_exists(&mut tx, p.workout_id).await?;

                if !exists {
                    tracing::warn!(
                        workout_id = %p.workout_id,
                        set_id = %p.set_id,
                        "SetCompleted for unknown workout_id; skipping"
                    );
                    continue;
                }

                sqlx::query(
                    r#"
                    INSERT INTO sets_projection (set_id, workout_id, exercise_id, reps, weight, completed_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (set_id) DO UPDATE SET
                        exercise_id = EXCLUDED.exercise_id,
                        reps = EXCLUDED.reps,
                        weight = EXCLUDED.weight,
                        completed_at = EXCLUDED.completed_at
                    "#,
                )
                .bind(p.set_id)
                .bind(p.workout_id)
                .bind(p.exercise_id)
                .bind(p.reps)
                .bind(p.weight)
                .bind(p.completed_at)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        if let Err(e) = self.aggregator.rebuild_weekly_metrics(user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "weekly metrics recompute failed after projection update");
        }

        Ok(())
    }

    async fn apply_workout_started(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cache: &mut HashMap<Uuid, WorkoutRow>,
        user_id: Uuid,
        workout_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<(), ProjectionError> {
        let row: WorkoutRow = sqlx::query_as(
            r#"
            INSERT INTO workouts_projection (workout_id, user_id, started_at, ended_at, status)
            VALUES ($1, $2, $3, NULL, 'in_progress')
            ON CONFLICT (workout_id) DO UPDATE SET
                started_at = EXCLUDED.started_at,
                status = CASE WHEN workouts_projection.status = 'completed'
                              THEN workouts_projection.status ELSE 'in_progress' END,
                ended_at = CASE WHEN workouts_projection.status = 'completed'
                              THEN workouts_projection.ended_at ELSE NULL END
            RETURNING workout_id, user_id, started_at, ended_at, status
            "#,
        )
        .bind(workout_id)
        .bind(user_id)
        .bind(started_at)
        .fetch_one(&mut **tx)
        .await?;

        cache.insert(row.workout_id, row);
        Ok(())
    }

    async fn apply_workout_ended(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cache: &mut HashMap<Uuid, WorkoutRow>,
        user_id: Uuid,
        workout_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<(), ProjectionError> {
        let existed = cache.contains_key(&workout_id) || Self::workout_exists(tx, workout_id).await?;

        if !existed {
            tracing::warn!(
                workout_id = %workout_id,
                "WorkoutEnded received before WorkoutStarted; synthesizing degraded placeholder"
            );
        }

        let row: WorkoutRow = sqlx::query_as(
            r#"
            INSERT INTO workouts_projection (workout_id, user_id, started_at, ended_at, status)
            VALUES ($1, $2, $3, $3, 'completed')
            ON CONFLICT (workout_id) DO UPDATE SET
                ended_at = EXCLUDED.ended_at,
                status = 'completed'
            RETURNING workout_id, user_id, started_at, ended_at, status
            "#,
        )
        .bind(workout_id)
        .bind(user_id)
        .bind(ended_at)
        .fetch_one(&mut **tx)
        .await?;

        cache.insert(row.workout_id, row);
        Ok(())
    }

    async fn workout_exists(
        tx: &mut Transaction<'_, Postgres>,
        workout_id: Uuid,
    ) -> Result<bool, ProjectionError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM workouts_projection WHERE workout_id = $1)",
        )
        .bind(workout_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }
}

// Integration tests require a database; see tests/integration_projection.rs
// for WorkoutEnded-before-WorkoutStarted synthesis and the orphan-set skip.
#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(workout_id: Uuid, user_id: Uuid) -> WorkoutRow {
        WorkoutRow {
            workout_id,
            user_id,
            started_at: Utc::now(),
            ended_at: None,
            status: "in_progress".to_string(),
        }
    }

    #[test]
    fn cache_short_circuits_a_workout_inserted_earlier_in_the_same_batch() {
        // This is the exact check apply_events uses to decide whether a
        // SetCompleted needs a round trip to workout_exists at all.
        let mut cache: HashMap<Uuid, WorkoutRow> = HashMap::new();
        let workout_id = Uuid::new_v4();
        cache.insert(workout_id, sample_row(workout_id, Uuid::new_v4()));

        assert!(cache.contains_key(&workout_id));
        assert!(!cache.contains_key(&Uuid::new_v4()));
    }
}
