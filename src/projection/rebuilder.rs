//! Projection Rebuilder (full)
//!
//! Deterministically drops and re-derives every projection from the event
//! log: truncate sets then workouts (FK order), replay the whole log in
//! (device_id, sequence_number) order rebuilding workouts first and
//! committing, then sets (dropping orphans), then weekly metrics for every
//! user with a workout row. Idempotent — running it N times in a row
//! yields the same projection state.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::domain::{validate_event_payload, ValidatedEvent};
use crate::event_store::EventStore;
use crate::metrics::WeeklyAggregator;

use super::ProjectionError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct WorkoutRow {
    workout_id: Uuid,
    user_id: Uuid,
    #[allow(dead_code)]
    started_at: DateTime<Utc>,
    #[allow(dead_code)]
    ended_at: Option<DateTime<Utc>>,
    #[allow(dead_code)]
    status: String,
}

/// Replays the event log into fresh projections.
#[derive(Debug, Clone)]
pub struct ProjectionRebuilder {
    pool: PgPool,
    event_store: EventStore,
    aggregator: WeeklyAggregator,
}

impl ProjectionRebuilder {
    pub fn new(pool: PgPool) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            aggregator: WeeklyAggregator::new(pool.clone()),
            pool,
        }
    }

    pub async fn rebuild_all(&self) -> Result<(), ProjectionError> {
        let events = self.event_store.list_ordered().await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("TRUNCATE TABLE sets_projection").execute(&mut *tx).await?;
        sqlx::query("TRUNCATE TABLE workouts_projection").execute(&mut *tx).await?;

        let mut workouts: HashMap<Uuid, WorkoutRow> = HashMap::new();

        for stored in &events {
            let validated = match validate_event_payload(&stored.event_type, &stored.payload) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(event_id = %stored.event_id, error = %e, "skipping unreplayable event during rebuild");
                    continue;
                }
            };

            match validated {
                ValidatedEvent::WorkoutStarted(p) => {
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
                    .bind(p.workout_id)
                    .bind(stored.user_id)
                    .bind(p.started_at)
                    .fetch_one(&mut *tx)
                    .await?;
                    workouts.insert(row.workout_id, row);
                }
                ValidatedEvent::WorkoutEnded(p) => {
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
                    .bind(p.workout_id)
                    .bind(stored.user_id)
                    .bind(p.ended_at)
                    .fetch_one(&mut *tx)
                    .await?;
                    workouts.insert(row.workout_id, row);
                }
                ValidatedEvent::ExerciseAdded(_) | ValidatedEvent::SetCompleted(_) => {}
            }
        }

        tx.commit().await?;

        let mut tx = self.pool.begin().await?;
        for stored in &events {
            let validated = match validate_event_payload(&stored.event_type, &stored.payload) {
                Ok(v) => v,
                Err(_) => continue,
            };

            if let ValidatedEvent::SetCompleted(p) = validated {
                if !workouts.contains_key(&p.workout_id) {
                    tracing::warn!(
                        workout_id = %p.workout_id,
                        set_id = %p.set_id,
                        "dropping orphaned set during rebuild"
                    );
                    continue;
                }

                Self::insert_set(&mut tx, &p.set_id, &p).await?;
            }
        }
        tx.commit().await?;

        let affected_users: HashSet<Uuid> =
            workouts.values().map(|w| w.user_id).collect();

        for user_id in affected_users {
            self.aggregator
                .rebuild_weekly_metrics(user_id)
                .await
                .map_err(ProjectionError::Database)?;
        }

        Ok(())
    }

    async fn insert_set(
        tx: &mut Transaction<'_, Postgres>,
        set_id: &Uuid,
        p: &crate::domain::SetCompletedPayload,
    ) -> Result<(), ProjectionError> {
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
        .bind(set_id)
        .bind(p.workout_id)
        .bind(p.exercise_id)
        .bind(p.reps)
        .bind(p.weight)
        .bind(p.completed_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

// Integration tests require a database; see tests/integration_projection.rs
// for degraded-placeholder synthesis, orphan-set dropping, and determinism
// across repeated rebuilds.
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
    fn affected_users_dedupes_across_multiple_workouts_for_the_same_user() {
        // This is the exact computation rebuild_all uses to decide which
        // users get a weekly-metrics recompute after replay.
        let user_id = Uuid::new_v4();
        let mut workouts: HashMap<Uuid, WorkoutRow> = HashMap::new();
        workouts.insert(Uuid::new_v4(), sample_row(Uuid::new_v4(), user_id));
        workouts.insert(Uuid::new_v4(), sample_row(Uuid::new_v4(), user_id));
        workouts.insert(Uuid::new_v4(), sample_row(Uuid::new_v4(), Uuid::new_v4()));

        let affected: HashSet<Uuid> = workouts.values().map(|w| w.user_id).collect();
        assert_eq!(affected.len(), 2);
        assert!(affected.contains(&user_id));
    }

    #[test]
    fn orphan_set_is_detected_before_any_insert_is_attempted() {
        // Mirrors the `!workouts.contains_key(&p.workout_id)` guard in the
        // set-replay pass: an unknown workout_id never reaches insert_set.
        let workouts: HashMap<Uuid, WorkoutRow> = HashMap::new();
        let unknown_workout_id = Uuid::new_v4();
        assert!(!workouts.contains_key(&unknown_workout_id));
    }
}
