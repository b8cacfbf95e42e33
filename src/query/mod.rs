//! Query Layer
//!
//! Read-side contracts the HTTP adapter consumes. Reads bypass ingestion
//! and projection entirely and go straight to the projection tables.
//! Workout listings must fetch all sets and referenced exercise names in
//! O(1) queries regardless of workout count — never per-workout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::DomainError;

#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkoutSummary {
    pub workout_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: String,
    pub set_count: i64,
    pub total_volume: Decimal,
    pub distinct_exercises: i64,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct SetRow {
    pub set_id: Uuid,
    pub workout_id: Uuid,
    pub exercise_id: Uuid,
    pub exercise_name: Option<String>,
    pub reps: Option<i32>,
    pub weight: Option<Decimal>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct QueryService {
    pool: PgPool,
}

impl QueryService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Workouts for a user, newest-first, each annotated with aggregate set
    /// stats. Three queries total regardless of workout count: workouts,
    /// then a single batch-fetch of sets for all of them.
    pub async fn list_workouts(&self, user_id: Uuid) -> Result<Vec<WorkoutSummary>, sqlx::Error> {
        #[derive(sqlx::FromRow)]
        struct WorkoutRow {
            workout_id: Uuid,
            started_at: DateTime<Utc>,
            ended_at: Option<DateTime<Utc>>,
            status: String,
        }

        let workouts: Vec<WorkoutRow> = sqlx::query_as(
            r#"
            SELECT workout_id, started_at, ended_at, status
            FROM workouts_projection
            WHERE user_id = $1
            ORDER BY started_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let workout_ids: Vec<Uuid> = workouts.iter().map(|w| w.workout_id).collect();

        let sets: Vec<(Uuid, Uuid, Option<i32>, Option<Decimal>)> = if workout_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as(
                r#"
                SELECT workout_id, exercise_id, reps, weight
                FROM sets_projection
                WHERE workout_id = ANY($1)
                "#,
            )
            .bind(&workout_ids)
            .fetch_all(&self.pool)
            .await?
        };

        let mut by_workout: HashMap<Uuid, Vec<(Uuid, Option<i32>, Option<Decimal>)>> = HashMap::new();
        for (workout_id, exercise_id, reps, weight) in sets {
            by_workout
                .entry(workout_id)
                .or_default()
                .push((exercise_id, reps, weight));
        }

        let summaries = workouts
            .into_iter()
            .map(|w| {
                let rows = by_workout.get(&w.workout_id);
                let set_count = rows.map(|r| r.len() as i64).unwrap_or(0);
                let mut total_volume = Decimal::ZERO;
                let mut exercises = std::collections::HashSet::new();
                if let Some(rows) = rows {
                    for (exercise_id, reps, weight) in rows {
                        total_volume += Decimal::from(reps.unwrap_or(0)) * weight.unwrap_or(Decimal::ZERO);
                        exercises.insert(*exercise_id);
                    }
                }

                WorkoutSummary {
                    workout_id: w.workout_id,
                    started_at: w.started_at,
                    ended_at: w.ended_at,
                    status: w.status,
                    set_count,
                    total_volume,
                    distinct_exercises: exercises.len() as i64,
                }
            })
            .collect();

        Ok(summaries)
    }

    /// Sets for one workout, ordered by completed_at ascending.
    pub async fn list_sets(&self, workout_id: Uuid) -> Result<Vec<SetRow>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT s.set_id, s.workout_id, s.exercise_id, e.name AS exercise_name, s.reps, s.weight, s.completed_at
            FROM sets_projection s
            LEFT JOIN exercises e ON e.exercise_id = s.exercise_id
            WHERE s.workout_id = $1
            ORDER BY s.completed_at ASC
            "#,
        )
        .bind(workout_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Batch sets for a list of workout_ids. Enforces every id belongs to
    /// `user_id` with a single authorization query before fetching sets.
    pub async fn batch_list_sets(
        &self,
        workout_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<HashMap<Uuid, Vec<SetRow>>, DomainError> {
        if workout_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let owned_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM workouts_projection
            WHERE workout_id = ANY($1) AND user_id = $2
            "#,
        )
        .bind(workout_ids)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::ProjectionUpdateFailed(e.to_string()))?;

        if owned_count as usize != workout_ids.len() {
            return Err(DomainError::WorkoutNotFound(workout_ids[0]));
        }

        let rows: Vec<SetRow> = sqlx::query_as(
            r#"
            SELECT s.set_id, s.workout_id, s.exercise_id, e.name AS exercise_name, s.reps, s.weight, s.completed_at
            FROM sets_projection s
            LEFT JOIN exercises e ON e.exercise_id = s.exercise_id
            WHERE s.workout_id = ANY($1)
            ORDER BY s.completed_at ASC
            "#,
        )
        .bind(workout_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::ProjectionUpdateFailed(e.to_string()))?;

        let mut grouped: HashMap<Uuid, Vec<SetRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.workout_id).or_default().push(row);
        }

        Ok(grouped)
    }

    /// Sets for the most recent workout of `user_id` containing `exercise_id`.
    pub async fn last_sets_for_exercise(
        &self,
        user_id: Uuid,
        exercise_id: Uuid,
    ) -> Result<Vec<SetRow>, sqlx::Error> {
        let workout_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT w.workout_id
            FROM workouts_projection w
            JOIN sets_projection s ON s.workout_id = w.workout_id
            WHERE w.user_id = $1 AND s.exercise_id = $2
            ORDER BY w.started_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(exercise_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(workout_id) = workout_id else {
            return Ok(Vec::new());
        };

        sqlx::query_as(
            r#"
            SELECT s.set_id, s.workout_id, s.exercise_id, e.name AS exercise_name, s.reps, s.weight, s.completed_at
            FROM sets_projection s
            LEFT JOIN exercises e ON e.exercise_id = s.exercise_id
            WHERE s.workout_id = $1 AND s.exercise_id = $2
            ORDER BY s.completed_at ASC
            "#,
        )
        .bind(workout_id)
        .bind(exercise_id)
        .fetch_all(&self.pool)
        .await
    }
}
