//! Weekly Aggregator
//!
//! Computes per-user, per-ISO-week totals (workouts, volume, distinct
//! exercises) from the workout/set projections. Buckets are keyed by
//! `week_start`, the Monday of the ISO week containing a workout's
//! `started_at`.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Monday (ISO weekday 1) of the week containing `instant`.
pub fn week_start(instant: DateTime<Utc>) -> NaiveDate {
    let date = instant.date_naive();
    let iso_weekday = date.weekday().num_days_from_monday();
    date.checked_sub_days(Days::new(iso_weekday as u64))
        .expect("week_start underflow")
}

#[derive(Debug, Clone)]
pub struct WeeklyMetrics {
    pub user_id: Uuid,
    pub week_start: NaiveDate,
    pub total_workouts: i64,
    pub total_volume: Decimal,
    pub exercises_count: i64,
}

/// Computes and upserts per-week aggregates.
#[derive(Debug, Clone)]
pub struct WeeklyAggregator {
    pool: PgPool,
}

impl WeeklyAggregator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Recompute and upsert the (user_id, week_start) metrics row.
    pub async fn calculate_weekly_metrics(
        &self,
        user_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<WeeklyMetrics, sqlx::Error> {
        let week_end = week_start + chrono::Duration::days(6);

        let workout_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT workout_id FROM workouts_projection
            WHERE user_id = $1
              AND status = 'completed'
              AND started_at::date BETWEEN $2 AND $3
            "#,
        )
        .bind(user_id)
        .bind(week_start)
        .bind(week_end)
        .fetch_all(&self.pool)
        .await?;

        let total_workouts = workout_ids.len() as i64;

        let rows: Vec<(Uuid, Option<i32>, Option<Decimal>)> = if workout_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as(
                r#"
                SELECT exercise_id, reps, weight
                FROM sets_projection
                WHERE workout_id = ANY($1)
                "#,
            )
            .bind(&workout_ids)
            .fetch_all(&self.pool)
            .await?
        };

        let mut total_volume = Decimal::ZERO;
        let mut exercises: HashSet<Uuid> = HashSet::new();
        for (exercise_id, reps, weight) in &rows {
            let reps = Decimal::from(reps.unwrap_or(0));
            let weight = weight.unwrap_or(Decimal::ZERO);
            total_volume += reps * weight;
            exercises.insert(*exercise_id);
        }
        let exercises_count = exercises.len() as i64;

        sqlx::query(
            r#"
            INSERT INTO weekly_metrics (user_id, week_start, total_workouts, total_volume, exercises_count)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, week_start) DO UPDATE SET
                total_workouts = EXCLUDED.total_workouts,
                total_volume = EXCLUDED.total_volume,
                exercises_count = EXCLUDED.exercises_count
            "#,
        )
        .bind(user_id)
        .bind(week_start)
        .bind(total_workouts)
        .bind(total_volume)
        .bind(exercises_count)
        .execute(&self.pool)
        .await?;

        Ok(WeeklyMetrics {
            user_id,
            week_start,
            total_workouts,
            total_volume,
            exercises_count,
        })
    }

    /// Recompute every weekly bucket this user has a completed workout in.
    pub async fn rebuild_weekly_metrics(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        let started_ats: Vec<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT started_at FROM workouts_projection
            WHERE user_id = $1 AND status = 'completed'
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut buckets: HashMap<NaiveDate, ()> = HashMap::new();
        for started_at in started_ats {
            buckets.insert(week_start(started_at), ());
        }

        for bucket in buckets.keys() {
            self.calculate_weekly_metrics(user_id, *bucket).await?;
        }

        Ok(())
    }

    /// Fetch a single (user_id, week_start) row, if it exists.
    pub async fn get_weekly_metrics(
        &self,
        user_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyMetrics>, sqlx::Error> {
        let row: Option<(i64, Decimal, i64)> = sqlx::query_as(
            r#"
            SELECT total_workouts, total_volume, exercises_count
            FROM weekly_metrics
            WHERE user_id = $1 AND week_start = $2
            "#,
        )
        .bind(user_id)
        .bind(week_start)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(total_workouts, total_volume, exercises_count)| WeeklyMetrics {
            user_id,
            week_start,
            total_workouts,
            total_volume,
            exercises_count,
        }))
    }

    /// Transaction-scoped variant of `rebuild_weekly_metrics`, for callers
    /// (identity merge) that must recompute as part of their own commit.
    pub async fn rebuild_weekly_metrics_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        let started_ats: Vec<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT started_at FROM workouts_projection
            WHERE user_id = $1 AND status = 'completed'
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await?;

        let mut buckets: HashSet<NaiveDate> = HashSet::new();
        for started_at in started_ats {
            buckets.insert(week_start(started_at));
        }

        for bucket in buckets {
            Self::calculate_weekly_metrics_tx(tx, user_id, bucket).await?;
        }

        Ok(())
    }

    async fn calculate_weekly_metrics_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<(), sqlx::Error> {
        let week_end = week_start + chrono::Duration::days(6);

        let workout_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT workout_id FROM workouts_projection
            WHERE user_id = $1
              AND status = 'completed'
              AND started_at::date BETWEEN $2 AND $3
            "#,
        )
        .bind(user_id)
        .bind(week_start)
        .bind(week_end)
        .fetch_all(&mut **tx)
        .await?;

        let total_workouts = workout_ids.len() as i64;

        let rows: Vec<(Uuid, Option<i32>, Option<Decimal>)> = if workout_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as(
                r#"
                SELECT exercise_id, reps, weight
                FROM sets_projection
                WHERE workout_id = ANY($1)
                "#,
            )
            .bind(&workout_ids)
            .fetch_all(&mut **tx)
            .await?
        };

        let mut total_volume = Decimal::ZERO;
        let mut exercises: HashSet<Uuid> = HashSet::new();
        for (exercise_id, reps, weight) in &rows {
            let reps = Decimal::from(reps.unwrap_or(0));
            let weight = weight.unwrap_or(Decimal::ZERO);
            total_volume += reps * weight;
            exercises.insert(*exercise_id);
        }
        let exercises_count = exercises.len() as i64;

        sqlx::query(
            r#"
            INSERT INTO weekly_metrics (user_id, week_start, total_workouts, total_volume, exercises_count)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, week_start) DO UPDATE SET
                total_workouts = EXCLUDED.total_workouts,
                total_volume = EXCLUDED.total_volume,
                exercises_count = EXCLUDED.exercises_count
            "#,
        )
        .bind(user_id)
        .bind(week_start)
        .bind(total_workouts)
        .bind(total_volume)
        .bind(exercises_count)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn week_start_on_monday_is_itself() {
        let monday = Utc.with_ymd_and_hms(2026, 7, 20, 9, 0, 0).unwrap();
        assert_eq!(week_start(monday), NaiveDate::from_ymd_opt(2026, 7, 20).unwrap());
    }

    #[test]
    fn week_start_on_sunday_rolls_back_to_monday() {
        let sunday = Utc.with_ymd_and_hms(2026, 7, 26, 9, 0, 0).unwrap();
        assert_eq!(week_start(sunday), NaiveDate::from_ymd_opt(2026, 7, 20).unwrap());
    }

    #[test]
    fn week_start_on_wednesday_rolls_back_to_monday() {
        let wednesday = Utc.with_ymd_and_hms(2026, 7, 22, 23, 59, 0).unwrap();
        assert_eq!(week_start(wednesday), NaiveDate::from_ymd_opt(2026, 7, 20).unwrap());
    }
}
