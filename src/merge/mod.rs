//! Identity Merge
//!
//! Transactionally re-attributes all of an anonymous user's rows (events,
//! workout projections, weekly metrics, weekly reports) to a registered
//! user, then deletes the anonymous user record. Idempotent: merging a
//! user with zero events is a no-op.
//!
//! Diverges deliberately from the source behavior by recomputing the real
//! user's weekly metrics as the transaction's last step before commit, so
//! two rows for the same (user_id, week_start) never coexist after a merge
//! that collides weeks between the two identities. weekly_metrics and
//! weekly_reports both carry a UNIQUE (user_id, week_start) constraint, so
//! neither can be re-attributed with a plain UPDATE SET user_id when both
//! identities have a row for the same week — weekly_metrics rows are
//! dropped outright (rebuild_weekly_metrics_tx replaces them), weekly_reports
//! rows are upserted since report text has no other source to regenerate
//! from.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::DomainError;
use crate::metrics::WeeklyAggregator;

#[derive(Debug, Clone, serde::Serialize)]
pub struct MergeResult {
    pub merged: bool,
    pub events_updated: u64,
    pub workouts_updated: u64,
    pub weekly_metrics_updated: u64,
    pub weekly_reports_updated: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct MergeService {
    pool: PgPool,
}

impl MergeService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn merge(
        &self,
        anonymous_user_id: Uuid,
        real_user_id: Uuid,
    ) -> Result<MergeResult, MergeError> {
        // Checked first, ahead of the existence preconditions below: a
        // re-run of a completed merge finds zero events left under
        // anonymous_user_id (the prior run already re-attributed them and
        // deleted the user row), and must report that as a no-op rather
        // than as a precondition failure.
        let event_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE user_id = $1")
            .bind(anonymous_user_id)
            .fetch_one(&self.pool)
            .await?;

        if event_count == 0 {
            return Ok(MergeResult {
                merged: false,
                events_updated: 0,
                workouts_updated: 0,
                weekly_metrics_updated: 0,
                weekly_reports_updated: 0,
            });
        }

        let anonymous: Option<bool> =
            sqlx::query_scalar("SELECT is_anonymous FROM users WHERE user_id = $1")
                .bind(anonymous_user_id)
                .fetch_optional(&self.pool)
                .await?;
        let anonymous = anonymous
            .ok_or_else(|| DomainError::MergeInvalid("anonymous user does not exist".into()))?;
        if !anonymous {
            return Err(DomainError::MergeInvalid("source user is not anonymous".into()).into());
        }

        let real_is_anonymous: Option<bool> =
            sqlx::query_scalar("SELECT is_anonymous FROM users WHERE user_id = $1")
                .bind(real_user_id)
                .fetch_optional(&self.pool)
                .await?;
        let real_is_anonymous = real_is_anonymous
            .ok_or_else(|| DomainError::MergeInvalid("target user does not exist".into()))?;
        if real_is_anonymous {
            return Err(DomainError::MergeInvalid("target user is anonymous".into()).into());
        }

        let mut tx = self.pool.begin().await?;

        let events_updated = sqlx::query("UPDATE events SET user_id = $2 WHERE user_id = $1")
            .bind(anonymous_user_id)
            .bind(real_user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let workouts_updated =
            sqlx::query("UPDATE workouts_projection SET user_id = $2 WHERE user_id = $1")
                .bind(anonymous_user_id)
                .bind(real_user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        // Deleted rather than re-attributed: weekly_metrics has a UNIQUE
        // (user_id, week_start) constraint, so UPDATEing user_id would
        // collide whenever both identities have a row for the same week.
        // The anonymous user's rows are fully superseded by the
        // rebuild_weekly_metrics_tx call below, which recomputes every week
        // real_user_id now has events in, anonymous-derived or not.
        let weekly_metrics_updated =
            sqlx::query("DELETE FROM weekly_metrics WHERE user_id = $1")
                .bind(anonymous_user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        // weekly_reports carries the same UNIQUE (user_id, week_start)
        // constraint as weekly_metrics, but unlike metrics its rows aren't
        // recomputable from the event log — an outright DELETE would lose
        // the anonymous user's report text with nothing to replace it. An
        // upsert merges them instead: a week real_user_id doesn't already
        // have a report for moves over untouched; a colliding week keeps
        // whichever report was generated more recently.
        let weekly_reports_updated = sqlx::query(
            r#"
            INSERT INTO weekly_reports (user_id, week_start, report_text, generated_at)
            SELECT $2, week_start, report_text, generated_at
            FROM weekly_reports
            WHERE user_id = $1
            ON CONFLICT (user_id, week_start) DO UPDATE SET
                report_text = EXCLUDED.report_text,
                generated_at = EXCLUDED.generated_at
            WHERE EXCLUDED.generated_at > weekly_reports.generated_at
            "#,
        )
        .bind(anonymous_user_id)
        .bind(real_user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM weekly_reports WHERE user_id = $1")
            .bind(anonymous_user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(anonymous_user_id)
            .execute(&mut *tx)
            .await?;

        WeeklyAggregator::rebuild_weekly_metrics_tx(&mut tx, real_user_id).await?;

        tx.commit().await?;

        tracing::info!(
            anonymous_user_id = %anonymous_user_id,
            real_user_id = %real_user_id,
            events_updated,
            workouts_updated,
            "identity merge completed"
        );

        Ok(MergeResult {
            merged: true,
            events_updated,
            workouts_updated,
            weekly_metrics_updated,
            weekly_reports_updated,
        })
    }
}

// Integration tests require a database; see tests/integration_merge.rs for
// the overlapping-weekly-bucket case this module's UNIQUE-constraint
// handling exists for.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_error_wraps_domain_error_message() {
        let err: MergeError =
            DomainError::MergeInvalid("source user is not anonymous".into()).into();
        assert!(err.to_string().contains("source user is not anonymous"));
    }

    #[test]
    fn zero_event_merge_reports_a_no_op_rather_than_an_error() {
        let result = MergeResult {
            merged: false,
            events_updated: 0,
            workouts_updated: 0,
            weekly_metrics_updated: 0,
            weekly_reports_updated: 0,
        };
        assert!(!result.merged);
        assert_eq!(result.events_updated, 0);
    }
}
