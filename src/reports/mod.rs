//! Weekly Reports
//!
//! Storage contract for the AI-generated weekly report: fetch by
//! (user_id, week_start) and an upsert that deletes prior text on
//! regeneration. Generation itself is an external collaborator — the
//! `ReportGenerator` trait models that boundary; this crate ships no
//! concrete implementation of it.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WeeklyReport {
    pub user_id: Uuid,
    pub week_start: NaiveDate,
    pub report_text: String,
    pub generated_at: DateTime<Utc>,
}

/// External collaborator that turns a user's week of data into report
/// text. Out of scope to implement here — the core only persists what it
/// returns.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, user_id: Uuid, week_start: NaiveDate) -> anyhow::Result<String>;
}

/// A `ReportGenerator` that always fails; wired in until a real generator
/// is plugged in by the deployment, so the "report generation" endpoint
/// has an explicit, honest failure mode rather than silently doing
/// nothing.
pub struct UnimplementedReportGenerator;

#[async_trait]
impl ReportGenerator for UnimplementedReportGenerator {
    async fn generate(&self, _user_id: Uuid, _week_start: NaiveDate) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("report generation is not implemented in this core"))
    }
}

#[derive(Debug, Clone)]
pub struct ReportStore {
    pool: PgPool,
}

impl ReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(
        &self,
        user_id: Uuid,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyReport>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT user_id, week_start, report_text, generated_at
            FROM weekly_reports
            WHERE user_id = $1 AND week_start = $2
            "#,
        )
        .bind(user_id)
        .bind(week_start)
        .fetch_optional(&self.pool)
        .await
    }

    /// Upsert the report text, replacing whatever was stored before.
    pub async fn store_report(
        &self,
        user_id: Uuid,
        week_start: NaiveDate,
        report_text: &str,
    ) -> Result<WeeklyReport, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO weekly_reports (user_id, week_start, report_text, generated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, week_start) DO UPDATE SET
                report_text = EXCLUDED.report_text,
                generated_at = EXCLUDED.generated_at
            RETURNING user_id, week_start, report_text, generated_at
            "#,
        )
        .bind(user_id)
        .bind(week_start)
        .bind(report_text)
        .fetch_one(&self.pool)
        .await
    }
}
