//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::handlers::{
    AnonymousUserHandler, MergeCommand, MergeHandler, RebuildHandler, SyncCommand, SyncHandler,
    SyncResult,
};
use crate::ingestion::NewEventCandidate;
use crate::metrics::WeeklyAggregator;
use crate::query::{QueryService, SetRow, WorkoutSummary};
use crate::reports::{ReportGenerator, ReportStore, UnimplementedReportGenerator, WeeklyReport};
use crate::users::User;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct SyncEventRequest {
    pub event_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub sequence_number: i64,
}

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub device_id: Uuid,
    pub user_id: Uuid,
    pub events: Vec<SyncEventRequest>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub anonymous_user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BatchSetsQuery {
    pub workout_ids: String,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct LastSetsQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct WeeklyMetricsQuery {
    pub user_id: Uuid,
    pub week_start: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct RebuildWeeklyQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct WeeklyMetricsResponse {
    pub user_id: Uuid,
    pub week_start: NaiveDate,
    pub total_workouts: i64,
    pub total_volume: rust_decimal::Decimal,
    pub exercises_count: i64,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<PgPool> {
    Router::new()
        .route("/sync", post(sync))
        .route("/projections/rebuild", post(rebuild_projections))
        .route("/users/merge", post(merge_users))
        .route("/users/anonymous", post(create_anonymous_user))
        .route("/workouts", get(list_workouts))
        .route("/workouts/:workout_id/sets", get(list_workout_sets))
        .route("/workouts/sets/batch", get(batch_list_sets))
        .route("/exercises/:exercise_id/last-sets", get(last_sets_for_exercise))
        .route("/metrics/weekly", get(get_weekly_metrics))
        .route("/metrics/weekly/rebuild", post(rebuild_weekly_metrics))
        .route("/reports/weekly", get(get_weekly_report))
        .route("/reports/weekly/regenerate", post(regenerate_weekly_report))
}

// =========================================================================
// POST /sync
// =========================================================================

async fn sync(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<SyncRequest>,
) -> Result<(StatusCode, Json<SyncResult>), AppError> {
    let handler = SyncHandler::new(pool);

    let command = SyncCommand {
        device_id: request.device_id,
        user_id: request.user_id,
        events: request
            .events
            .into_iter()
            .map(|e| NewEventCandidate {
                event_id: e.event_id,
                event_type: e.event_type,
                payload: e.payload,
                sequence_number: e.sequence_number,
            })
            .collect(),
    };

    let result = handler.execute(command, &context).await?;

    // A malformed or fully-rejected batch is still a 200-shaped envelope —
    // the caller needs rejected_event_ids either way — just with a 400
    // status instead of 200.
    let status = if result.accepted_count > 0 {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    Ok((status, Json(result)))
}

// =========================================================================
// POST /projections/rebuild
// =========================================================================

async fn rebuild_projections(
    State(pool): State<PgPool>,
) -> Result<Json<MessageResponse>, AppError> {
    let handler = RebuildHandler::new(pool);
    handler.execute().await?;

    Ok(Json(MessageResponse {
        message: "projections rebuilt".to_string(),
    }))
}

// =========================================================================
// POST /users/merge
// =========================================================================

async fn merge_users(
    State(pool): State<PgPool>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<MergeRequest>,
) -> Result<Json<crate::merge::MergeResult>, AppError> {
    let handler = MergeHandler::new(pool);

    let command = MergeCommand {
        anonymous_user_id: request.anonymous_user_id,
    };

    let result = handler.execute(command, &context).await?;

    Ok(Json(result))
}

// =========================================================================
// POST /users/anonymous
// =========================================================================

async fn create_anonymous_user(
    State(pool): State<PgPool>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let handler = AnonymousUserHandler::new(pool);
    let user = handler.execute().await?;

    Ok((StatusCode::CREATED, Json(user)))
}

// =========================================================================
// GET /workouts
// =========================================================================

async fn list_workouts(
    State(pool): State<PgPool>,
    Query(query): Query<UserIdQuery>,
) -> Result<Json<Vec<WorkoutSummary>>, AppError> {
    let service = QueryService::new(pool);
    let workouts = service.list_workouts(query.user_id).await?;
    Ok(Json(workouts))
}

// =========================================================================
// GET /workouts/:workout_id/sets
// =========================================================================

async fn list_workout_sets(
    State(pool): State<PgPool>,
    Path(workout_id): Path<Uuid>,
) -> Result<Json<Vec<SetRow>>, AppError> {
    let service = QueryService::new(pool);
    let sets = service.list_sets(workout_id).await?;
    Ok(Json(sets))
}

// =========================================================================
// GET /workouts/sets/batch
// =========================================================================

async fn batch_list_sets(
    State(pool): State<PgPool>,
    Query(query): Query<BatchSetsQuery>,
) -> Result<Json<std::collections::HashMap<Uuid, Vec<SetRow>>>, AppError> {
    let workout_ids: Vec<Uuid> = query
        .workout_ids
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| Uuid::parse_str(s.trim()))
        .collect::<Result<_, _>>()
        .map_err(|_| AppError::InvalidRequest("invalid workout_ids".to_string()))?;

    let service = QueryService::new(pool);
    let grouped = service
        .batch_list_sets(&workout_ids, query.user_id)
        .await?;

    Ok(Json(grouped))
}

// =========================================================================
// GET /exercises/:exercise_id/last-sets
// =========================================================================

async fn last_sets_for_exercise(
    State(pool): State<PgPool>,
    Path(exercise_id): Path<Uuid>,
    Query(query): Query<LastSetsQuery>,
) -> Result<Json<Vec<SetRow>>, AppError> {
    let service = QueryService::new(pool);
    let sets = service
        .last_sets_for_exercise(query.user_id, exercise_id)
        .await?;
    Ok(Json(sets))
}

// =========================================================================
// GET /metrics/weekly
// =========================================================================

async fn get_weekly_metrics(
    State(pool): State<PgPool>,
    Query(query): Query<WeeklyMetricsQuery>,
) -> Result<Json<Option<WeeklyMetricsResponse>>, AppError> {
    let aggregator = WeeklyAggregator::new(pool);
    let metrics = aggregator
        .get_weekly_metrics(query.user_id, query.week_start)
        .await?;

    Ok(Json(metrics.map(|m| WeeklyMetricsResponse {
        user_id: m.user_id,
        week_start: m.week_start,
        total_workouts: m.total_workouts,
        total_volume: m.total_volume,
        exercises_count: m.exercises_count,
    })))
}

// =========================================================================
// POST /metrics/weekly/rebuild
// =========================================================================

async fn rebuild_weekly_metrics(
    State(pool): State<PgPool>,
    Query(query): Query<RebuildWeeklyQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    let aggregator = WeeklyAggregator::new(pool);
    aggregator.rebuild_weekly_metrics(query.user_id).await?;

    Ok(Json(MessageResponse {
        message: "weekly metrics rebuilt".to_string(),
    }))
}

// =========================================================================
// GET /reports/weekly
// =========================================================================

async fn get_weekly_report(
    State(pool): State<PgPool>,
    Query(query): Query<WeeklyMetricsQuery>,
) -> Result<Json<Option<WeeklyReport>>, AppError> {
    let store = ReportStore::new(pool);
    let report = store.get(query.user_id, query.week_start).await?;
    Ok(Json(report))
}

// =========================================================================
// POST /reports/weekly/regenerate
// =========================================================================

async fn regenerate_weekly_report(
    State(pool): State<PgPool>,
    Query(query): Query<WeeklyMetricsQuery>,
) -> Result<Json<WeeklyReport>, AppError> {
    let store = ReportStore::new(pool);
    let generator = UnimplementedReportGenerator;

    let report_text = generator
        .generate(query.user_id, query.week_start)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let report = store
        .store_report(query.user_id, query.week_start, &report_text)
        .await?;

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_request_deserialize() {
        let json = r#"{
            "device_id": "550e8400-e29b-41d4-a716-446655440000",
            "user_id": "550e8400-e29b-41d4-a716-446655440001",
            "events": [
                {"event_id": "550e8400-e29b-41d4-a716-446655440002", "event_type": "WorkoutStarted", "payload": {}, "sequence_number": 1}
            ]
        }"#;

        let request: SyncRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.events.len(), 1);
        assert_eq!(request.events[0].sequence_number, 1);
    }

    #[test]
    fn test_merge_request_deserialize() {
        let json = r#"{"anonymous_user_id": "550e8400-e29b-41d4-a716-446655440000"}"#;
        let request: MergeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            request.anonymous_user_id.to_string(),
            "550e8400-e29b-41d4-a716-446655440000"
        );
    }
}
