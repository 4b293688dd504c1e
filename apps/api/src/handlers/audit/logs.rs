use axum::body::Bytes;
use ecclesia_core::AppError;

use super::*;

pub async fn list_audit_logs_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<AuditLogListQuery>,
) -> ApiResult<Json<AuditLogPageResponse>> {
    let page = state
        .audit_query_service
        .list_audit_logs(&user, query.into_query()?)
        .await?;

    Ok(Json(AuditLogPageResponse::from(page)))
}

pub async fn audit_statistics_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<AuditStatisticsQuery>,
) -> ApiResult<Json<AuditStatisticsResponse>> {
    let statistics = state
        .audit_query_service
        .statistics(&user, query.into_range()?)
        .await?;

    Ok(Json(AuditStatisticsResponse::from(statistics)))
}

pub async fn security_alerts_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<SecurityAlertsQuery>,
) -> ApiResult<Json<SecurityAlertsResponse>> {
    let alerts = state
        .audit_query_service
        .security_alerts(&user, query.hours)
        .await?;

    Ok(Json(SecurityAlertsResponse::from(alerts)))
}

/// Runs a retention sweep now. An empty body uses the default retention.
pub async fn retention_sweep_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    body: Bytes,
) -> ApiResult<Json<RetentionSweepResponse>> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RetentionSweepRequest::default()
    } else {
        serde_json::from_slice::<RetentionSweepRequest>(&body).map_err(|error| {
            AppError::Validation(format!("invalid retention sweep payload: {error}"))
        })?
    };

    let result = state
        .audit_query_service
        .run_retention_sweep(&user, request.days)
        .await?;

    Ok(Json(RetentionSweepResponse::from(result)))
}
