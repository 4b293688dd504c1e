use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use ecclesia_core::AppError;

use super::*;

const TRUNCATED_HEADER: &str = "x-export-truncated";

/// Streams the filtered audit trail as a CSV attachment.
pub async fn export_audit_logs_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<AuditLogListQuery>,
) -> ApiResult<Response> {
    let export = state
        .audit_query_service
        .export_csv(&user, query.into_filter()?)
        .await?;

    let disposition = format!(
        "attachment; filename=\"audit-logs-{}.csv\"",
        Utc::now().format("%Y-%m-%d")
    );
    let disposition = HeaderValue::from_str(disposition.as_str()).map_err(|error| {
        AppError::Internal(format!("invalid content disposition header: {error}"))
    })?;

    let mut response = (StatusCode::OK, export.content).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    if export.truncated {
        headers.insert(TRUNCATED_HEADER, HeaderValue::from_static("true"));
    }

    Ok(response)
}
