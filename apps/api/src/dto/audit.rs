use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use ecclesia_application::{
    AUDIT_QUERY_DEFAULT_LIMIT, AccessDeniedSummary, ActionCount, ActorActivity, AuditActor,
    AuditLogEntry, AuditLogFilter, AuditLogPage, AuditLogQuery, AuditSortField, AuditStatistics,
    DateRange, FailedLoginSummary, ResourceTypeCount, RetentionSweepResult, SecurityAlerts,
    SortDirection,
};
use ecclesia_core::{AppError, AppResult, UserId};
use ecclesia_domain::{AuditAction, ResourceType};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use ts_rs::TS;

/// Query string accepted by the audit listing and export endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogListQuery {
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub success: Option<bool>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub ip_address: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<AuditSortField>,
    pub sort_order: Option<SortDirection>,
}

impl AuditLogListQuery {
    pub fn into_filter(self) -> AppResult<AuditLogFilter> {
        Ok(AuditLogFilter {
            actor_id: non_blank(self.user_id)
                .map(|value| UserId::parse(value.as_str()))
                .transpose()?,
            action: non_blank(self.action)
                .map(|value| AuditAction::from_str(value.as_str()))
                .transpose()?,
            resource_type: non_blank(self.resource_type)
                .map(|value| ResourceType::from_str(value.as_str()))
                .transpose()?,
            success: self.success,
            range: parse_date_range(self.start_date, self.end_date)?,
            ip_address: non_blank(self.ip_address),
            search: non_blank(self.search),
        })
    }

    pub fn into_query(mut self) -> AppResult<AuditLogQuery> {
        let page = self.page.take().unwrap_or(1);
        let limit = self.limit.take().unwrap_or(AUDIT_QUERY_DEFAULT_LIMIT);
        let sort_field = self.sort_by.take().unwrap_or_default();
        let sort_direction = self.sort_order.take().unwrap_or_default();

        Ok(AuditLogQuery {
            filter: self.into_filter()?,
            page,
            limit,
            sort_field,
            sort_direction,
        })
    }
}

/// Query string accepted by the statistics endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStatisticsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl AuditStatisticsQuery {
    pub fn into_range(self) -> AppResult<DateRange> {
        parse_date_range(self.start_date, self.end_date)
    }
}

/// Query string accepted by the security alerts endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SecurityAlertsQuery {
    pub hours: Option<u32>,
}

/// Incoming payload for an on-demand retention sweep.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/retention-sweep-request.ts"
)]
pub struct RetentionSweepRequest {
    #[serde(default)]
    #[ts(optional)]
    pub days: Option<u32>,
}

/// Actor snapshot stored with an audit entry.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-actor-response.ts"
)]
pub struct AuditActorResponse {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// API representation of an audit log entry.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-log-entry-response.ts"
)]
pub struct AuditLogEntryResponse {
    pub id: String,
    pub user: AuditActorResponse,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub method: String,
    pub endpoint: String,
    pub status_code: u16,
    pub success: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[ts(type = "unknown")]
    pub metadata: Option<Value>,
    #[ts(type = "unknown")]
    pub changes: Option<Value>,
    pub error_message: Option<String>,
    #[ts(type = "number")]
    pub duration_ms: u64,
    pub created_at: String,
}

/// Pagination block of a listing.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/pagination-response.ts"
)]
pub struct PaginationResponse {
    pub page: u32,
    pub limit: u32,
    #[ts(type = "number")]
    pub total: u64,
    #[ts(type = "number")]
    pub total_pages: u64,
}

/// One page of audit entries.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-log-page-response.ts"
)]
pub struct AuditLogPageResponse {
    pub success: bool,
    pub data: Vec<AuditLogEntryResponse>,
    pub pagination: PaginationResponse,
}

#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/action-count-response.ts"
)]
pub struct ActionCountResponse {
    pub action: String,
    #[ts(type = "number")]
    pub count: u64,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/resource-type-count-response.ts"
)]
pub struct ResourceTypeCountResponse {
    pub resource_type: String,
    #[ts(type = "number")]
    pub count: u64,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/actor-activity-response.ts"
)]
pub struct ActorActivityResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    #[ts(type = "number")]
    pub count: u64,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/failed-login-summary-response.ts"
)]
pub struct FailedLoginSummaryResponse {
    pub ip_address: Option<String>,
    #[ts(type = "number")]
    pub attempts: u64,
    pub last_attempt: String,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-denied-summary-response.ts"
)]
pub struct AccessDeniedSummaryResponse {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub endpoint: String,
    #[ts(type = "number")]
    pub attempts: u64,
    pub last_attempt: String,
}

/// Dashboard aggregates over a window.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-statistics-response.ts"
)]
pub struct AuditStatisticsResponse {
    #[ts(type = "number")]
    pub total: u64,
    #[ts(type = "number")]
    pub successful: u64,
    #[ts(type = "number")]
    pub failed: u64,
    pub success_rate: f64,
    pub top_actions: Vec<ActionCountResponse>,
    pub by_resource_type: Vec<ResourceTypeCountResponse>,
    pub top_users: Vec<ActorActivityResponse>,
    pub failed_logins_by_ip: Vec<FailedLoginSummaryResponse>,
    pub recent_failures: Vec<AuditLogEntryResponse>,
}

/// Suspicious activity over the lookback window.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/security-alerts-response.ts"
)]
pub struct SecurityAlertsResponse {
    pub since: String,
    pub failed_logins: Vec<FailedLoginSummaryResponse>,
    pub access_denied: Vec<AccessDeniedSummaryResponse>,
    pub system_errors: Vec<AuditLogEntryResponse>,
}

/// Outcome of a retention sweep.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/retention-sweep-response.ts"
)]
pub struct RetentionSweepResponse {
    pub cutoff: String,
    #[ts(type = "number")]
    pub audit_entries_deleted: u64,
    #[ts(type = "number")]
    pub transaction_entries_deleted: u64,
}

impl From<AuditActor> for AuditActorResponse {
    fn from(value: AuditActor) -> Self {
        Self {
            user_id: value.user_id.map(|user_id| user_id.to_string()),
            name: value.name,
            email: value.email,
            role: value.role,
        }
    }
}

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(value: AuditLogEntry) -> Self {
        Self {
            id: value.entry_id.to_string(),
            user: AuditActorResponse::from(value.actor),
            action: value.action.as_str().to_owned(),
            resource_type: value.resource_type.as_str().to_owned(),
            resource_id: value.resource_id,
            resource_name: value.resource_name,
            method: value.method,
            endpoint: value.endpoint,
            status_code: value.status_code,
            success: value.success,
            ip_address: value.ip_address,
            user_agent: value.user_agent,
            metadata: value.metadata,
            changes: value
                .changes
                .map(|changes| json!({ "before": changes.before, "after": changes.after })),
            error_message: value.error_message,
            duration_ms: value.duration_ms,
            created_at: value.created_at.to_rfc3339(),
        }
    }
}

impl From<AuditLogPage> for AuditLogPageResponse {
    fn from(value: AuditLogPage) -> Self {
        let pagination = PaginationResponse {
            page: value.page,
            limit: value.limit,
            total: value.total,
            total_pages: value.total_pages(),
        };

        Self {
            success: true,
            data: value
                .entries
                .into_iter()
                .map(AuditLogEntryResponse::from)
                .collect(),
            pagination,
        }
    }
}

impl From<ActionCount> for ActionCountResponse {
    fn from(value: ActionCount) -> Self {
        Self {
            action: value.action.as_str().to_owned(),
            count: value.count,
        }
    }
}

impl From<ResourceTypeCount> for ResourceTypeCountResponse {
    fn from(value: ResourceTypeCount) -> Self {
        Self {
            resource_type: value.resource_type.as_str().to_owned(),
            count: value.count,
        }
    }
}

impl From<ActorActivity> for ActorActivityResponse {
    fn from(value: ActorActivity) -> Self {
        Self {
            user_id: value.user_id.to_string(),
            email: value.email,
            name: value.name,
            count: value.count,
        }
    }
}

impl From<FailedLoginSummary> for FailedLoginSummaryResponse {
    fn from(value: FailedLoginSummary) -> Self {
        Self {
            ip_address: value.ip_address,
            attempts: value.attempts,
            last_attempt: value.last_attempt.to_rfc3339(),
        }
    }
}

impl From<AccessDeniedSummary> for AccessDeniedSummaryResponse {
    fn from(value: AccessDeniedSummary) -> Self {
        Self {
            user_id: value.user_id.map(|user_id| user_id.to_string()),
            email: value.email,
            endpoint: value.endpoint,
            attempts: value.attempts,
            last_attempt: value.last_attempt.to_rfc3339(),
        }
    }
}

impl From<AuditStatistics> for AuditStatisticsResponse {
    fn from(value: AuditStatistics) -> Self {
        let success_rate = value.success_rate();

        Self {
            total: value.total,
            successful: value.successful,
            failed: value.total.saturating_sub(value.successful),
            success_rate,
            top_actions: value.top_actions.into_iter().map(Into::into).collect(),
            by_resource_type: value.by_resource_type.into_iter().map(Into::into).collect(),
            top_users: value.top_actors.into_iter().map(Into::into).collect(),
            failed_logins_by_ip: value
                .failed_logins_by_ip
                .into_iter()
                .map(Into::into)
                .collect(),
            recent_failures: value.recent_failures.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<SecurityAlerts> for SecurityAlertsResponse {
    fn from(value: SecurityAlerts) -> Self {
        Self {
            since: value.since.to_rfc3339(),
            failed_logins: value.failed_logins.into_iter().map(Into::into).collect(),
            access_denied: value.access_denied.into_iter().map(Into::into).collect(),
            system_errors: value.system_errors.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<RetentionSweepResult> for RetentionSweepResponse {
    fn from(value: RetentionSweepResult) -> Self {
        Self {
            cutoff: value.cutoff.to_rfc3339(),
            audit_entries_deleted: value.audit_entries_deleted,
            transaction_entries_deleted: value.transaction_entries_deleted,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

pub(super) fn parse_date_range(
    start_date: Option<String>,
    end_date: Option<String>,
) -> AppResult<DateRange> {
    Ok(DateRange {
        from: non_blank(start_date)
            .map(|value| parse_date_bound(value.as_str(), NaiveTime::MIN))
            .transpose()?,
        to: non_blank(end_date)
            .map(|value| parse_date_bound(value.as_str(), end_of_day()))
            .transpose()?,
    })
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates, which are pinned
/// to `time_of_day` in UTC.
fn parse_date_bound(value: &str, time_of_day: NaiveTime) -> AppResult<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(time_of_day).and_utc())
        .map_err(|error| AppError::Validation(format!("invalid date '{value}': {error}")))
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}
