use chrono::{DateTime, Utc};
use serde::Deserialize;

use ecclesia_core::UserId;
use ecclesia_domain::{AuditAction, ResourceType};

use super::entries::AuditLogEntry;

/// Page size used when the caller does not pass one.
pub const AUDIT_QUERY_DEFAULT_LIMIT: u32 = 50;

/// Largest accepted page size.
pub const AUDIT_QUERY_MAX_LIMIT: u32 = 100;

/// Sortable audit columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditSortField {
    /// Write timestamp.
    #[default]
    CreatedAt,
    /// Action token.
    Action,
    /// Resource type token.
    ResourceType,
    /// Response status code.
    StatusCode,
    /// Handling duration.
    DurationMs,
    /// Actor email snapshot.
    ActorEmail,
    /// Client IP address.
    IpAddress,
    /// HTTP method.
    Method,
    /// Request path.
    Endpoint,
    /// Success flag.
    Success,
    /// Resource identifier.
    ResourceId,
    /// Resource display name.
    ResourceName,
    /// Actor identifier.
    ActorId,
    /// Actor display name snapshot.
    ActorName,
    /// Actor role snapshot.
    ActorRole,
    /// Client user agent.
    UserAgent,
    /// Error detail.
    ErrorMessage,
}

impl AuditSortField {
    /// Returns the storage column this field sorts on.
    #[must_use]
    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Action => "action",
            Self::ResourceType => "resource_type",
            Self::StatusCode => "status_code",
            Self::DurationMs => "duration_ms",
            Self::ActorEmail => "actor_email",
            Self::IpAddress => "ip_address",
            Self::Method => "method",
            Self::Endpoint => "endpoint",
            Self::Success => "success",
            Self::ResourceId => "resource_id",
            Self::ResourceName => "resource_name",
            Self::ActorId => "actor_id",
            Self::ActorName => "actor_name",
            Self::ActorRole => "actor_role",
            Self::UserAgent => "user_agent",
            Self::ErrorMessage => "error_message",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Oldest or smallest first.
    Asc,
    /// Newest or largest first.
    #[default]
    Desc,
}

impl SortDirection {
    /// Returns the SQL keyword.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Optional inclusive time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// Lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Upper bound.
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Returns whether the timestamp falls inside the window.
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| timestamp >= from) && self.to.is_none_or(|to| timestamp <= to)
    }
}

/// Filters shared by listing and export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLogFilter {
    /// Acting user.
    pub actor_id: Option<UserId>,
    /// Action token.
    pub action: Option<AuditAction>,
    /// Resource type.
    pub resource_type: Option<ResourceType>,
    /// Success flag.
    pub success: Option<bool>,
    /// Time window.
    pub range: DateRange,
    /// Exact client IP.
    pub ip_address: Option<String>,
    /// Case-insensitive text matched against actor email, actor name,
    /// endpoint and resource name.
    pub search: Option<String>,
}

/// Paginated, sorted audit listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Filters.
    pub filter: AuditLogFilter,
    /// One-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Sort column.
    pub sort_field: AuditSortField,
    /// Sort direction.
    pub sort_direction: SortDirection,
}

impl Default for AuditLogQuery {
    fn default() -> Self {
        Self {
            filter: AuditLogFilter::default(),
            page: 1,
            limit: AUDIT_QUERY_DEFAULT_LIMIT,
            sort_field: AuditSortField::default(),
            sort_direction: SortDirection::default(),
        }
    }
}

impl AuditLogQuery {
    /// Clamps the page to at least 1 and the limit to `1..=100`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, AUDIT_QUERY_MAX_LIMIT);
        self
    }

    /// Rows skipped before the current page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of audit entries.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogPage {
    /// Entries on this page.
    pub entries: Vec<AuditLogEntry>,
    /// Matching entries across all pages.
    pub total: u64,
    /// One-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

impl AuditLogPage {
    /// Number of pages needed for `total` entries.
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }
}

/// Count of entries for one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCount {
    /// Action token.
    pub action: AuditAction,
    /// Entry count.
    pub count: u64,
}

/// Count of entries for one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeCount {
    /// Resource type.
    pub resource_type: ResourceType,
    /// Entry count.
    pub count: u64,
}

/// Activity volume of one actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorActivity {
    /// Acting user.
    pub user_id: UserId,
    /// Most recent email snapshot.
    pub email: Option<String>,
    /// Most recent name snapshot.
    pub name: Option<String>,
    /// Entry count.
    pub count: u64,
}

/// Failed logins from one client IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedLoginSummary {
    /// Client IP, absent when it was not captured.
    pub ip_address: Option<String>,
    /// Number of failed attempts.
    pub attempts: u64,
    /// Most recent attempt.
    pub last_attempt: DateTime<Utc>,
}

/// Access denials for one actor and endpoint pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDeniedSummary {
    /// Acting user, absent for anonymous callers.
    pub user_id: Option<UserId>,
    /// Email snapshot.
    pub email: Option<String>,
    /// Denied endpoint.
    pub endpoint: String,
    /// Number of denials.
    pub attempts: u64,
    /// Most recent denial.
    pub last_attempt: DateTime<Utc>,
}

/// Dashboard aggregates over a time window.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditStatistics {
    /// Entries in the window.
    pub total: u64,
    /// Successful entries in the window.
    pub successful: u64,
    /// Most frequent actions.
    pub top_actions: Vec<ActionCount>,
    /// Entry counts per resource type.
    pub by_resource_type: Vec<ResourceTypeCount>,
    /// Most active authenticated actors.
    pub top_actors: Vec<ActorActivity>,
    /// Failed logins grouped by IP.
    pub failed_logins_by_ip: Vec<FailedLoginSummary>,
    /// Most recent failed entries.
    pub recent_failures: Vec<AuditLogEntry>,
}

impl AuditStatistics {
    /// Success percentage rounded to two decimals; `0` for an empty window.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        let rate = self.successful as f64 * 100.0 / self.total as f64;
        (rate * 100.0).round() / 100.0
    }
}

/// Security-relevant groupings over a lookback window.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityAlerts {
    /// Start of the lookback window.
    pub since: DateTime<Utc>,
    /// Failed logins grouped by IP.
    pub failed_logins: Vec<FailedLoginSummary>,
    /// Access denials grouped by actor and endpoint.
    pub access_denied: Vec<AccessDeniedSummary>,
    /// Entries with a 5xx status.
    pub system_errors: Vec<AuditLogEntry>,
}
