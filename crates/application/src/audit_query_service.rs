//! Read side of the audit trail plus retention.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use ecclesia_core::{AppError, AppResult, UserIdentity};
use ecclesia_domain::{NON_CRITICAL_TRANSACTION_ACTIONS, PROTECTED_AUDIT_ACTIONS, Permission};

use crate::{
    AuditLogEntry, AuditLogFilter, AuditLogPage, AuditLogQuery, AuditLogRepository,
    AuditStatistics, AuthorizationService, DateRange, SecurityAlerts, TransactionAuditRepository,
};

/// Retention window applied when the caller does not pass one.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Export row cap applied when configuration does not override it.
pub const DEFAULT_EXPORT_MAX_ROWS: usize = 10_000;

/// Length of each top list in the statistics view.
pub const STATISTICS_TOP_N: usize = 10;

/// Lookback used by security alerts when the caller does not pass one.
pub const SECURITY_ALERT_DEFAULT_LOOKBACK_HOURS: u32 = 24;

/// Length of each security alert list.
pub const SECURITY_ALERT_LIMIT: usize = 20;

const CSV_HEADER: &str = "Timestamp,User,Email,Role,Action,Resource Type,Resource ID,Method,Endpoint,Status,IP Address,Success";

/// Rendered CSV export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditExport {
    /// CSV document including the header line.
    pub content: String,
    /// Data rows written.
    pub row_count: usize,
    /// Whether matching rows were left out because of the row cap.
    pub truncated: bool,
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionSweepResult {
    /// Entries written before this instant were eligible.
    pub cutoff: DateTime<Utc>,
    /// HTTP audit entries removed.
    pub audit_entries_deleted: u64,
    /// Non-critical financial audit entries removed.
    pub transaction_entries_deleted: u64,
}

/// Application service for audit listing, aggregates, export and retention.
#[derive(Clone)]
pub struct AuditQueryService {
    authorization_service: AuthorizationService,
    audit_log_repository: Arc<dyn AuditLogRepository>,
    transaction_audit_repository: Arc<dyn TransactionAuditRepository>,
    export_max_rows: usize,
}

impl AuditQueryService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        audit_log_repository: Arc<dyn AuditLogRepository>,
        transaction_audit_repository: Arc<dyn TransactionAuditRepository>,
        export_max_rows: usize,
    ) -> Self {
        Self {
            authorization_service,
            audit_log_repository,
            transaction_audit_repository,
            export_max_rows: export_max_rows.max(1),
        }
    }

    /// Lists one page of audit entries.
    pub async fn list_audit_logs(
        &self,
        actor: &UserIdentity,
        query: AuditLogQuery,
    ) -> AppResult<AuditLogPage> {
        self.require_audit_read_permission(actor).await?;
        self.audit_log_repository
            .list_entries(&query.normalized())
            .await
    }

    /// Computes dashboard aggregates over an optional window.
    pub async fn statistics(
        &self,
        actor: &UserIdentity,
        range: DateRange,
    ) -> AppResult<AuditStatistics> {
        self.require_audit_read_permission(actor).await?;
        validate_range(&range)?;
        self.audit_log_repository
            .statistics(&range, STATISTICS_TOP_N)
            .await
    }

    /// Groups failed logins, denials and server errors over the lookback.
    pub async fn security_alerts(
        &self,
        actor: &UserIdentity,
        lookback_hours: Option<u32>,
    ) -> AppResult<SecurityAlerts> {
        self.require_audit_read_permission(actor).await?;

        let hours = lookback_hours.unwrap_or(SECURITY_ALERT_DEFAULT_LOOKBACK_HOURS);
        if hours == 0 {
            return Err(AppError::Validation(
                "lookback hours must be greater than zero".to_owned(),
            ));
        }

        let since =
            instant_before_now(Duration::try_hours(i64::from(hours)), "lookback hours")?;
        self.audit_log_repository
            .security_alerts(since, SECURITY_ALERT_LIMIT)
            .await
    }

    /// Renders matching entries as CSV, newest first, up to the row cap.
    pub async fn export_csv(
        &self,
        actor: &UserIdentity,
        filter: AuditLogFilter,
    ) -> AppResult<AuditExport> {
        self.require_audit_read_permission(actor).await?;
        validate_range(&filter.range)?;

        let mut entries = self
            .audit_log_repository
            .export_entries(&filter, self.export_max_rows + 1)
            .await?;
        let truncated = entries.len() > self.export_max_rows;
        entries.truncate(self.export_max_rows);

        let content = render_csv(&entries);
        info!(
            actor = %actor.user_id(),
            rows = entries.len(),
            truncated,
            "audit log exported"
        );

        Ok(AuditExport {
            content,
            row_count: entries.len(),
            truncated,
        })
    }

    /// Runs a retention sweep on behalf of an admin.
    pub async fn run_retention_sweep(
        &self,
        actor: &UserIdentity,
        retention_days: Option<u32>,
    ) -> AppResult<RetentionSweepResult> {
        self.authorization_service.require_admin(actor).await?;
        let result = self
            .sweep_retention(retention_days.unwrap_or(DEFAULT_RETENTION_DAYS))
            .await?;
        info!(actor = %actor.user_id(), "retention sweep requested by admin");
        Ok(result)
    }

    /// Deletes aged entries that are not protected.
    ///
    /// This is the unattended entry point used by the scheduled worker; it
    /// performs no authorization.
    pub async fn sweep_retention(&self, retention_days: u32) -> AppResult<RetentionSweepResult> {
        if retention_days == 0 {
            return Err(AppError::Validation(
                "retention days must be greater than zero".to_owned(),
            ));
        }

        let cutoff =
            instant_before_now(Duration::try_days(i64::from(retention_days)), "retention days")?;
        let audit_entries_deleted = self
            .audit_log_repository
            .purge_entries_older_than(cutoff, PROTECTED_AUDIT_ACTIONS)
            .await?;
        let transaction_entries_deleted = self
            .transaction_audit_repository
            .purge_entries_older_than(cutoff, NON_CRITICAL_TRANSACTION_ACTIONS)
            .await?;

        info!(
            %cutoff,
            audit_entries_deleted,
            transaction_entries_deleted,
            "audit retention sweep completed"
        );

        Ok(RetentionSweepResult {
            cutoff,
            audit_entries_deleted,
            transaction_entries_deleted,
        })
    }

    async fn require_audit_read_permission(&self, actor: &UserIdentity) -> AppResult<()> {
        self.authorization_service
            .require_permission(actor, Permission::ViewAuditLogs)
            .await?;
        Ok(())
    }
}

fn validate_range(range: &DateRange) -> AppResult<()> {
    if let (Some(from), Some(to)) = (range.from, range.to)
        && from > to
    {
        return Err(AppError::Validation(
            "date range start must not be after its end".to_owned(),
        ));
    }
    Ok(())
}

/// Subtracts a caller-supplied window from the clock, rejecting windows that
/// fall outside the representable date range.
fn instant_before_now(window: Option<Duration>, label: &str) -> AppResult<DateTime<Utc>> {
    window
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| AppError::Validation(format!("{label} is out of range")))
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn render_csv(entries: &[AuditLogEntry]) -> String {
    let mut content = String::from(CSV_HEADER);
    content.push('\n');

    for entry in entries {
        let fields = [
            entry.created_at.to_rfc3339(),
            entry
                .actor
                .name
                .clone()
                .unwrap_or_else(|| "Anonymous".to_owned()),
            entry.actor.email.clone().unwrap_or_default(),
            entry.actor.role.clone().unwrap_or_default(),
            entry.action.as_str().to_owned(),
            entry.resource_type.as_str().to_owned(),
            entry.resource_id.clone().unwrap_or_default(),
            entry.method.clone(),
            entry.endpoint.clone(),
            entry.status_code.to_string(),
            entry.ip_address.clone().unwrap_or_default(),
            if entry.success { "Yes" } else { "No" }.to_owned(),
        ];

        let line = fields
            .iter()
            .map(|field| csv_field(field))
            .collect::<Vec<_>>()
            .join(",");
        content.push_str(&line);
        content.push('\n');
    }

    content
}

#[cfg(test)]
mod tests;
