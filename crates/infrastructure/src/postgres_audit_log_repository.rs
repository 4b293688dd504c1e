//! PostgreSQL-backed HTTP audit trail.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use ecclesia_application::{
    AuditActor, AuditLogEntry, AuditLogFilter, AuditLogPage, AuditLogQuery, AuditLogRepository,
    AuditStatistics, ChangeSnapshot, DateRange, NewAuditLogEntry, SecurityAlerts,
};
use ecclesia_core::{AppError, AppResult, UserId};
use ecclesia_domain::{AuditAction, ResourceType};

mod aggregates;

const AUDIT_COLUMNS: &str = "id, actor_id, actor_name, actor_email, actor_role, action, \
    resource_type, resource_id, resource_name, method, endpoint, status_code, success, \
    ip_address, user_agent, metadata, changes_before, changes_after, error_message, \
    duration_ms, created_at";

/// PostgreSQL implementation of the append-only audit log port.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: Uuid,
    actor_id: Option<Uuid>,
    actor_name: Option<String>,
    actor_email: Option<String>,
    actor_role: Option<String>,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    resource_name: Option<String>,
    method: String,
    endpoint: String,
    status_code: i32,
    success: bool,
    ip_address: Option<String>,
    user_agent: Option<String>,
    metadata: Option<Value>,
    changes_before: Option<Value>,
    changes_after: Option<Value>,
    error_message: Option<String>,
    duration_ms: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditLogRow> for AuditLogEntry {
    type Error = AppError;

    fn try_from(row: AuditLogRow) -> Result<Self, Self::Error> {
        let action = AuditAction::from_str(row.action.as_str()).map_err(|error| {
            AppError::Internal(format!("invalid stored audit action on '{}': {error}", row.id))
        })?;
        let resource_type = ResourceType::from_str(row.resource_type.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "invalid stored resource type on '{}': {error}",
                row.id
            ))
        })?;
        let changes = (row.changes_before.is_some() || row.changes_after.is_some()).then(|| {
            ChangeSnapshot {
                before: row.changes_before,
                after: row.changes_after,
            }
        });

        Ok(Self {
            entry_id: row.id,
            actor: AuditActor {
                user_id: row.actor_id.map(UserId::from_uuid),
                name: row.actor_name,
                email: row.actor_email,
                role: row.actor_role,
            },
            action,
            resource_type,
            resource_id: row.resource_id,
            resource_name: row.resource_name,
            method: row.method,
            endpoint: row.endpoint,
            status_code: u16::try_from(row.status_code).unwrap_or_default(),
            success: row.success,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            metadata: row.metadata,
            changes,
            error_message: row.error_message,
            duration_ms: u64::try_from(row.duration_ms).unwrap_or_default(),
            created_at: row.created_at,
        })
    }
}

fn into_entries(rows: Vec<AuditLogRow>) -> AppResult<Vec<AuditLogEntry>> {
    rows.into_iter().map(AuditLogEntry::try_from).collect()
}

/// Escapes `LIKE` metacharacters so user input matches literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &AuditLogFilter) {
    if let Some(actor_id) = filter.actor_id {
        builder.push(" AND actor_id = ");
        builder.push_bind(actor_id.as_uuid());
    }
    if let Some(action) = filter.action {
        builder.push(" AND action = ");
        builder.push_bind(action.as_str());
    }
    if let Some(resource_type) = filter.resource_type {
        builder.push(" AND resource_type = ");
        builder.push_bind(resource_type.as_str());
    }
    if let Some(success) = filter.success {
        builder.push(" AND success = ");
        builder.push_bind(success);
    }
    if let Some(from) = filter.range.from {
        builder.push(" AND created_at >= ");
        builder.push_bind(from);
    }
    if let Some(to) = filter.range.to {
        builder.push(" AND created_at <= ");
        builder.push_bind(to);
    }
    if let Some(ip_address) = filter.ip_address.clone() {
        builder.push(" AND ip_address = ");
        builder.push_bind(ip_address);
    }
    if let Some(search) = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|search| !search.is_empty())
    {
        let pattern = like_pattern(search);
        builder.push(" AND (actor_email ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR actor_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR endpoint ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR resource_name ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn append_entry(&self, entry: NewAuditLogEntry) -> AppResult<AuditLogEntry> {
        let (changes_before, changes_after) = entry
            .changes
            .map(|changes| (changes.before, changes.after))
            .unwrap_or_default();

        let row = sqlx::query_as::<_, AuditLogRow>(&format!(
            r#"
            INSERT INTO audit_logs (
                actor_id, actor_name, actor_email, actor_role, action, resource_type,
                resource_id, resource_name, method, endpoint, status_code, success,
                ip_address, user_agent, metadata, changes_before, changes_after,
                error_message, duration_ms
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
            RETURNING {AUDIT_COLUMNS}
            "#
        ))
        .bind(entry.actor.user_id.map(|user_id| user_id.as_uuid()))
        .bind(entry.actor.name)
        .bind(entry.actor.email)
        .bind(entry.actor.role)
        .bind(entry.action.as_str())
        .bind(entry.resource_type.as_str())
        .bind(entry.resource_id)
        .bind(entry.resource_name)
        .bind(entry.method)
        .bind(entry.endpoint)
        .bind(i32::from(entry.status_code))
        .bind(entry.success)
        .bind(entry.ip_address)
        .bind(entry.user_agent)
        .bind(entry.metadata)
        .bind(changes_before)
        .bind(changes_after)
        .bind(entry.error_message)
        .bind(i64::try_from(entry.duration_ms).unwrap_or(i64::MAX))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit entry: {error}")))?;

        AuditLogEntry::try_from(row)
    }

    async fn list_entries(&self, query: &AuditLogQuery) -> AppResult<AuditLogPage> {
        let limit = i64::from(query.limit);
        let offset = i64::try_from(query.offset()).map_err(|error| {
            AppError::Validation(format!("invalid audit log page: {error}"))
        })?;

        let mut count_builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM audit_logs WHERE TRUE");
        push_filters(&mut count_builder, &query.filter);
        let total = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to count audit log entries: {error}"))
            })?;

        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE TRUE"));
        push_filters(&mut builder, &query.filter);
        // Sort column and direction come from closed enums, never from input text.
        builder.push(format!(
            " ORDER BY {} {}, id {}",
            query.sort_field.column(),
            query.sort_direction.as_sql(),
            query.sort_direction.as_sql()
        ));
        builder.push(" LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder
            .build_query_as::<AuditLogRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list audit log entries: {error}"))
            })?;

        Ok(AuditLogPage {
            entries: into_entries(rows)?,
            total: u64::try_from(total).unwrap_or_default(),
            page: query.page,
            limit: query.limit,
        })
    }

    async fn export_entries(
        &self,
        filter: &AuditLogFilter,
        max_rows: usize,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE TRUE"));
        push_filters(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(i64::try_from(max_rows).unwrap_or(i64::MAX));

        let rows = builder
            .build_query_as::<AuditLogRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to export audit log entries: {error}"))
            })?;

        into_entries(rows)
    }

    async fn statistics(&self, range: &DateRange, top_n: usize) -> AppResult<AuditStatistics> {
        self.statistics_impl(range, top_n).await
    }

    async fn security_alerts(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<SecurityAlerts> {
        self.security_alerts_impl(since, limit).await
    }

    async fn purge_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
        protected_actions: &[AuditAction],
    ) -> AppResult<u64> {
        let protected = protected_actions
            .iter()
            .map(|action| action.as_str().to_owned())
            .collect::<Vec<_>>();

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        sqlx::query("SET LOCAL ecclesia.audit_retention = 'on'")
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to enable audit retention: {error}"))
            })?;

        let result = sqlx::query(
            r#"
            DELETE FROM audit_logs
            WHERE created_at < $1
                AND NOT (action = ANY($2))
            "#,
        )
        .bind(cutoff)
        .bind(protected)
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to purge audit entries: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(result.rows_affected())
    }
}
