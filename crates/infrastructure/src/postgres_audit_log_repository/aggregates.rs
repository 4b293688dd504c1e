use ecclesia_application::{
    AccessDeniedSummary, ActionCount, ActorActivity, FailedLoginSummary, ResourceTypeCount,
};

use super::*;

#[derive(Debug, FromRow)]
struct TotalsRow {
    total: i64,
    successful: i64,
}

#[derive(Debug, FromRow)]
struct KeyCountRow {
    key: String,
    count: i64,
}

#[derive(Debug, FromRow)]
struct ActorActivityRow {
    actor_id: Uuid,
    email: Option<String>,
    name: Option<String>,
    count: i64,
}

#[derive(Debug, FromRow)]
struct FailedLoginRow {
    ip_address: Option<String>,
    attempts: i64,
    last_attempt: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct AccessDeniedRow {
    actor_id: Option<Uuid>,
    email: Option<String>,
    endpoint: String,
    attempts: i64,
    last_attempt: DateTime<Utc>,
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn to_limit(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn stored<T>(value: &str) -> AppResult<T>
where
    T: FromStr<Err = AppError>,
{
    T::from_str(value)
        .map_err(|error| AppError::Internal(format!("invalid stored audit value: {error}")))
}

impl PostgresAuditLogRepository {
    pub(super) async fn statistics_impl(
        &self,
        range: &DateRange,
        top_n: usize,
    ) -> AppResult<AuditStatistics> {
        let totals = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE success) AS successful
            FROM audit_logs
            WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
                AND ($2::TIMESTAMPTZ IS NULL OR created_at <= $2)
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count audit entries: {error}")))?;

        let top_actions = self
            .count_by_column("action", range, top_n)
            .await?
            .into_iter()
            .map(|row| {
                stored::<AuditAction>(row.key.as_str()).map(|action| ActionCount {
                    action,
                    count: to_count(row.count),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        let by_resource_type = self
            .count_by_column("resource_type", range, usize::MAX)
            .await?
            .into_iter()
            .map(|row| {
                stored::<ResourceType>(row.key.as_str()).map(|resource_type| ResourceTypeCount {
                    resource_type,
                    count: to_count(row.count),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        let top_actors = sqlx::query_as::<_, ActorActivityRow>(
            r#"
            SELECT
                actor_id,
                (array_agg(actor_email ORDER BY created_at DESC))[1] AS email,
                (array_agg(actor_name ORDER BY created_at DESC))[1] AS name,
                COUNT(*) AS count
            FROM audit_logs
            WHERE actor_id IS NOT NULL
                AND ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
                AND ($2::TIMESTAMPTZ IS NULL OR created_at <= $2)
            GROUP BY actor_id
            ORDER BY count DESC, actor_id
            LIMIT $3
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .bind(to_limit(top_n))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to rank audit actors: {error}")))?
        .into_iter()
        .map(|row| ActorActivity {
            user_id: UserId::from_uuid(row.actor_id),
            email: row.email,
            name: row.name,
            count: to_count(row.count),
        })
        .collect();

        let failed_logins_by_ip = self.failed_logins(range.from, range.to, top_n).await?;

        let recent_failures = sqlx::query_as::<_, AuditLogRow>(&format!(
            r#"
            SELECT {AUDIT_COLUMNS}
            FROM audit_logs
            WHERE NOT success
                AND ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
                AND ($2::TIMESTAMPTZ IS NULL OR created_at <= $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#
        ))
        .bind(range.from)
        .bind(range.to)
        .bind(to_limit(top_n))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list recent failures: {error}")))?;

        Ok(AuditStatistics {
            total: to_count(totals.total),
            successful: to_count(totals.successful),
            top_actions,
            by_resource_type,
            top_actors,
            failed_logins_by_ip,
            recent_failures: into_entries(recent_failures)?,
        })
    }

    pub(super) async fn security_alerts_impl(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<SecurityAlerts> {
        let failed_logins = self.failed_logins(Some(since), None, limit).await?;

        let access_denied = sqlx::query_as::<_, AccessDeniedRow>(
            r#"
            SELECT
                actor_id,
                (array_agg(actor_email ORDER BY created_at DESC))[1] AS email,
                endpoint,
                COUNT(*) AS attempts,
                MAX(created_at) AS last_attempt
            FROM audit_logs
            WHERE action = $1
                AND created_at >= $2
            GROUP BY actor_id, endpoint
            ORDER BY attempts DESC, last_attempt DESC
            LIMIT $3
            "#,
        )
        .bind(AuditAction::SystemAccessDenied.as_str())
        .bind(since)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to group access denials: {error}")))?
        .into_iter()
        .map(|row| AccessDeniedSummary {
            user_id: row.actor_id.map(UserId::from_uuid),
            email: row.email,
            endpoint: row.endpoint,
            attempts: to_count(row.attempts),
            last_attempt: row.last_attempt,
        })
        .collect();

        let system_errors = sqlx::query_as::<_, AuditLogRow>(&format!(
            r#"
            SELECT {AUDIT_COLUMNS}
            FROM audit_logs
            WHERE status_code >= 500
                AND created_at >= $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        ))
        .bind(since)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list system errors: {error}")))?;

        Ok(SecurityAlerts {
            since,
            failed_logins,
            access_denied,
            system_errors: into_entries(system_errors)?,
        })
    }

    async fn count_by_column(
        &self,
        column: &'static str,
        range: &DateRange,
        limit: usize,
    ) -> AppResult<Vec<KeyCountRow>> {
        sqlx::query_as::<_, KeyCountRow>(&format!(
            r#"
            SELECT {column} AS key, COUNT(*) AS count
            FROM audit_logs
            WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
                AND ($2::TIMESTAMPTZ IS NULL OR created_at <= $2)
            GROUP BY {column}
            ORDER BY count DESC, key
            LIMIT $3
            "#
        ))
        .bind(range.from)
        .bind(range.to)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to count audit entries by {column}: {error}"))
        })
    }

    async fn failed_logins(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> AppResult<Vec<FailedLoginSummary>> {
        let rows = sqlx::query_as::<_, FailedLoginRow>(
            r#"
            SELECT
                ip_address,
                COUNT(*) AS attempts,
                MAX(created_at) AS last_attempt
            FROM audit_logs
            WHERE action = $1
                AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
                AND ($3::TIMESTAMPTZ IS NULL OR created_at <= $3)
            GROUP BY ip_address
            ORDER BY attempts DESC, last_attempt DESC
            LIMIT $4
            "#,
        )
        .bind(AuditAction::AuthLoginFailed.as_str())
        .bind(from)
        .bind(to)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to group failed logins: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|row| FailedLoginSummary {
                ip_address: row.ip_address,
                attempts: to_count(row.attempts),
                last_attempt: row.last_attempt,
            })
            .collect())
    }
}
