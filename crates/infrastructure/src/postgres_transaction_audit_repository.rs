//! PostgreSQL-backed financial audit trail.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use ecclesia_application::{
    AuditActor, NewTransactionAuditEntry, TransactionAuditLogEntry, TransactionAuditPage,
    TransactionAuditQuery, TransactionAuditRepository,
};
use ecclesia_core::{AppError, AppResult, UserId};
use ecclesia_domain::{PaymentMethod, TransactionAuditAction, TransactionType};

const TRANSACTION_COLUMNS: &str = "id, transaction_id, transaction_type, action, actor_id, \
    actor_name, actor_email, actor_role, payment_method, amount_minor, currency, \
    previous_state, new_state, idempotency_key, external_reference, verified_by, verified_at, \
    ip_address, metadata, created_at";

/// PostgreSQL implementation of the transaction audit port.
#[derive(Clone)]
pub struct PostgresTransactionAuditRepository {
    pool: PgPool,
}

impl PostgresTransactionAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TransactionAuditRow {
    id: Uuid,
    transaction_id: String,
    transaction_type: String,
    action: String,
    actor_id: Option<Uuid>,
    actor_name: Option<String>,
    actor_email: Option<String>,
    actor_role: Option<String>,
    payment_method: Option<String>,
    amount_minor: i64,
    currency: String,
    previous_state: Option<Value>,
    new_state: Option<Value>,
    idempotency_key: Option<String>,
    external_reference: Option<String>,
    verified_by: Option<Uuid>,
    verified_at: Option<DateTime<Utc>>,
    ip_address: Option<String>,
    metadata: Option<Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionAuditRow> for TransactionAuditLogEntry {
    type Error = AppError;

    fn try_from(row: TransactionAuditRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, error: AppError| {
            AppError::Internal(format!(
                "invalid stored {field} on transaction audit entry '{}': {error}",
                row.id
            ))
        };

        let transaction_type = TransactionType::from_str(row.transaction_type.as_str())
            .map_err(|error| corrupt("transaction type", error))?;
        let action = TransactionAuditAction::from_str(row.action.as_str())
            .map_err(|error| corrupt("action", error))?;
        let payment_method = row
            .payment_method
            .as_deref()
            .map(PaymentMethod::from_str)
            .transpose()
            .map_err(|error| corrupt("payment method", error))?;

        Ok(Self {
            entry_id: row.id,
            transaction_id: row.transaction_id,
            transaction_type,
            action,
            actor: AuditActor {
                user_id: row.actor_id.map(UserId::from_uuid),
                name: row.actor_name,
                email: row.actor_email,
                role: row.actor_role,
            },
            payment_method,
            amount_minor: row.amount_minor,
            currency: row.currency,
            previous_state: row.previous_state,
            new_state: row.new_state,
            idempotency_key: row.idempotency_key,
            external_reference: row.external_reference,
            verified_by: row.verified_by.map(UserId::from_uuid),
            verified_at: row.verified_at,
            ip_address: row.ip_address,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

fn into_entries(rows: Vec<TransactionAuditRow>) -> AppResult<Vec<TransactionAuditLogEntry>> {
    rows.into_iter()
        .map(TransactionAuditLogEntry::try_from)
        .collect()
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &TransactionAuditQuery) {
    if let Some(transaction_id) = query.transaction_id.clone() {
        builder.push(" AND transaction_id = ");
        builder.push_bind(transaction_id);
    }
    if let Some(transaction_type) = query.transaction_type {
        builder.push(" AND transaction_type = ");
        builder.push_bind(transaction_type.as_str());
    }
    if let Some(action) = query.action {
        builder.push(" AND action = ");
        builder.push_bind(action.as_str());
    }
    if let Some(actor_id) = query.actor_id {
        builder.push(" AND actor_id = ");
        builder.push_bind(actor_id.as_uuid());
    }
    if let Some(from) = query.range.from {
        builder.push(" AND created_at >= ");
        builder.push_bind(from);
    }
    if let Some(to) = query.range.to {
        builder.push(" AND created_at <= ");
        builder.push_bind(to);
    }
}

#[async_trait]
impl TransactionAuditRepository for PostgresTransactionAuditRepository {
    async fn append_entry(
        &self,
        entry: NewTransactionAuditEntry,
    ) -> AppResult<TransactionAuditLogEntry> {
        let row = sqlx::query_as::<_, TransactionAuditRow>(&format!(
            r#"
            INSERT INTO transaction_audit_logs (
                transaction_id, transaction_type, action, actor_id, actor_name, actor_email,
                actor_role, payment_method, amount_minor, currency, previous_state, new_state,
                idempotency_key, external_reference, verified_by, verified_at, ip_address,
                metadata
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18
            )
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(entry.transaction_id.as_str())
        .bind(entry.transaction_type.as_str())
        .bind(entry.action.as_str())
        .bind(entry.actor.user_id.map(|user_id| user_id.as_uuid()))
        .bind(entry.actor.name)
        .bind(entry.actor.email)
        .bind(entry.actor.role)
        .bind(entry.payment_method.map(|method| method.as_str()))
        .bind(entry.amount_minor)
        .bind(entry.currency)
        .bind(entry.previous_state)
        .bind(entry.new_state)
        .bind(entry.idempotency_key.clone())
        .bind(entry.external_reference)
        .bind(entry.verified_by.map(|user_id| user_id.as_uuid()))
        .bind(entry.verified_at)
        .bind(entry.ip_address)
        .bind(entry.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            if let sqlx::Error::Database(database_error) = &error
                && database_error.code().as_deref() == Some("23505")
            {
                return AppError::Conflict(format!(
                    "transaction audit entry for key '{}' and action '{}' already exists",
                    entry.idempotency_key.as_deref().unwrap_or_default(),
                    entry.action
                ));
            }
            AppError::Internal(format!("failed to append transaction audit entry: {error}"))
        })?;

        TransactionAuditLogEntry::try_from(row)
    }

    async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
        action: TransactionAuditAction,
    ) -> AppResult<Option<TransactionAuditLogEntry>> {
        let row = sqlx::query_as::<_, TransactionAuditRow>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transaction_audit_logs
            WHERE idempotency_key = $1 AND action = $2
            "#
        ))
        .bind(idempotency_key)
        .bind(action.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find transaction audit entry by idempotency key: {error}"
            ))
        })?;

        row.map(TransactionAuditLogEntry::try_from).transpose()
    }

    async fn list_entries(&self, query: &TransactionAuditQuery) -> AppResult<TransactionAuditPage> {
        let offset = i64::try_from(query.offset()).map_err(|error| {
            AppError::Validation(format!("invalid transaction audit page: {error}"))
        })?;

        let mut count_builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM transaction_audit_logs WHERE TRUE");
        push_filters(&mut count_builder, query);
        let total = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to count transaction audit entries: {error}"))
            })?;

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transaction_audit_logs WHERE TRUE"
        ));
        push_filters(&mut builder, query);
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(i64::from(query.limit));
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder
            .build_query_as::<TransactionAuditRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list transaction audit entries: {error}"))
            })?;

        Ok(TransactionAuditPage {
            entries: into_entries(rows)?,
            total: u64::try_from(total).unwrap_or_default(),
            page: query.page,
            limit: query.limit,
        })
    }

    async fn history_for_transaction(
        &self,
        transaction_id: &str,
    ) -> AppResult<Vec<TransactionAuditLogEntry>> {
        let rows = sqlx::query_as::<_, TransactionAuditRow>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transaction_audit_logs
            WHERE transaction_id = $1
            ORDER BY created_at, id
            "#
        ))
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load history for transaction '{transaction_id}': {error}"
            ))
        })?;

        into_entries(rows)
    }

    async fn purge_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
        eligible_actions: &[TransactionAuditAction],
    ) -> AppResult<u64> {
        let eligible = eligible_actions
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
            DELETE FROM transaction_audit_logs
            WHERE created_at < $1
                AND action = ANY($2)
            "#,
        )
        .bind(cutoff)
        .bind(eligible)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to purge transaction audit entries: {error}"))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(result.rows_affected())
    }
}
