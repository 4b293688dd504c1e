use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ecclesia_core::AppResult;
use ecclesia_domain::{AuditAction, TransactionAuditAction};

use super::entries::{AuditLogEntry, NewAuditLogEntry};
use super::queries::{
    AuditLogFilter, AuditLogPage, AuditLogQuery, AuditStatistics, DateRange, SecurityAlerts,
};
use super::transactions::{
    NewTransactionAuditEntry, TransactionAuditLogEntry, TransactionAuditPage,
    TransactionAuditQuery,
};

/// Append-only store for the HTTP audit trail.
///
/// No operation edits or removes a single entry.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Appends one entry.
    async fn append_entry(&self, entry: NewAuditLogEntry) -> AppResult<AuditLogEntry>;

    /// Lists one page of entries matching the query.
    async fn list_entries(&self, query: &AuditLogQuery) -> AppResult<AuditLogPage>;

    /// Returns at most `max_rows` matching entries, newest first.
    async fn export_entries(
        &self,
        filter: &AuditLogFilter,
        max_rows: usize,
    ) -> AppResult<Vec<AuditLogEntry>>;

    /// Computes dashboard aggregates; each top list holds at most `top_n` rows.
    async fn statistics(&self, range: &DateRange, top_n: usize) -> AppResult<AuditStatistics>;

    /// Groups security-relevant entries written since `since`; each list
    /// holds at most `limit` rows.
    async fn security_alerts(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<SecurityAlerts>;

    /// Deletes entries written before `cutoff` whose action is not protected.
    async fn purge_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
        protected_actions: &[AuditAction],
    ) -> AppResult<u64>;
}

/// Append-only store for the financial audit trail.
#[async_trait]
pub trait TransactionAuditRepository: Send + Sync {
    /// Appends one entry.
    ///
    /// A second entry with the same idempotency key and action fails with
    /// `Conflict`.
    async fn append_entry(
        &self,
        entry: NewTransactionAuditEntry,
    ) -> AppResult<TransactionAuditLogEntry>;

    /// Finds the entry previously written for an idempotency key and action.
    async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
        action: TransactionAuditAction,
    ) -> AppResult<Option<TransactionAuditLogEntry>>;

    /// Lists one page of entries, newest first.
    async fn list_entries(&self, query: &TransactionAuditQuery) -> AppResult<TransactionAuditPage>;

    /// Returns every entry for one transaction, oldest first.
    async fn history_for_transaction(
        &self,
        transaction_id: &str,
    ) -> AppResult<Vec<TransactionAuditLogEntry>>;

    /// Deletes entries written before `cutoff` whose action is listed.
    async fn purge_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
        eligible_actions: &[TransactionAuditAction],
    ) -> AppResult<u64>;
}
