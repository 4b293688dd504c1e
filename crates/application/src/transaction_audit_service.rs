//! Financial transaction audit trail.
//!
//! Unlike the HTTP audit recorder, writes here are part of the caller's
//! operation: a failed write is returned to the caller.

use std::sync::Arc;

use tracing::{debug, info};

use ecclesia_core::{AppError, AppResult, UserIdentity};
use ecclesia_domain::Permission;

use crate::{
    AuthorizationService, NewTransactionAuditEntry, TransactionAuditLogEntry,
    TransactionAuditPage, TransactionAuditQuery, TransactionAuditRepository,
};

/// Application service for the financial audit trail.
#[derive(Clone)]
pub struct TransactionAuditService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn TransactionAuditRepository>,
}

impl TransactionAuditService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn TransactionAuditRepository>,
    ) -> Self {
        Self {
            authorization_service,
            repository,
        }
    }

    /// Appends one step of a transaction's history.
    ///
    /// A retried write carrying an idempotency key already recorded for the
    /// same action returns the stored entry instead of writing twice.
    pub async fn record(
        &self,
        entry: NewTransactionAuditEntry,
    ) -> AppResult<TransactionAuditLogEntry> {
        let entry = normalize_entry(entry)?;

        if let Some(key) = entry.idempotency_key.as_deref()
            && let Some(existing) = self
                .repository
                .find_by_idempotency_key(key, entry.action)
                .await?
        {
            debug!(
                transaction_id = %existing.transaction_id,
                action = %existing.action,
                "transaction audit write deduplicated"
            );
            return Ok(existing);
        }

        let key = entry.idempotency_key.clone();
        let action = entry.action;
        match self.repository.append_entry(entry).await {
            Ok(stored) => {
                info!(
                    transaction_id = %stored.transaction_id,
                    action = %stored.action,
                    "transaction audit entry recorded"
                );
                Ok(stored)
            }
            Err(AppError::Conflict(message)) => {
                // Lost a race with a concurrent retry of the same step.
                let Some(key) = key else {
                    return Err(AppError::Conflict(message));
                };
                self.repository
                    .find_by_idempotency_key(key.as_str(), action)
                    .await?
                    .ok_or(AppError::Conflict(message))
            }
            Err(error) => Err(error),
        }
    }

    /// Lists one page of financial audit entries.
    pub async fn list(
        &self,
        actor: &UserIdentity,
        query: TransactionAuditQuery,
    ) -> AppResult<TransactionAuditPage> {
        self.require_transaction_log_permission(actor).await?;
        self.repository.list_entries(&query.normalized()).await
    }

    /// Returns the full history of one transaction, oldest first.
    pub async fn history_for_transaction(
        &self,
        actor: &UserIdentity,
        transaction_id: &str,
    ) -> AppResult<Vec<TransactionAuditLogEntry>> {
        self.require_transaction_log_permission(actor).await?;

        let transaction_id = transaction_id.trim();
        if transaction_id.is_empty() {
            return Err(AppError::Validation(
                "transaction id must not be empty".to_owned(),
            ));
        }

        self.repository
            .history_for_transaction(transaction_id)
            .await
    }

    async fn require_transaction_log_permission(&self, actor: &UserIdentity) -> AppResult<()> {
        self.authorization_service
            .require_permission(actor, Permission::ViewTransactionLogs)
            .await?;
        Ok(())
    }
}

fn normalize_entry(mut entry: NewTransactionAuditEntry) -> AppResult<NewTransactionAuditEntry> {
    entry.transaction_id = entry.transaction_id.trim().to_owned();
    if entry.transaction_id.is_empty() {
        return Err(AppError::Validation(
            "transaction id must not be empty".to_owned(),
        ));
    }

    if entry.amount_minor < 0 {
        return Err(AppError::Validation(
            "transaction amount must not be negative".to_owned(),
        ));
    }

    entry.currency = entry.currency.trim().to_ascii_uppercase();
    if entry.currency.len() != 3
        || !entry
            .currency
            .chars()
            .all(|character| character.is_ascii_alphabetic())
    {
        return Err(AppError::Validation(format!(
            "currency '{}' must be a three-letter code",
            entry.currency
        )));
    }

    entry.idempotency_key = entry
        .idempotency_key
        .map(|key| key.trim().to_owned())
        .filter(|key| !key.is_empty());

    Ok(entry)
}
