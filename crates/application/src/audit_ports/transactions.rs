use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use ecclesia_core::UserId;
use ecclesia_domain::{PaymentMethod, TransactionAuditAction, TransactionType};

use super::entries::AuditActor;
use super::queries::{AUDIT_QUERY_DEFAULT_LIMIT, AUDIT_QUERY_MAX_LIMIT, DateRange};

/// Financial audit entry ready to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransactionAuditEntry {
    /// Identifier of the payment, pledge, contribution or refund.
    pub transaction_id: String,
    /// Kind of transaction.
    pub transaction_type: TransactionType,
    /// Step being recorded.
    pub action: TransactionAuditAction,
    /// Actor snapshot; anonymous for provider callbacks.
    pub actor: AuditActor,
    /// Payment channel, when known.
    pub payment_method: Option<PaymentMethod>,
    /// Amount in minor currency units.
    pub amount_minor: i64,
    /// ISO 4217 currency code.
    pub currency: String,
    /// State before the step.
    pub previous_state: Option<Value>,
    /// State after the step.
    pub new_state: Option<Value>,
    /// Deduplicates retried writes of the same step.
    pub idempotency_key: Option<String>,
    /// Provider receipt or reference number.
    pub external_reference: Option<String>,
    /// Staff member who verified the transaction.
    pub verified_by: Option<UserId>,
    /// Verification time.
    pub verified_at: Option<DateTime<Utc>>,
    /// Client or callback source IP.
    pub ip_address: Option<String>,
    /// Free-form context.
    pub metadata: Option<Value>,
}

impl NewTransactionAuditEntry {
    /// Attaches storage-assigned identity and timestamp.
    #[must_use]
    pub fn into_entry(self, entry_id: Uuid, created_at: DateTime<Utc>) -> TransactionAuditLogEntry {
        TransactionAuditLogEntry {
            entry_id,
            transaction_id: self.transaction_id,
            transaction_type: self.transaction_type,
            action: self.action,
            actor: self.actor,
            payment_method: self.payment_method,
            amount_minor: self.amount_minor,
            currency: self.currency,
            previous_state: self.previous_state,
            new_state: self.new_state,
            idempotency_key: self.idempotency_key,
            external_reference: self.external_reference,
            verified_by: self.verified_by,
            verified_at: self.verified_at,
            ip_address: self.ip_address,
            metadata: self.metadata,
            created_at,
        }
    }
}

/// Persisted, immutable financial audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionAuditLogEntry {
    /// Stable entry identifier.
    pub entry_id: Uuid,
    /// Identifier of the payment, pledge, contribution or refund.
    pub transaction_id: String,
    /// Kind of transaction.
    pub transaction_type: TransactionType,
    /// Recorded step.
    pub action: TransactionAuditAction,
    /// Actor snapshot.
    pub actor: AuditActor,
    /// Payment channel.
    pub payment_method: Option<PaymentMethod>,
    /// Amount in minor currency units.
    pub amount_minor: i64,
    /// ISO 4217 currency code.
    pub currency: String,
    /// State before the step.
    pub previous_state: Option<Value>,
    /// State after the step.
    pub new_state: Option<Value>,
    /// Idempotency key.
    pub idempotency_key: Option<String>,
    /// Provider receipt or reference number.
    pub external_reference: Option<String>,
    /// Verifying staff member.
    pub verified_by: Option<UserId>,
    /// Verification time.
    pub verified_at: Option<DateTime<Utc>>,
    /// Source IP.
    pub ip_address: Option<String>,
    /// Free-form context.
    pub metadata: Option<Value>,
    /// Write timestamp.
    pub created_at: DateTime<Utc>,
}

/// Paginated financial audit listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionAuditQuery {
    /// Transaction identifier.
    pub transaction_id: Option<String>,
    /// Kind of transaction.
    pub transaction_type: Option<TransactionType>,
    /// Recorded step.
    pub action: Option<TransactionAuditAction>,
    /// Acting user.
    pub actor_id: Option<UserId>,
    /// Time window.
    pub range: DateRange,
    /// One-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

impl Default for TransactionAuditQuery {
    fn default() -> Self {
        Self {
            transaction_id: None,
            transaction_type: None,
            action: None,
            actor_id: None,
            range: DateRange::default(),
            page: 1,
            limit: AUDIT_QUERY_DEFAULT_LIMIT,
        }
    }
}

impl TransactionAuditQuery {
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

/// One page of financial audit entries, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionAuditPage {
    /// Entries on this page.
    pub entries: Vec<TransactionAuditLogEntry>,
    /// Matching entries across all pages.
    pub total: u64,
    /// One-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}
