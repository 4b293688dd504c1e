use std::str::FromStr;

use ecclesia_application::{
    AUDIT_QUERY_DEFAULT_LIMIT, TransactionAuditLogEntry, TransactionAuditPage,
    TransactionAuditQuery,
};
use ecclesia_core::{AppResult, UserId};
use ecclesia_domain::{TransactionAuditAction, TransactionType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use super::audit::{AuditActorResponse, PaginationResponse, parse_date_range};

/// Query string accepted by the transaction audit listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionAuditListQuery {
    pub transaction_id: Option<String>,
    pub transaction_type: Option<String>,
    pub action: Option<String>,
    pub user_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl TransactionAuditListQuery {
    pub fn into_query(self) -> AppResult<TransactionAuditQuery> {
        Ok(TransactionAuditQuery {
            transaction_id: self
                .transaction_id
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            transaction_type: self
                .transaction_type
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(TransactionType::from_str)
                .transpose()?,
            action: self
                .action
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(TransactionAuditAction::from_str)
                .transpose()?,
            actor_id: self
                .user_id
                .as_deref()
                .filter(|value| !value.trim().is_empty())
                .map(UserId::parse)
                .transpose()?,
            range: parse_date_range(self.start_date, self.end_date)?,
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(AUDIT_QUERY_DEFAULT_LIMIT),
        })
    }
}

/// API representation of one step in a financial transaction's history.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/transaction-audit-entry-response.ts"
)]
pub struct TransactionAuditEntryResponse {
    pub id: String,
    pub transaction_id: String,
    pub transaction_type: String,
    pub action: String,
    pub user: AuditActorResponse,
    pub payment_method: Option<String>,
    /// Amount in minor currency units.
    #[ts(type = "number")]
    pub amount: i64,
    pub currency: String,
    #[ts(type = "unknown")]
    pub previous_state: Option<Value>,
    #[ts(type = "unknown")]
    pub new_state: Option<Value>,
    pub idempotency_key: Option<String>,
    pub external_reference: Option<String>,
    pub verified_by: Option<String>,
    pub verified_at: Option<String>,
    pub ip_address: Option<String>,
    #[ts(type = "unknown")]
    pub metadata: Option<Value>,
    pub created_at: String,
}

/// One page of financial audit entries.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/transaction-audit-page-response.ts"
)]
pub struct TransactionAuditPageResponse {
    pub success: bool,
    pub data: Vec<TransactionAuditEntryResponse>,
    pub pagination: PaginationResponse,
}

/// Full history of one transaction, oldest first.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/transaction-history-response.ts"
)]
pub struct TransactionHistoryResponse {
    pub success: bool,
    pub transaction_id: String,
    pub data: Vec<TransactionAuditEntryResponse>,
}

impl From<TransactionAuditLogEntry> for TransactionAuditEntryResponse {
    fn from(value: TransactionAuditLogEntry) -> Self {
        Self {
            id: value.entry_id.to_string(),
            transaction_id: value.transaction_id,
            transaction_type: value.transaction_type.as_str().to_owned(),
            action: value.action.as_str().to_owned(),
            user: AuditActorResponse::from(value.actor),
            payment_method: value
                .payment_method
                .map(|method| method.as_str().to_owned()),
            amount: value.amount_minor,
            currency: value.currency,
            previous_state: value.previous_state,
            new_state: value.new_state,
            idempotency_key: value.idempotency_key,
            external_reference: value.external_reference,
            verified_by: value.verified_by.map(|user_id| user_id.to_string()),
            verified_at: value.verified_at.map(|timestamp| timestamp.to_rfc3339()),
            ip_address: value.ip_address,
            metadata: value.metadata,
            created_at: value.created_at.to_rfc3339(),
        }
    }
}

impl From<TransactionAuditPage> for TransactionAuditPageResponse {
    fn from(value: TransactionAuditPage) -> Self {
        let total_pages = if value.limit == 0 {
            0
        } else {
            value.total.div_ceil(u64::from(value.limit))
        };

        Self {
            success: true,
            pagination: PaginationResponse {
                page: value.page,
                limit: value.limit,
                total: value.total,
                total_pages,
            },
            data: value
                .entries
                .into_iter()
                .map(TransactionAuditEntryResponse::from)
                .collect(),
        }
    }
}
