use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use ecclesia_core::UserIdentity;

use crate::dto::{
    AuditLogListQuery, AuditLogPageResponse, AuditStatisticsQuery, AuditStatisticsResponse,
    RetentionSweepRequest, RetentionSweepResponse, SecurityAlertsQuery, SecurityAlertsResponse,
    TransactionAuditEntryResponse, TransactionAuditListQuery, TransactionAuditPageResponse,
    TransactionHistoryResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

mod export;
mod logs;
mod transactions;

pub use export::export_audit_logs_handler;
pub use logs::{
    audit_statistics_handler, list_audit_logs_handler, retention_sweep_handler,
    security_alerts_handler,
};
pub use transactions::{list_transaction_logs_handler, transaction_history_handler};
