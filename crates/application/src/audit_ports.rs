mod entries;
mod queries;
mod repositories;
mod transactions;

pub use entries::{AuditActor, AuditLogEntry, ChangeSnapshot, NewAuditLogEntry};
pub use queries::{
    AUDIT_QUERY_DEFAULT_LIMIT, AUDIT_QUERY_MAX_LIMIT, AccessDeniedSummary, ActionCount,
    ActorActivity, AuditLogFilter, AuditLogPage, AuditLogQuery, AuditSortField, AuditStatistics,
    DateRange, FailedLoginSummary, ResourceTypeCount, SecurityAlerts, SortDirection,
};
pub use repositories::{AuditLogRepository, TransactionAuditRepository};
pub use transactions::{
    NewTransactionAuditEntry, TransactionAuditLogEntry, TransactionAuditPage,
    TransactionAuditQuery,
};
