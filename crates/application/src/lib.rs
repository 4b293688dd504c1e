//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod audit_query_service;
mod audit_recorder;
mod auth_service;
mod authorization_service;
mod role_ports;
mod role_service;
mod transaction_audit_service;

#[cfg(test)]
mod test_support;

pub use audit_ports::{
    AUDIT_QUERY_DEFAULT_LIMIT, AUDIT_QUERY_MAX_LIMIT, AccessDeniedSummary, ActionCount,
    ActorActivity, AuditActor, AuditLogEntry, AuditLogFilter, AuditLogPage, AuditLogQuery,
    AuditLogRepository, AuditSortField, AuditStatistics, ChangeSnapshot, DateRange,
    FailedLoginSummary, NewAuditLogEntry, NewTransactionAuditEntry, ResourceTypeCount,
    SecurityAlerts, SortDirection, TransactionAuditLogEntry, TransactionAuditPage,
    TransactionAuditQuery, TransactionAuditRepository,
};
pub use audit_query_service::{
    AuditExport, AuditQueryService, DEFAULT_EXPORT_MAX_ROWS, DEFAULT_RETENTION_DAYS,
    RetentionSweepResult, SECURITY_ALERT_DEFAULT_LOOKBACK_HOURS, SECURITY_ALERT_LIMIT,
    STATISTICS_TOP_N,
};
pub use audit_recorder::{AuditRecorder, RequestAuditContext};
pub use auth_service::{
    AuthService, AuthTokenRepository, LoginOutcome, NewUser, PasswordHasher, RegisterUserInput,
    UserRecord, UserRepository,
};
pub use authorization_service::{
    AccessDecision, AccessDenial, AuthorizationService, AuthorizedPrincipal,
};
pub use role_ports::{
    CreateRoleInput, RoleDefinition, RoleRepository, RoleResolution, RoleResolutionRepository,
    UpdateRoleInput,
};
pub use role_service::{CreateRoleRequest, RoleAdminService, UpdateRoleRequest};
pub use transaction_audit_service::TransactionAuditService;
