use std::sync::Arc;

use ecclesia_application::{
    AuditQueryService, AuditRecorder, AuthService, AuthorizationService, RoleAdminService,
    TransactionAuditService,
};
use ipnet::IpNet;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub authorization_service: AuthorizationService,
    pub role_admin_service: RoleAdminService,
    pub auth_service: AuthService,
    pub audit_recorder: AuditRecorder,
    pub audit_query_service: AuditQueryService,
    pub transaction_audit_service: TransactionAuditService,
    pub trusted_proxies: Arc<[IpNet]>,
}
