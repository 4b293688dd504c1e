use serde::Serialize;
use ts_rs::TS;

mod audit;
mod auth;
mod roles;
mod transactions;

pub use audit::{
    ActionCountResponse, ActorActivityResponse, AuditActorResponse, AuditLogEntryResponse,
    AuditLogListQuery, AuditLogPageResponse, AuditStatisticsQuery, AuditStatisticsResponse,
    AccessDeniedSummaryResponse, FailedLoginSummaryResponse, PaginationResponse,
    ResourceTypeCountResponse, RetentionSweepRequest, RetentionSweepResponse,
    SecurityAlertsQuery, SecurityAlertsResponse,
};
pub use auth::{LoginRequest, LoginResponse, UserIdentityResponse};
pub use roles::{
    AssignRoleRequest, CreateRoleRequest, RegisterUserRequest, RoleResponse, UpdateRoleRequest,
    UserResponse,
};
pub use transactions::{
    TransactionAuditEntryResponse, TransactionAuditListQuery, TransactionAuditPageResponse,
    TransactionHistoryResponse,
};

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Acknowledgement for mutations without a resource body.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/success-response.ts"
)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use ts_rs::{Config, TS};

    use super::{
        AccessDeniedSummaryResponse, ActionCountResponse, ActorActivityResponse,
        AssignRoleRequest, AuditActorResponse, AuditLogEntryResponse, AuditLogPageResponse,
        AuditStatisticsResponse, CreateRoleRequest, FailedLoginSummaryResponse, HealthResponse,
        LoginRequest, LoginResponse, PaginationResponse, RegisterUserRequest,
        ResourceTypeCountResponse, RetentionSweepRequest, RetentionSweepResponse, RoleResponse,
        SecurityAlertsResponse, SuccessResponse, TransactionAuditEntryResponse,
        TransactionAuditPageResponse, TransactionHistoryResponse, UpdateRoleRequest,
        UserIdentityResponse, UserResponse,
    };
    use crate::error::ErrorResponse;

    #[test]
    fn export_ts_bindings() -> Result<(), ts_rs::ExportError> {
        let config = Config::default();

        HealthResponse::export(&config)?;
        SuccessResponse::export(&config)?;
        ErrorResponse::export(&config)?;
        LoginRequest::export(&config)?;
        LoginResponse::export(&config)?;
        UserIdentityResponse::export(&config)?;
        CreateRoleRequest::export(&config)?;
        UpdateRoleRequest::export(&config)?;
        AssignRoleRequest::export(&config)?;
        RegisterUserRequest::export(&config)?;
        RoleResponse::export(&config)?;
        UserResponse::export(&config)?;
        AuditActorResponse::export(&config)?;
        AuditLogEntryResponse::export(&config)?;
        PaginationResponse::export(&config)?;
        AuditLogPageResponse::export(&config)?;
        ActionCountResponse::export(&config)?;
        ResourceTypeCountResponse::export(&config)?;
        ActorActivityResponse::export(&config)?;
        FailedLoginSummaryResponse::export(&config)?;
        AccessDeniedSummaryResponse::export(&config)?;
        AuditStatisticsResponse::export(&config)?;
        SecurityAlertsResponse::export(&config)?;
        RetentionSweepRequest::export(&config)?;
        RetentionSweepResponse::export(&config)?;
        TransactionAuditEntryResponse::export(&config)?;
        TransactionAuditPageResponse::export(&config)?;
        TransactionHistoryResponse::export(&config)?;

        Ok(())
    }
}
