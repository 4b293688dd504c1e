use std::sync::Arc;

use ecclesia_application::{
    AuditLogRepository, AuditQueryService, AuditRecorder, AuthService, AuthTokenRepository,
    AuthorizationService, PasswordHasher, RoleAdminService, RoleRepository,
    RoleResolutionRepository, TransactionAuditRepository, TransactionAuditService,
    UserRepository,
};
use ecclesia_core::AppError;
use ecclesia_infrastructure::{
    Argon2PasswordHasher, PostgresAuditLogRepository, PostgresAuthTokenRepository,
    PostgresRoleRepository, PostgresTransactionAuditRepository, PostgresUserRepository,
};
use ipnet::IpNet;
use sqlx::PgPool;

use crate::api_config::ApiConfig;
use crate::state::AppState;

struct RepositorySet {
    role_resolution_repository: Arc<dyn RoleResolutionRepository>,
    role_repository: Arc<dyn RoleRepository>,
    user_repository: Arc<dyn UserRepository>,
    auth_token_repository: Arc<dyn AuthTokenRepository>,
    audit_log_repository: Arc<dyn AuditLogRepository>,
    transaction_audit_repository: Arc<dyn TransactionAuditRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
}

struct ServiceSettings {
    auth_token_ttl: chrono::Duration,
    audit_export_max_rows: usize,
    trusted_proxies: Vec<IpNet>,
}

pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<AppState, AppError> {
    let role_repository = Arc::new(PostgresRoleRepository::new(pool.clone()));
    let repositories = RepositorySet {
        role_resolution_repository: role_repository.clone(),
        role_repository,
        user_repository: Arc::new(PostgresUserRepository::new(pool.clone())),
        auth_token_repository: Arc::new(PostgresAuthTokenRepository::new(pool.clone())),
        audit_log_repository: Arc::new(PostgresAuditLogRepository::new(pool.clone())),
        transaction_audit_repository: Arc::new(PostgresTransactionAuditRepository::new(pool)),
        password_hasher: Arc::new(Argon2PasswordHasher::new()),
    };

    Ok(assemble(
        repositories,
        ServiceSettings {
            auth_token_ttl: config.auth_token_ttl(),
            audit_export_max_rows: config.audit_export_max_rows,
            trusted_proxies: config.trusted_proxies.clone(),
        },
    ))
}

fn assemble(repositories: RepositorySet, settings: ServiceSettings) -> AppState {
    let authorization_service =
        AuthorizationService::new(repositories.role_resolution_repository);

    AppState {
        role_admin_service: RoleAdminService::new(
            authorization_service.clone(),
            repositories.role_repository.clone(),
        ),
        auth_service: AuthService::new(
            repositories.user_repository,
            repositories.auth_token_repository,
            repositories.role_repository,
            repositories.password_hasher,
            authorization_service.clone(),
            settings.auth_token_ttl,
        ),
        audit_recorder: AuditRecorder::new(repositories.audit_log_repository.clone()),
        audit_query_service: AuditQueryService::new(
            authorization_service.clone(),
            repositories.audit_log_repository,
            repositories.transaction_audit_repository.clone(),
            settings.audit_export_max_rows,
        ),
        transaction_audit_service: TransactionAuditService::new(
            authorization_service.clone(),
            repositories.transaction_audit_repository,
        ),
        authorization_service,
        trusted_proxies: settings.trusted_proxies.into(),
    }
}

/// In-memory adapters backing a router under test.
#[cfg(test)]
#[derive(Clone)]
pub struct InMemoryRepositories {
    pub security: Arc<ecclesia_infrastructure::InMemorySecurityRepository>,
    pub audit: Arc<ecclesia_infrastructure::InMemoryAuditRepository>,
    pub password_hasher: Arc<Argon2PasswordHasher>,
}

#[cfg(test)]
impl InMemoryRepositories {
    pub fn seeded() -> Self {
        Self {
            security: Arc::new(ecclesia_infrastructure::InMemorySecurityRepository::seeded()),
            audit: Arc::new(ecclesia_infrastructure::InMemoryAuditRepository::new()),
            password_hasher: Arc::new(
                Argon2PasswordHasher::with_params(1024, 1, 1).unwrap_or_default(),
            ),
        }
    }
}

#[cfg(test)]
pub fn build_in_memory_app_state(
    repositories: &InMemoryRepositories,
    audit_export_max_rows: usize,
    trusted_proxies: Vec<IpNet>,
) -> AppState {
    assemble(
        RepositorySet {
            role_resolution_repository: repositories.security.clone(),
            role_repository: repositories.security.clone(),
            user_repository: repositories.security.clone(),
            auth_token_repository: repositories.security.clone(),
            audit_log_repository: repositories.audit.clone(),
            transaction_audit_repository: repositories.audit.clone(),
            password_hasher: repositories.password_hasher.clone(),
        },
        ServiceSettings {
            auth_token_ttl: chrono::Duration::hours(1),
            audit_export_max_rows,
            trusted_proxies,
        },
    )
}
