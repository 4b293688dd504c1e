//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_hasher;
mod in_memory_audit_repository;
mod in_memory_security_repository;
mod postgres_audit_log_repository;
mod postgres_auth_token_repository;
mod postgres_role_repository;
mod postgres_transaction_audit_repository;
mod postgres_user_repository;

#[cfg(test)]
mod postgres_test_support;

pub use argon2_password_hasher::Argon2PasswordHasher;
pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_security_repository::InMemorySecurityRepository;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_auth_token_repository::PostgresAuthTokenRepository;
pub use postgres_role_repository::PostgresRoleRepository;
pub use postgres_transaction_audit_repository::PostgresTransactionAuditRepository;
pub use postgres_user_repository::PostgresUserRepository;

/// Embedded SQL migrations for the audit and access-control schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
