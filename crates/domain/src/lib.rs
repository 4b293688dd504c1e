//! Domain vocabulary and invariants for access control and auditing.

#![forbid(unsafe_code)]

mod audit;
mod audit_classifier;
mod permission_expansion;
mod role;
mod security;
mod user;

pub use audit::{
    AuditAction, NON_CRITICAL_TRANSACTION_ACTIONS, PROTECTED_AUDIT_ACTIONS, PaymentMethod,
    ResourceType, TransactionAuditAction, TransactionType,
};
pub use audit_classifier::{
    AuditClassification, classify_outcome, classify_request, is_excluded_path,
};
pub use permission_expansion::{
    EffectivePermissions, PERMISSION_EXPANSIONS, expand_permissions, granular_permissions_for,
};
pub use role::{ADMIN_ROLE_NAME, ROLE_NAME_MAX_LENGTH, RoleName, SystemRole};
pub use security::Permission;
pub use user::{
    EMAIL_MAX_LENGTH, EmailAddress, PASSWORD_MAX_LENGTH, PASSWORD_MIN_LENGTH, validate_password,
};
