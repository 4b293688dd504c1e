//! Authorization gate.
//!
//! Every decision re-reads the caller's role document, so edits to a role
//! apply to all of its holders on their next request.

use std::sync::Arc;

use ecclesia_core::{AppError, AppResult, UserIdentity};
use ecclesia_domain::{EffectivePermissions, Permission};
use tracing::debug;

use crate::{RoleDefinition, RoleResolution, RoleResolutionRepository};

/// Principal that passed the gate, with its role and expanded permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedPrincipal {
    identity: UserIdentity,
    role: RoleDefinition,
    effective: EffectivePermissions,
}

impl AuthorizedPrincipal {
    /// Returns the authenticated identity.
    #[must_use]
    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// Returns the role document read for this decision.
    #[must_use]
    pub fn role(&self) -> &RoleDefinition {
        &self.role
    }

    /// Returns the expanded permission context.
    #[must_use]
    pub fn effective(&self) -> &EffectivePermissions {
        &self.effective
    }
}

/// Reason a request was refused by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDenial {
    /// No principal was resolved for the request.
    AuthenticationRequired,
    /// The principal holds no role reference.
    NoRoleAssigned,
    /// None of the required permissions is held.
    InsufficientPermissions {
        /// Permissions the route accepts, any one of which suffices.
        required: Vec<Permission>,
        /// Permissions stored on the caller's role.
        held: Vec<Permission>,
        /// The caller's role name.
        role_name: String,
    },
    /// The route is restricted to the admin role.
    AdminRequired {
        /// The caller's role name.
        role_name: String,
    },
}

impl AccessDenial {
    /// Returns the HTTP status the denial maps to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AuthenticationRequired => 401,
            Self::NoRoleAssigned
            | Self::InsufficientPermissions { .. }
            | Self::AdminRequired { .. } => 403,
        }
    }

    /// Returns the client-facing message.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "Authentication required",
            Self::NoRoleAssigned => "No role assigned to this account",
            Self::InsufficientPermissions { .. } => "Insufficient permissions",
            Self::AdminRequired { .. } => "Admin access required",
        }
    }

    /// Converts the denial into an application error for service-level checks.
    #[must_use]
    pub fn into_app_error(self) -> AppError {
        match self {
            Self::AuthenticationRequired => AppError::Unauthorized(self.message().to_owned()),
            Self::NoRoleAssigned => AppError::Forbidden(self.message().to_owned()),
            Self::InsufficientPermissions {
                required,
                role_name,
                ..
            } => AppError::Forbidden(format!(
                "role '{role_name}' is missing all of [{}]",
                required
                    .iter()
                    .map(Permission::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            Self::AdminRequired { role_name } => AppError::Forbidden(format!(
                "role '{role_name}' is not the admin role"
            )),
        }
    }
}

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The request may proceed.
    Granted(AuthorizedPrincipal),
    /// The request is refused.
    Denied(AccessDenial),
}

impl AccessDecision {
    /// Converts the decision into a result, mapping denials to errors.
    pub fn into_result(self) -> AppResult<AuthorizedPrincipal> {
        match self {
            Self::Granted(principal) => Ok(principal),
            Self::Denied(denial) => Err(denial.into_app_error()),
        }
    }
}

/// Application service evaluating permission requirements.
#[derive(Clone)]
pub struct AuthorizationService {
    roles: Arc<dyn RoleResolutionRepository>,
}

impl AuthorizationService {
    /// Creates the service over a role resolution port.
    #[must_use]
    pub fn new(roles: Arc<dyn RoleResolutionRepository>) -> Self {
        Self { roles }
    }

    /// Decides whether the principal holds any one of the required permissions.
    ///
    /// The `admin` role passes unconditionally. Store failures are returned
    /// as errors rather than denials.
    pub async fn authorize(
        &self,
        principal: Option<&UserIdentity>,
        required: &[Permission],
    ) -> AppResult<AccessDecision> {
        let (identity, role) = match self.resolve(principal).await? {
            Ok(resolved) => resolved,
            Err(denial) => return Ok(AccessDecision::Denied(denial)),
        };

        let effective = role.effective_permissions();
        if effective.allows_any(required) {
            return Ok(AccessDecision::Granted(AuthorizedPrincipal {
                identity: identity.clone(),
                role,
                effective,
            }));
        }

        debug!(
            user_id = %identity.user_id(),
            role = %role.name,
            "permission check denied"
        );

        Ok(AccessDecision::Denied(
            AccessDenial::InsufficientPermissions {
                required: required.to_vec(),
                held: role.permissions,
                role_name: role.name,
            },
        ))
    }

    /// Decides whether the principal holds the `admin` role.
    ///
    /// No expansion applies: only the exact role name counts.
    pub async fn authorize_admin(
        &self,
        principal: Option<&UserIdentity>,
    ) -> AppResult<AccessDecision> {
        let (identity, role) = match self.resolve(principal).await? {
            Ok(resolved) => resolved,
            Err(denial) => return Ok(AccessDecision::Denied(denial)),
        };

        let effective = role.effective_permissions();
        if effective.is_admin() {
            return Ok(AccessDecision::Granted(AuthorizedPrincipal {
                identity: identity.clone(),
                role,
                effective,
            }));
        }

        Ok(AccessDecision::Denied(AccessDenial::AdminRequired {
            role_name: role.name,
        }))
    }

    /// Ensures an actor holds a permission, for use inside services.
    pub async fn require_permission(
        &self,
        actor: &UserIdentity,
        permission: Permission,
    ) -> AppResult<AuthorizedPrincipal> {
        self.authorize(Some(actor), &[permission])
            .await?
            .into_result()
    }

    /// Ensures an actor holds the `admin` role, for use inside services.
    pub async fn require_admin(&self, actor: &UserIdentity) -> AppResult<AuthorizedPrincipal> {
        self.authorize_admin(Some(actor)).await?.into_result()
    }

    async fn resolve<'a>(
        &self,
        principal: Option<&'a UserIdentity>,
    ) -> AppResult<Result<(&'a UserIdentity, RoleDefinition), AccessDenial>> {
        let Some(identity) = principal else {
            return Ok(Err(AccessDenial::AuthenticationRequired));
        };

        match self.roles.resolve_role_for_user(identity.user_id()).await {
            Ok(RoleResolution::Resolved(role)) => Ok(Ok((identity, role))),
            Ok(RoleResolution::Unassigned) => Ok(Err(AccessDenial::NoRoleAssigned)),
            Err(AppError::NotFound(_)) => Ok(Err(AccessDenial::AuthenticationRequired)),
            Err(error) => Err(error),
        }
    }
}
