use axum::Router;
use axum::extract::Extension;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use ecclesia_core::AppError;
use ecclesia_domain::Permission;
use tower_http::trace::TraceLayer;

use crate::middleware::RequiredPermissions;
use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;
#[cfg(test)]
mod tests;

const MANAGE_ROLES: RequiredPermissions = RequiredPermissions(&[Permission::ManageRoles]);
const MANAGE_USERS: RequiredPermissions = RequiredPermissions(&[Permission::ManageUsers]);
const VIEW_AUDIT_LOGS: RequiredPermissions = RequiredPermissions(&[Permission::ViewAuditLogs]);
const VIEW_TRANSACTION_LOGS: RequiredPermissions =
    RequiredPermissions(&[Permission::ViewTransactionLogs]);

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let role_routes = Router::new()
        .route(
            "/api/roles",
            get(handlers::access::list_roles_handler).post(handlers::access::create_role_handler),
        )
        .route(
            "/api/roles/{role_name}",
            get(handlers::access::get_role_handler)
                .put(handlers::access::update_role_handler)
                .delete(handlers::access::delete_role_handler),
        )
        .route(
            "/api/users/{user_id}/role",
            put(handlers::access::assign_role_handler)
                .delete(handlers::access::clear_role_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_permissions,
        ))
        .layer(Extension(MANAGE_ROLES));

    let user_routes = Router::new()
        .route("/api/users", post(handlers::access::register_user_handler))
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_permissions,
        ))
        .layer(Extension(MANAGE_USERS));

    let audit_routes = Router::new()
        .route(
            "/api/audit-logs",
            get(handlers::audit::list_audit_logs_handler),
        )
        .route(
            "/api/audit-logs/stats",
            get(handlers::audit::audit_statistics_handler),
        )
        .route(
            "/api/audit-logs/security-alerts",
            get(handlers::audit::security_alerts_handler),
        )
        .route(
            "/api/audit-logs/export",
            get(handlers::audit::export_audit_logs_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_permissions,
        ))
        .layer(Extension(VIEW_AUDIT_LOGS));

    let retention_routes = Router::new()
        .route(
            "/api/audit-logs/retention",
            post(handlers::audit::retention_sweep_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_admin,
        ));

    let transaction_routes = Router::new()
        .route(
            "/api/transaction-audit-logs",
            get(handlers::audit::list_transaction_logs_handler),
        )
        .route(
            "/api/transaction-audit-logs/{transaction_id}",
            get(handlers::audit::transaction_history_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_permissions,
        ))
        .layer(Extension(VIEW_TRANSACTION_LOGS));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::me_handler))
        .merge(role_routes)
        .merge(user_routes)
        .merge(audit_routes)
        .merge(retention_routes)
        .merge(transaction_routes)
        .route_layer(from_fn(middleware::require_auth));

    Ok(Router::new()
        .route("/api/health", get(handlers::health::health_handler))
        .route("/api/auth/login", post(handlers::auth::login_handler))
        .route("/api/auth/logout", post(handlers::auth::logout_handler))
        .merge(protected_routes)
        .layer(from_fn_with_state(app_state.clone(), middleware::record_audit))
        .layer(from_fn_with_state(
            app_state.clone(),
            middleware::resolve_identity,
        ))
        .layer(cors::build_cors_layer(frontend_url)?)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state))
}
