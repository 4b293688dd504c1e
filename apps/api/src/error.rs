use std::sync::atomic::{AtomicBool, Ordering};

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ecclesia_application::AccessDenial;
use ecclesia_core::AppError;
use ecclesia_domain::Permission;
use serde::Serialize;
use tracing::error;
use ts_rs::TS;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

static EXPOSE_ERROR_DETAILS: AtomicBool = AtomicBool::new(false);

/// Enables raw internal error text in responses. Development only.
pub fn set_expose_error_details(enabled: bool) {
    EXPOSE_ERROR_DETAILS.store(enabled, Ordering::Relaxed);
}

/// API error payload.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/error-response.ts"
)]
pub struct ErrorResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    required_permissions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    user_permissions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    user_role: Option<String>,
}

impl ErrorResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            required_permissions: None,
            user_permissions: None,
            user_role: None,
        }
    }
}

/// HTTP API error: either an application error or a gate denial.
#[derive(Debug)]
pub enum ApiError {
    App(AppError),
    Denied(AccessDenial),
}

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self::App(value)
    }
}

impl From<AccessDenial> for ApiError {
    fn from(value: AccessDenial) -> Self {
        Self::Denied(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::App(app_error) => app_error_response(app_error),
            Self::Denied(denial) => denial_response(denial),
        }
    }
}

fn app_error_response(app_error: AppError) -> Response {
    let status = match app_error {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Conflict(_) => StatusCode::CONFLICT,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match &app_error {
        AppError::Internal(detail) => {
            error!(error = %detail, "request failed with internal error");
            if EXPOSE_ERROR_DETAILS.load(Ordering::Relaxed) {
                app_error.to_string()
            } else {
                INTERNAL_ERROR_MESSAGE.to_owned()
            }
        }
        _ => app_error.to_string(),
    };

    (status, Json(ErrorResponse::new(message))).into_response()
}

fn denial_response(denial: AccessDenial) -> Response {
    let status =
        StatusCode::from_u16(denial.status_code()).unwrap_or(StatusCode::FORBIDDEN);
    let mut payload = ErrorResponse::new(denial.message());

    match denial {
        AccessDenial::InsufficientPermissions {
            required,
            held,
            role_name,
        } => {
            payload.required_permissions = Some(permission_tokens(&required));
            payload.user_permissions = Some(permission_tokens(&held));
            payload.user_role = Some(role_name);
        }
        AccessDenial::AdminRequired { role_name } => {
            payload.user_role = Some(role_name);
        }
        AccessDenial::AuthenticationRequired | AccessDenial::NoRoleAssigned => {}
    }

    (status, Json(payload)).into_response()
}

fn permission_tokens(permissions: &[Permission]) -> Vec<String> {
    permissions
        .iter()
        .map(|permission| permission.as_str().to_owned())
        .collect()
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
