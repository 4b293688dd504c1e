use axum::Json;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use ecclesia_application::LoginOutcome;
use ecclesia_core::{AppError, UserIdentity};
use tracing::info;

use crate::dto::{LoginRequest, LoginResponse, SuccessResponse, UserIdentityResponse};
use crate::error::ApiResult;
use crate::middleware::bearer_token;
use crate::state::AppState;

/// Exchanges email and password for a bearer token.
///
/// The authenticated identity rides along as a response extension so the
/// audit stage can attribute the login.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Response> {
    match state
        .auth_service
        .login(payload.email.as_str(), payload.password.as_str())
        .await?
    {
        LoginOutcome::Authenticated {
            token,
            identity,
            expires_at,
        } => {
            info!(user_id = %identity.user_id(), "user logged in");
            let body = LoginResponse {
                success: true,
                token,
                expires_at: expires_at.to_rfc3339(),
                user: UserIdentityResponse::from(&identity),
            };
            Ok((Extension(identity), Json(body)).into_response())
        }
        LoginOutcome::Failed => {
            Err(AppError::Unauthorized("invalid email or password".to_owned()).into())
        }
    }
}

pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SuccessResponse>> {
    if let Some(token) = bearer_token(&headers) {
        state.auth_service.logout(token.as_str()).await?;
    }

    Ok(Json(SuccessResponse::new("logged out")))
}

pub async fn me_handler(Extension(user): Extension<UserIdentity>) -> Json<UserIdentityResponse> {
    Json(UserIdentityResponse::from(&user))
}
