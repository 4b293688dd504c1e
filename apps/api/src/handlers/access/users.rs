use ecclesia_application::RegisterUserInput;

use super::*;

pub async fn register_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<RegisterUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let created = state
        .auth_service
        .register_user(
            &user,
            RegisterUserInput {
                email: payload.email,
                display_name: payload.display_name,
                password: payload.password,
                role_name: payload.role_name,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<String>,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state
        .role_admin_service
        .assign_role(
            &user,
            UserId::parse(user_id.as_str())?,
            payload.role_name.as_str(),
        )
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn clear_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    state
        .role_admin_service
        .clear_role(&user, UserId::parse(user_id.as_str())?)
        .await?;

    Ok(Json(SuccessResponse::new("role cleared")))
}
