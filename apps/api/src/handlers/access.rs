use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use ecclesia_core::{UserId, UserIdentity};

use crate::dto::{
    AssignRoleRequest, CreateRoleRequest, RegisterUserRequest, RoleResponse, SuccessResponse,
    UpdateRoleRequest, UserResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

mod roles;
mod users;

pub use roles::{
    create_role_handler, delete_role_handler, get_role_handler, list_roles_handler,
    update_role_handler,
};
pub use users::{assign_role_handler, clear_role_handler, register_user_handler};
