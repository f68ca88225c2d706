// handlers/users.rs - Self-service profile routes for the logged-in user

use axum::extract::State;
use axum::Extension;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::database::models::{Resource, User, UserPatch};
use crate::database::repository::not_found;
use crate::error::AppError;
use crate::middleware::{ApiResponse, ApiResult, AppJson, CurrentUser};
use crate::state::AppState;

/// Body of PATCH /users/updateMe. Password fields are only captured to be
/// rejected; role cannot be changed here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<Value>,
    #[serde(default)]
    pub password_confirm: Option<Value>,
}

impl UpdateMeRequest {
    fn touches_password(&self) -> bool {
        self.password.is_some() || self.password_confirm.is_some()
    }
}

/// GET /users/me
pub async fn get_me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> ApiResult {
    Ok(ApiResponse::success().with_data(User::NAME, user.to_public(None)?))
}

/// PATCH /users/updateMe
pub async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(mut user)): Extension<CurrentUser>,
    AppJson(input): AppJson<UpdateMeRequest>,
) -> ApiResult {
    if input.touches_password() {
        return Err(AppError::bad_request(
            "This route is not for password updates. Please use /updatePassword.",
        ));
    }

    let patch = UserPatch {
        name: input.name,
        email: input.email,
        role: None,
    };
    user.apply(patch, &state.config.security).await?;

    let user = state
        .repository::<User>()
        .save(&user)
        .await?
        .ok_or_else(not_found::<User>)?;

    Ok(ApiResponse::success().with_data(User::NAME, user.to_public(None)?))
}

/// DELETE /users/deleteMe - soft delete; the account disappears from every query
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(CurrentUser(mut user)): Extension<CurrentUser>,
) -> ApiResult {
    user.active = false;
    state.repository::<User>().save(&user).await?;

    info!(user_id = %user.id, "User deactivated");
    Ok(ApiResponse::no_content())
}
