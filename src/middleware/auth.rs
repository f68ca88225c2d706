use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::auth::{extract_token, verify_token};
use crate::database::models::{Role, User};
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user attached to the request by [`protect`]
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Require a valid token for a user that still exists and has not changed
/// password since the token was issued.
pub async fn protect(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| AppError::unauthorized("You are not logged in! Please log in to get access."))?;

    let claims = verify_token(&token, &state.config.security.jwt_secret)?;

    let user = state
        .repository::<User>()
        .select_id(claims.id)
        .await?
        .ok_or_else(|| AppError::unauthorized("The user belonging to this token no longer exists."))?;

    if user.changed_password_after(claims.iat) {
        return Err(AppError::unauthorized("User recently changed password! Please log in again."));
    }

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Role set allowed through [`restrict_to`]
#[derive(Clone, Debug)]
pub struct RoleGuard {
    allowed: Arc<HashSet<Role>>,
}

impl RoleGuard {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: Arc::new(roles.into_iter().collect()),
        }
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }
}

/// Must run after [`protect`]
pub async fn restrict_to(
    State(guard): State<RoleGuard>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let role = request
        .extensions()
        .get::<CurrentUser>()
        .map(|CurrentUser(user)| user.role)
        .ok_or_else(|| AppError::unauthorized("You are not logged in! Please log in to get access."))?;

    if !guard.allows(role) {
        return Err(AppError::forbidden("You do not have permission to perform this action"));
    }

    Ok(next.run(request).await)
}
