// handlers/auth/mod.rs - Signup, login and password lifecycle under /users

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Extension;
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::{password, send_token};
use crate::config::AppConfig;
use crate::database::models::{NewUser, Resource, User};
use crate::error::AppError;
use crate::mail::Email;
use crate::middleware::{ApiResponse, ApiResult, AppJson, AppPath, CurrentUser};
use crate::state::AppState;

const RESET_TOKEN_INVALID: &str = "Token is invalid or has expired";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_new_password: Option<String>,
}

/**
 * POST /users/signup
 *
 * Input: `{name, email, password, passwordConfirm}`. A `role` in the body is
 * ignored; self-registered accounts are always `user`.
 *
 * Output: 201 with `token`, the `jwt` cookie and `data.user`.
 */
pub async fn signup(State(state): State<AppState>, AppJson(mut input): AppJson<NewUser>) -> ApiResult {
    input.role = None;

    let user = User::build(input, &state.config.security).await?;
    let user = state.repository::<User>().insert(&user).await?;

    info!(user_id = %user.id, "User signed up");
    send_token(&user, StatusCode::CREATED, &state.config)
}

/// POST /users/login
pub async fn login(State(state): State<AppState>, AppJson(input): AppJson<LoginRequest>) -> ApiResult {
    let non_empty = |value: &String| !value.is_empty();
    let (Some(email), Some(password)) = (input.email.filter(non_empty), input.password.filter(non_empty)) else {
        return Err(AppError::bad_request("Please provide email and password"));
    };

    let rejected = || AppError::unauthorized("incorrect email or password");
    let Some(user) = state.repository::<User>().select_one(User::email_filter(&email)).await? else {
        password::burn_verify(password, state.config.security.bcrypt_cost).await?;
        return Err(rejected());
    };
    if !user.verify_password(&password).await? {
        return Err(rejected());
    }

    info!(user_id = %user.id, "User logged in");
    send_token(&user, StatusCode::OK, &state.config)
}

/**
 * POST /users/forgotPassword
 *
 * Stores the hash of a fresh reset token on the user and mails the plaintext
 * token as a link. When delivery fails the token is cleared again so it can
 * never be used.
 */
pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(input): AppJson<ForgotPasswordRequest>,
) -> ApiResult {
    let repo = state.repository::<User>();
    let email = input.email.unwrap_or_default();

    let mut user = repo
        .select_one(User::email_filter(&email))
        .await?
        .ok_or_else(|| AppError::not_found("There is no user with that email address"))?;

    let ttl_minutes = state.config.security.reset_token_ttl_minutes;
    let token = user.create_password_reset_token(ttl_minutes);
    repo.save(&user).await?;

    let reset_url = format!("{}/users/resetPassword/{}", base_url(&state.config, &headers), token);
    let email = Email {
        to: user.email.clone(),
        subject: format!("Your password reset link (valid for {} minutes)", ttl_minutes),
        message: format!(
            "Forgot your password? Submit a PATCH request with your new password and passwordConfirm to: {}\n\
             If you didn't forget your password, please ignore this email!",
            reset_url
        ),
    };

    if let Err(e) = state.mailer.send(email).await {
        warn!(user_id = %user.id, error = %e, "Password reset email failed");
        user.clear_password_reset();
        repo.save(&user).await?;
        return Err(AppError::internal("There was an error sending the email. Try again later!"));
    }

    info!(user_id = %user.id, "Password reset token sent");
    Ok(ApiResponse::success().with_message("Token sent to email!"))
}

/// PATCH /users/resetPassword/:token
pub async fn reset_password(
    State(state): State<AppState>,
    AppPath(token): AppPath<String>,
    AppJson(input): AppJson<ResetPasswordRequest>,
) -> ApiResult {
    let repo = state.repository::<User>();

    let mut user = repo
        .select_one(User::reset_token_filter(&token))
        .await?
        .ok_or_else(|| AppError::bad_request(RESET_TOKEN_INVALID))?;

    user.set_password(input.password, input.password_confirm, &state.config.security)
        .await?;
    user.clear_password_reset();

    let user = repo
        .save(&user)
        .await?
        .ok_or_else(|| AppError::bad_request(RESET_TOKEN_INVALID))?;

    info!(user_id = %user.id, "Password reset");
    send_token(&user, StatusCode::OK, &state.config)
}

/// PATCH /users/updatePassword (protected)
pub async fn update_password(
    State(state): State<AppState>,
    Extension(CurrentUser(mut user)): Extension<CurrentUser>,
    AppJson(input): AppJson<UpdatePasswordRequest>,
) -> ApiResult {
    let current = input.current_password.unwrap_or_default();
    if !user.verify_password(&current).await? {
        return Err(AppError::unauthorized("Your current password is wrong"));
    }

    user.set_password(input.new_password, input.confirm_new_password, &state.config.security)
        .await?;

    let user = state
        .repository::<User>()
        .save(&user)
        .await?
        .ok_or_else(|| AppError::unauthorized("The user belonging to this token no longer exists."))?;

    info!(user_id = %user.id, "Password updated");
    send_token(&user, StatusCode::OK, &state.config)
}

/// Origin used in emailed links: PUBLIC_URL when configured, otherwise the
/// request's own scheme and host.
pub fn base_url(config: &AppConfig, headers: &HeaderMap) -> String {
    if let Some(public_url) = &config.api.public_url {
        return public_url.trim_end_matches('/').to_string();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}:{}", config.api.host, config.api.port));

    format!("{}://{}", scheme, host)
}
