mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use auth_crud_api::database::models::User;
use auth_crud_api::database::Repository;
use common::PASSWORD;

const NEW_PASSWORD: &str = "brand-new-pass";

fn new_password() -> Value {
    json!({ "password": NEW_PASSWORD, "passwordConfirm": NEW_PASSWORD })
}

#[tokio::test]
async fn unknown_email_is_not_found() -> Result<()> {
    let app = common::spawn_app().await?;

    let res = app
        .post("/users/forgotPassword", None, &json!({ "email": "ghost@example.com" }))
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body: Value = res.json().await?;
    assert_eq!(body["message"], "There is no user with that email address");
    assert!(app.mailer.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn forgot_password_mails_a_reset_link() -> Result<()> {
    let app = common::spawn_app().await?;
    app.signup("Ada", "ada@example.com").await?;

    let res = app
        .post("/users/forgotPassword", None, &json!({ "email": "ada@example.com" }))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Token sent to email!");

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    assert!(sent[0].subject.contains("10 minutes"));
    assert!(sent[0]
        .message
        .contains(&format!("{}/users/resetPassword/", app.base_url)));

    let token = app.mailer.last_reset_token().context("no token in email")?;
    assert_eq!(token.len(), 64);

    // Only the hash is stored
    let user = Repository::<User>::new(app.store.clone())
        .select_one(User::email_filter("ada@example.com"))
        .await?
        .context("user missing")?;
    let stored = user.password_reset_token.context("no stored token")?;
    assert_ne!(stored, token);
    assert!(user.password_reset_expires.is_some());
    Ok(())
}

#[tokio::test]
async fn reset_token_changes_password_once() -> Result<()> {
    let app = common::spawn_app().await?;
    app.signup("Ada", "ada@example.com").await?;
    app.post("/users/forgotPassword", None, &json!({ "email": "ada@example.com" }))
        .await?;
    let token = app.mailer.last_reset_token().context("no token in email")?;

    let res = app
        .patch(&format!("/users/resetPassword/{token}"), None, &new_password())
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert!(body["token"].is_string());

    assert_eq!(app.login("ada@example.com", NEW_PASSWORD).await?.status(), StatusCode::OK);
    assert_eq!(
        app.login("ada@example.com", PASSWORD).await?.status(),
        StatusCode::UNAUTHORIZED
    );

    let res = app
        .patch(&format!("/users/resetPassword/{token}"), None, &new_password())
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Token is invalid or has expired");
    Ok(())
}

#[tokio::test]
async fn unknown_reset_token_is_rejected() -> Result<()> {
    let app = common::spawn_app().await?;
    app.signup("Ada", "ada@example.com").await?;

    let res = app
        .patch("/users/resetPassword/deadbeef", None, &new_password())
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn expired_reset_token_is_rejected() -> Result<()> {
    let app = common::spawn_app_with(|config| config.security.reset_token_ttl_minutes = 0).await?;
    app.signup("Ada", "ada@example.com").await?;
    app.post("/users/forgotPassword", None, &json!({ "email": "ada@example.com" }))
        .await?;
    let token = app.mailer.last_reset_token().context("no token in email")?;

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let res = app
        .patch(&format!("/users/resetPassword/{token}"), None, &new_password())
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Token is invalid or has expired");
    Ok(())
}

#[tokio::test]
async fn invalid_new_password_keeps_token_usable() -> Result<()> {
    let app = common::spawn_app().await?;
    app.signup("Ada", "ada@example.com").await?;
    app.post("/users/forgotPassword", None, &json!({ "email": "ada@example.com" }))
        .await?;
    let token = app.mailer.last_reset_token().context("no token in email")?;

    let res = app
        .patch(
            &format!("/users/resetPassword/{token}"),
            None,
            &json!({ "password": NEW_PASSWORD, "passwordConfirm": "something-else" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .patch(&format!("/users/resetPassword/{token}"), None, &new_password())
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn failed_delivery_clears_the_token() -> Result<()> {
    let app = common::spawn_app().await?;
    app.signup("Ada", "ada@example.com").await?;
    app.mailer.set_failing(true);

    let res = app
        .post("/users/forgotPassword", None, &json!({ "email": "ada@example.com" }))
        .await?;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = res.json().await?;
    assert_eq!(body["message"], "There was an error sending the email. Try again later!");

    let user = Repository::<User>::new(app.store.clone())
        .select_one(User::email_filter("ada@example.com"))
        .await?
        .context("user missing")?;
    assert!(user.password_reset_token.is_none());
    assert!(user.password_reset_expires.is_none());
    Ok(())
}

#[tokio::test]
async fn update_password_checks_current_password() -> Result<()> {
    let app = common::spawn_app().await?;
    let (token, _) = app.signup("Ada", "ada@example.com").await?;

    let res = app
        .patch(
            "/users/updatePassword",
            Some(&token),
            &json!({
                "currentPassword": "not-my-password",
                "newPassword": NEW_PASSWORD,
                "confirmNewPassword": NEW_PASSWORD,
            }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Your current password is wrong");

    let res = app
        .patch(
            "/users/updatePassword",
            Some(&token),
            &json!({
                "currentPassword": PASSWORD,
                "newPassword": NEW_PASSWORD,
                "confirmNewPassword": NEW_PASSWORD,
            }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let fresh = body["token"].as_str().context("no token")?;

    assert_eq!(app.get("/users/me", Some(fresh)).await?.status(), StatusCode::OK);
    assert_eq!(app.login("ada@example.com", NEW_PASSWORD).await?.status(), StatusCode::OK);
    Ok(())
}
