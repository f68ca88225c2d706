mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::PASSWORD;

#[tokio::test]
async fn me_returns_current_user() -> Result<()> {
    let app = common::spawn_app().await?;
    let (token, user) = app.signup("Ada", "ada@example.com").await?;

    let res = app.get("/users/me", Some(&token)).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["data"]["user"]["id"], user["id"]);
    assert!(body["data"]["user"].get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn update_me_changes_profile_only() -> Result<()> {
    let app = common::spawn_app().await?;
    let (token, _) = app.signup("Ada", "ada@example.com").await?;

    let res = app
        .patch(
            "/users/updateMe",
            Some(&token),
            &json!({ "name": "Ada Lovelace", "email": "lovelace@example.com", "role": "admin" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    let user = &body["data"]["user"];
    assert_eq!(user["name"], "Ada Lovelace");
    assert_eq!(user["email"], "lovelace@example.com");
    assert_eq!(user["role"], "user");
    Ok(())
}

#[tokio::test]
async fn update_me_refuses_password_changes() -> Result<()> {
    let app = common::spawn_app().await?;
    let (token, _) = app.signup("Ada", "ada@example.com").await?;

    let res = app
        .patch(
            "/users/updateMe",
            Some(&token),
            &json!({ "password": "newpass123", "passwordConfirm": "newpass123" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = res.json().await?;
    assert_eq!(
        body["message"],
        "This route is not for password updates. Please use /updatePassword."
    );
    Ok(())
}

#[tokio::test]
async fn update_me_validates_email() -> Result<()> {
    let app = common::spawn_app().await?;
    let (token, _) = app.signup("Ada", "ada@example.com").await?;

    let res = app
        .patch("/users/updateMe", Some(&token), &json!({ "email": "nope" }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn delete_me_deactivates_account() -> Result<()> {
    let app = common::spawn_app().await?;
    let (token, _) = app.signup("Ada", "ada@example.com").await?;
    let admin = app.admin("root@example.com").await?;

    let res = app.delete("/users/deleteMe", Some(&token)).await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        app.login("ada@example.com", PASSWORD).await?.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(app.get("/users/me", Some(&token)).await?.status(), StatusCode::UNAUTHORIZED);

    let body: Value = app.get("/users", Some(&admin)).await?.json().await?;
    assert_eq!(body["results"], 1);
    Ok(())
}

#[tokio::test]
async fn admin_manages_users() -> Result<()> {
    let app = common::spawn_app().await?;
    let admin = app.admin("root@example.com").await?;

    let res = app
        .post(
            "/users",
            Some(&admin),
            &json!({
                "name": "Grace",
                "email": "grace@example.com",
                "password": PASSWORD,
                "passwordConfirm": PASSWORD,
                "role": "admin",
            }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["user"]["role"], "admin");
    let path = format!("/users/{}", body["data"]["user"]["id"].as_str().context("id")?);

    let res = app.get(&format!("{path}?fields=%2Bpassword"), Some(&admin)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["user"]["name"], "Grace");
    assert!(body["data"]["user"].get("password").is_none());

    let res = app.patch(&path, Some(&admin), &json!({ "role": "user" })).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["user"]["role"], "user");

    let res = app.patch(&path, Some(&admin), &json!({ "role": "overlord" })).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app.delete(&path, Some(&admin)).await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.get(&path, Some(&admin)).await?.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        app.login("grace@example.com", PASSWORD).await?.status(),
        StatusCode::UNAUTHORIZED
    );
    Ok(())
}

#[tokio::test]
async fn admin_list_filters_but_not_on_secrets() -> Result<()> {
    let app = common::spawn_app().await?;
    app.signup("Ada", "ada@example.com").await?;
    app.signup("Grace", "grace@example.com").await?;
    let admin = app.admin("root@example.com").await?;

    let body: Value = app.get("/users?role=admin", Some(&admin)).await?.json().await?;
    assert_eq!(body["results"], 1);
    assert_eq!(body["data"]["users"][0]["email"], "root@example.com");

    let body: Value = app.get("/users?sort=name&limit=2", Some(&admin)).await?.json().await?;
    assert_eq!(body["results"], 2);
    assert_eq!(body["data"]["users"][0]["name"], "Ada");

    for query in [
        "password=x",
        "sort=-passwordResetToken",
        "sort=password%20desc",
        "sort=name,passwordResetToken%20asc",
        "active=false",
    ] {
        let res = app.get(&format!("/users?{query}"), Some(&admin)).await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "query {query}");
    }
    Ok(())
}
