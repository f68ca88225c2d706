#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};

use auth_crud_api::config::{AppConfig, Environment};
use auth_crud_api::database::models::{Role, User};
use auth_crud_api::database::store::{Collection, Document, StoreError};
use auth_crud_api::database::{DocumentStore, MemoryStore, Repository};
use auth_crud_api::filter::FilterData;
use auth_crud_api::mail::{Email, MailError, Mailer};
use auth_crud_api::routes;
use auth_crud_api::server::{self, Supervisor};
use auth_crud_api::state::AppState;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "pass1234";

/// Captures outgoing mail; can be switched to fail every delivery
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Reset token from the last message's link
    pub fn last_reset_token(&self) -> Option<String> {
        let last = self.sent().pop()?;
        let start = last.message.find("/users/resetPassword/")? + "/users/resetPassword/".len();
        let token: String = last.message[start..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        Some(token)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Rejected("mailbox unavailable".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
        Ok(())
    }
}

/// Store whose backend is down: every call fails
pub struct UnavailableStore;

impl UnavailableStore {
    fn down() -> StoreError {
        StoreError::Unavailable("connection refused".to_string())
    }
}

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn insert(&self, _: &Collection, _: Document) -> Result<Document, StoreError> {
        Err(Self::down())
    }

    async fn find(&self, _: &Collection, _: &FilterData) -> Result<Vec<Document>, StoreError> {
        Err(Self::down())
    }

    async fn replace(&self, _: &Collection, _: uuid::Uuid, _: Document) -> Result<Option<Document>, StoreError> {
        Err(Self::down())
    }

    async fn delete(&self, _: &Collection, _: uuid::Uuid) -> Result<bool, StoreError> {
        Err(Self::down())
    }

    async fn delete_all(&self, _: &Collection) -> Result<u64, StoreError> {
        Err(Self::down())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(Self::down())
    }
}

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::for_environment(Environment::Development);
    config.api.host = "127.0.0.1".to_string();
    config.api.enable_rate_limiting = false;
    config.security.jwt_secret = JWT_SECRET.to_string();
    config.security.bcrypt_cost = 4;
    config.database.url = None;
    config
}

pub async fn spawn_app() -> Result<TestApp> {
    spawn_app_with(|_| {}).await
}

/// Serve the real router on a free port against a fresh memory store
pub async fn spawn_app_with(configure: impl FnOnce(&mut AppConfig)) -> Result<TestApp> {
    spawn_app_on(Arc::new(MemoryStore::new()), configure).await
}

pub async fn spawn_app_on(
    store: Arc<dyn DocumentStore>,
    configure: impl FnOnce(&mut AppConfig),
) -> Result<TestApp> {
    let mut config = test_config();
    configure(&mut config);

    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    config.api.port = port;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;

    let mailer = Arc::new(RecordingMailer::default());
    let (supervisor, fatal) = Supervisor::new();

    let state = AppState::new(config.clone(), store.clone(), mailer.clone(), supervisor);
    let app = routes::app(state);
    tokio::spawn(async move {
        let _ = server::serve(listener, app, fatal).await;
    });

    Ok(TestApp {
        base_url: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        config,
        store,
        mailer,
    })
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<Response> {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    pub async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Result<Response> {
        let mut request = self.client.request(method, self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> Result<Response> {
        self.send_json(reqwest::Method::POST, path, token, body).await
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: &Value) -> Result<Response> {
        self.send_json(reqwest::Method::PATCH, path, token, body).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<Response> {
        let mut request = self.client.delete(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    /// Sign up and return (token, user document)
    pub async fn signup(&self, name: &str, email: &str) -> Result<(String, Value)> {
        let res = self
            .post(
                "/users/signup",
                None,
                &json!({
                    "name": name,
                    "email": email,
                    "password": PASSWORD,
                    "passwordConfirm": PASSWORD,
                }),
            )
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "signup failed: {}", res.status());

        let body: Value = res.json().await?;
        let token = body["token"].as_str().context("no token in signup response")?.to_string();
        Ok((token, body["data"]["user"].clone()))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Response> {
        self.post("/users/login", None, &json!({ "email": email, "password": password }))
            .await
    }

    /// Sign up, promote to admin directly in the store, then log in again
    pub async fn admin(&self, email: &str) -> Result<String> {
        self.signup("Admin", email).await?;

        let users = Repository::<User>::new(self.store.clone());
        let mut user = users
            .select_one(User::email_filter(email))
            .await?
            .context("admin user missing")?;
        user.role = Role::Admin;
        users.save(&user).await?;

        let body: Value = self.login(email, PASSWORD).await?.json().await?;
        Ok(body["token"].as_str().context("no token in login response")?.to_string())
    }
}
