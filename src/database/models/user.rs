use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::validation::ValidationErrors;
use super::Resource;
use crate::auth::password;
use crate::config::SecurityConfig;
use crate::database::store::Collection;
use crate::error::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// bcrypt hash
    pub password: String,
    pub role: Role,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub password_changed_at: Option<DateTime<Utc>>,
    /// SHA-256 hex of the emailed reset token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Signup and admin-create payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
    pub role: Option<String>,
}

/// Profile fields that may change without a password check
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl User {
    /// Validate and hash a new password; later changes also stamp
    /// `password_changed_at`.
    pub async fn set_password(
        &mut self,
        password: Option<String>,
        confirm: Option<String>,
        security: &SecurityConfig,
    ) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new("User");
        let password = validate_password(&mut errors, password, confirm);
        let password = errors.finish(password)?.unwrap_or_default();

        self.password = password::hash_password(password, security.bcrypt_cost).await?;
        self.password_changed_at = Some(Utc::now());
        Ok(())
    }

    pub async fn verify_password(&self, candidate: &str) -> Result<bool, AppError> {
        password::verify_password(candidate.to_string(), self.password.clone()).await
    }

    /// Whether the password changed after a token issued at `issued_at` (seconds).
    /// `iat` truncates, so any token minted before the change compares strictly
    /// below the millisecond stamp.
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .map(|changed| changed.timestamp_millis() > issued_at.saturating_mul(1000))
            .unwrap_or(false)
    }

    /// First whole second a newly minted token may claim as `iat` and still
    /// pass [`User::changed_password_after`]
    pub fn tokens_valid_from(&self) -> Option<i64> {
        self.password_changed_at
            .map(|changed| (changed.timestamp_millis() + 999).div_euclid(1000))
    }

    /// Store the hash of a fresh reset token and return the plaintext
    pub fn create_password_reset_token(&mut self, ttl_minutes: u64) -> String {
        let token = password::generate_reset_token();
        self.password_reset_token = Some(password::hash_reset_token(&token));
        self.password_reset_expires = Some(Utc::now() + Duration::minutes(ttl_minutes as i64));
        token
    }

    pub fn clear_password_reset(&mut self) {
        self.password_reset_token = None;
        self.password_reset_expires = None;
    }

    /// Condition selecting the holder of an unexpired reset token
    pub fn reset_token_filter(token: &str) -> Value {
        json!({
            "$and": [
                { "passwordResetToken": password::hash_reset_token(token) },
                { "passwordResetExpires": { "$gt": Utc::now().timestamp_millis() } }
            ]
        })
    }

    pub fn email_filter(email: &str) -> Value {
        json!({ "email": email.trim().to_lowercase() })
    }
}

fn validate_password(
    errors: &mut ValidationErrors,
    password: Option<String>,
    confirm: Option<String>,
) -> Option<String> {
    let password = match password.filter(|p| !p.is_empty()) {
        Some(p) if p.chars().count() < MIN_PASSWORD_LENGTH => {
            errors.add(
                "password",
                format!("Password must have at least {} characters", MIN_PASSWORD_LENGTH),
            );
            None
        }
        Some(p) => Some(p),
        None => {
            errors.add("password", "Please provide a password");
            None
        }
    };

    match confirm.filter(|c| !c.is_empty()) {
        None => errors.add("passwordConfirm", "Please confirm your password"),
        Some(confirm) => {
            if password.as_deref().is_some_and(|p| p != confirm) {
                errors.add("passwordConfirm", "Passwords are not the same!");
            }
        }
    }

    password
}

fn validate_role(errors: &mut ValidationErrors, role: Option<String>) -> Option<Role> {
    let role = role?;
    let parsed = Role::parse(role.trim());
    if parsed.is_none() {
        errors.invalid_enum("role", &role);
    }
    parsed
}

#[async_trait]
impl Resource for User {
    const COLLECTION: Collection = Collection {
        name: "users",
        unique: &["email"],
    };
    const NAME: &'static str = "user";
    const PLURAL: &'static str = "users";
    const HIDDEN_FIELDS: &'static [&'static str] =
        &["password", "passwordResetToken", "passwordResetExpires", "active"];

    type Create = NewUser;
    type Patch = UserPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    /// Soft-deleted users never match
    fn default_filter() -> Option<Value> {
        Some(json!({ "active": { "$ne": false } }))
    }

    async fn build(input: NewUser, security: &SecurityConfig) -> Result<Self, AppError> {
        let mut errors = ValidationErrors::new("User");
        let name = errors.required("name", input.name, "Please tell us your name");
        let email = errors.email(
            "email",
            input.email,
            "Please provide your email",
            "Please provide a valid email",
        );
        let password = validate_password(&mut errors, input.password, input.password_confirm);
        let role = validate_role(&mut errors, input.role);

        let (name, email, password) = match errors.finish((name, email, password))? {
            (Some(name), Some(email), Some(password)) => (name, email, password),
            _ => return Err(AppError::internal("User validation produced no value")),
        };

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            email,
            password: password::hash_password(password, security.bcrypt_cost).await?,
            role: role.unwrap_or(Role::User),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
        })
    }

    async fn apply(&mut self, patch: UserPatch, _security: &SecurityConfig) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new("User");
        let name = match patch.name {
            Some(name) => errors.required("name", Some(name), "Please tell us your name"),
            None => None,
        };
        let email = match patch.email {
            Some(email) => errors.email(
                "email",
                Some(email),
                "Please provide your email",
                "Please provide a valid email",
            ),
            None => None,
        };
        let role = validate_role(&mut errors, patch.role);
        errors.finish(())?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if let Some(role) = role {
            self.role = role;
        }
        Ok(())
    }
}
