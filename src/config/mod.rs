use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Upper bound for any configured token or cookie lifetime
pub const MAX_LIFETIME_DAYS: u64 = 3650;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub filter: FilterConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Staging and production share cookie and error-rendering behavior
    pub fn is_production_like(&self) -> bool {
        matches!(self, Environment::Staging | Environment::Production)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub max_request_size_bytes: usize,
    /// Base used for links sent by email; falls back to the request's Host header
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string; may contain a `<PASSWORD>` placeholder
    pub url: Option<String>,
    pub password: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub jwt_cookie_expiry_days: u64,
    pub bcrypt_cost: u32,
    pub reset_token_ttl_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set in {0:?}")]
    MissingJwtSecret(Environment),

    #[error("API port must be greater than 0")]
    InvalidPort,

    #[error("bcrypt cost must be between 4 and 31, got {0}")]
    InvalidBcryptCost(u32),

    #[error("max_limit ({max}) cannot be lower than default_limit ({default})")]
    InvalidPageSize { default: u32, max: u32 },

    #[error("PUBLIC_URL must be an absolute http(s) URL, got {0:?}")]
    InvalidPublicUrl(String),

    #[error("{0} must be between 1 and {MAX_LIFETIME_DAYS} days")]
    InvalidLifetime(&'static str),
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        Self::for_environment(environment).with_env_overrides()
    }

    /// Defaults for an environment, without reading any variables
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    fn with_env_overrides(mut self) -> Self {
        // API overrides
        if let Ok(v) = env::var("HOST") {
            self.api.host = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Ok(v) = env::var("PUBLIC_URL") {
            self.api.public_url = Some(v);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_PASSWORD") {
            self.database.password = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("JWT_COOKIE_EXPIRES_IN") {
            self.security.jwt_cookie_expiry_days = v.parse().unwrap_or(self.security.jwt_cookie_expiry_days);
        }
        if let Ok(v) = env::var("BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }
        if let Ok(v) = env::var("RESET_TOKEN_TTL_MINUTES") {
            self.security.reset_token_ttl_minutes = v.parse().unwrap_or(self.security.reset_token_ttl_minutes);
        }

        // Filter overrides
        if let Ok(v) = env::var("FILTER_DEFAULT_LIMIT") {
            self.filter.default_limit = v.parse().unwrap_or(self.filter.default_limit);
        }
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().unwrap_or(self.filter.max_limit);
        }

        // Email overrides
        if let Ok(v) = env::var("EMAIL_HOST") {
            self.email.host = Some(v);
        }
        if let Ok(v) = env::var("EMAIL_PORT") {
            self.email.port = v.parse().unwrap_or(self.email.port);
        }
        if let Ok(v) = env::var("EMAIL_USERNAME") {
            self.email.username = Some(v);
        }
        if let Ok(v) = env::var("EMAIL_PASSWORD") {
            self.email.password = Some(v);
        }
        if let Ok(v) = env::var("EMAIL_FROM") {
            self.email.from = v;
        }

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment.is_production_like() && self.security.jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret(self.environment));
        }
        if self.api.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if !(4..=31).contains(&self.security.bcrypt_cost) {
            return Err(ConfigError::InvalidBcryptCost(self.security.bcrypt_cost));
        }
        if self.filter.max_limit < self.filter.default_limit {
            return Err(ConfigError::InvalidPageSize {
                default: self.filter.default_limit,
                max: self.filter.max_limit,
            });
        }
        let lifetimes = [
            ("JWT_EXPIRY_HOURS", self.security.jwt_expiry_hours, 24),
            ("JWT_COOKIE_EXPIRES_IN", self.security.jwt_cookie_expiry_days, 1),
            ("RESET_TOKEN_TTL_MINUTES", self.security.reset_token_ttl_minutes, 24 * 60),
        ];
        for (name, value, per_day) in lifetimes {
            if value == 0 || value > MAX_LIFETIME_DAYS * per_day {
                return Err(ConfigError::InvalidLifetime(name));
            }
        }
        if let Some(public_url) = &self.api.public_url {
            match url::Url::parse(public_url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                _ => return Err(ConfigError::InvalidPublicUrl(public_url.clone())),
            }
        }
        Ok(())
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                enable_rate_limiting: false,
                rate_limit_requests: 100,
                rate_limit_window_secs: 60 * 60,
                max_request_size_bytes: 10 * 1024, // 10kB
                public_url: None,
            },
            database: DatabaseConfig {
                url: None,
                password: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                jwt_secret: "development-only-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 90, // 90 days
                jwt_cookie_expiry_days: 90,
                bcrypt_cost: 12,
                reset_token_ttl_minutes: 10,
            },
            filter: FilterConfig {
                default_limit: 100,
                max_limit: 1000,
            },
            email: EmailConfig {
                host: None,
                port: 2525,
                username: None,
                password: None,
                from: "Backend Starter <no-reply@localhost>".to_string(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                enable_rate_limiting: true,
                rate_limit_requests: 100,
                rate_limit_window_secs: 60 * 60,
                max_request_size_bytes: 10 * 1024,
                public_url: None,
            },
            database: DatabaseConfig {
                url: None,
                password: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7,
                jwt_cookie_expiry_days: 7,
                bcrypt_cost: 12,
                reset_token_ttl_minutes: 10,
            },
            filter: FilterConfig {
                default_limit: 100,
                max_limit: 500,
            },
            email: EmailConfig {
                host: None,
                port: 587,
                username: None,
                password: None,
                from: "Backend Starter <no-reply@staging.example.com>".to_string(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                enable_rate_limiting: true,
                rate_limit_requests: 100,
                rate_limit_window_secs: 60 * 60,
                max_request_size_bytes: 10 * 1024,
                public_url: None,
            },
            database: DatabaseConfig {
                url: None,
                password: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 90,
                jwt_cookie_expiry_days: 90,
                bcrypt_cost: 12,
                reset_token_ttl_minutes: 10,
            },
            filter: FilterConfig {
                default_limit: 100,
                max_limit: 100,
            },
            email: EmailConfig {
                host: None,
                port: 587,
                username: None,
                password: None,
                from: "Backend Starter <no-reply@example.com>".to_string(),
            },
        }
    }
}

impl DatabaseConfig {
    /// Connection string with the `<PASSWORD>` placeholder substituted
    pub fn connection_string(&self) -> Option<String> {
        let url = self.url.as_ref()?;
        Some(match &self.password {
            Some(password) => url.replace("<PASSWORD>", password),
            None => url.clone(),
        })
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
