use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("valid email pattern")
});

/// Field-level validation failures for one resource, in the order found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    resource: &'static str,
    fields: Vec<(String, String)>,
}

impl ValidationErrors {
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            fields: vec![],
        }
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.push((field.into(), message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Vec<(String, String)> {
        self.fields
    }

    /// `Ok(value)` when nothing was recorded
    pub fn finish<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// Trimmed, non-empty value or a recorded error
    pub fn required(&mut self, field: &str, value: Option<String>, message: &str) -> Option<String> {
        match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(v) => Some(v),
            None => {
                self.add(field, message);
                None
            }
        }
    }

    /// Lower-cased address, recording `invalid` when the format is wrong
    pub fn email(&mut self, field: &str, value: Option<String>, missing: &str, invalid: &str) -> Option<String> {
        let email = self.required(field, value, missing)?.to_lowercase();
        if is_valid_email(&email) {
            Some(email)
        } else {
            self.add(field, invalid);
            None
        }
    }

    pub fn invalid_enum(&mut self, field: &str, value: &str) {
        self.add(field, format!("`{}` is not a valid enum value for path `{}`.", value, field));
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation failed: ", self.resource)?;
        for (i, (field, message)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", field, message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value)
}
