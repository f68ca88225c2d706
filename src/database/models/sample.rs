use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::ValidationErrors;
use super::Resource;
use crate::config::SecurityConfig;
use crate::database::store::Collection;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    One,
    Two,
    Three,
}

impl Category {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "one" => Some(Category::One),
            "two" => Some(Category::Two),
            "three" => Some(Category::Three),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: Uuid,
    pub text: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default)]
    pub flag: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSample {
    pub text: Option<String>,
    pub email: Option<String>,
    pub category: Option<String>,
    pub flag: Option<bool>,
}

pub type SamplePatch = NewSample;

fn validate_category(errors: &mut ValidationErrors, category: Option<String>) -> Option<Category> {
    let category = category?;
    let parsed = Category::parse(category.trim());
    if parsed.is_none() {
        errors.invalid_enum("category", &category);
    }
    parsed
}

#[async_trait]
impl Resource for Sample {
    const COLLECTION: Collection = Collection {
        name: "samples",
        unique: &["email"],
    };
    const NAME: &'static str = "sample";
    const PLURAL: &'static str = "samples";
    const HIDDEN_FIELDS: &'static [&'static str] = &["flag"];
    const OPT_IN_FIELDS: &'static [&'static str] = &["flag"];

    type Create = NewSample;
    type Patch = SamplePatch;

    fn id(&self) -> Uuid {
        self.id
    }

    async fn build(input: NewSample, _security: &SecurityConfig) -> Result<Self, AppError> {
        let mut errors = ValidationErrors::new("Sample");
        let text = errors.required("text", input.text, "field is required");
        let email = errors.email("email", input.email, "email is required", "provide a valid email");
        let category = validate_category(&mut errors, input.category);

        match errors.finish((text, email))? {
            (Some(text), Some(email)) => Ok(Self {
                id: Uuid::new_v4(),
                text,
                email,
                category,
                flag: input.flag.unwrap_or(false),
            }),
            _ => Err(AppError::internal("Sample validation produced no value")),
        }
    }

    async fn apply(&mut self, patch: SamplePatch, _security: &SecurityConfig) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new("Sample");
        let text = match patch.text {
            Some(text) => errors.required("text", Some(text), "field is required"),
            None => None,
        };
        let email = match patch.email {
            Some(email) => errors.email("email", Some(email), "email is required", "provide a valid email"),
            None => None,
        };
        let category = validate_category(&mut errors, patch.category);
        errors.finish(())?;

        if let Some(text) = text {
            self.text = text;
        }
        if let Some(email) = email {
            self.email = email;
        }
        if category.is_some() {
            self.category = category;
        }
        if let Some(flag) = patch.flag {
            self.flag = flag;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, Environment};

    fn security() -> SecurityConfig {
        AppConfig::for_environment(Environment::Development).security
    }

    #[tokio::test]
    async fn builds_with_defaults() {
        let input = NewSample {
            text: Some("hello".to_string()),
            email: Some("Hello@Example.com".to_string()),
            ..Default::default()
        };
        let sample = Sample::build(input, &security()).await.unwrap();
        assert_eq!(sample.email, "hello@example.com");
        assert!(!sample.flag);
        assert!(sample.category.is_none());
    }

    #[tokio::test]
    async fn rejects_unknown_category() {
        let input = NewSample {
            text: Some("hello".to_string()),
            email: Some("hello@example.com".to_string()),
            category: Some("four".to_string()),
            flag: None,
        };
        let err = Sample::build(input, &security()).await.unwrap_err();
        assert_eq!(
            err.message(),
            "Sample validation failed: category: `four` is not a valid enum value for path `category`."
        );
    }

    #[tokio::test]
    async fn patch_revalidates() {
        let input = NewSample {
            text: Some("hello".to_string()),
            email: Some("hello@example.com".to_string()),
            category: Some("one".to_string()),
            flag: None,
        };
        let mut sample = Sample::build(input, &security()).await.unwrap();

        let bad = SamplePatch {
            email: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(sample.apply(bad, &security()).await.is_err());
        assert_eq!(sample.email, "hello@example.com");

        let good = SamplePatch {
            category: Some("three".to_string()),
            flag: Some(true),
            ..Default::default()
        };
        sample.apply(good, &security()).await.unwrap();
        assert_eq!(sample.category, Some(Category::Three));
        assert!(sample.flag);
    }
}
