use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;

use super::models::{Credentials, NewCategory, Registration};

/// A form field that failed client-side checks. Nothing was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

static EMAIL: OnceLock<Regex> = OnceLock::new();

fn email(value: &str) -> Result<(), ValidationError> {
    let re = EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("Unable to compile regex"));
    if re.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("email", "invalid email address"))
    }
}

fn min_chars(field: &'static str, value: &str, min: usize) -> Result<(), ValidationError> {
    if value.chars().count() >= min {
        return Ok(());
    }
    let message = match min {
        1 => "is required".to_string(),
        n => format!("must be at least {n} characters"),
    };
    Err(ValidationError::new(field, message))
}

impl Validate for Credentials {
    fn validate(&self) -> Result<(), ValidationError> {
        email(&self.email)?;
        min_chars("password", &self.password, 6)
    }
}

impl Validate for Registration {
    fn validate(&self) -> Result<(), ValidationError> {
        email(&self.email)?;
        min_chars("password", &self.password, 6)?;
        min_chars("name", &self.name, 2)?;
        min_chars("currency", &self.currency, 1)?;
        min_chars("avatar", &self.avatar, 1)
    }
}

impl Validate for NewCategory {
    fn validate(&self) -> Result<(), ValidationError> {
        min_chars("name", &self.name, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TransactionType;

    fn registration() -> Registration {
        Registration {
            email: "ana@example.com".to_string(),
            password: "secret1".to_string(),
            name: "Ana".to_string(),
            currency: "ARS".to_string(),
            avatar: "/avatars/avatar1.png".to_string(),
        }
    }

    #[test]
    fn test_credentials() {
        let mut creds = Credentials {
            email: "ana@example.com".to_string(),
            password: "123456".to_string(),
        };
        assert!(creds.validate().is_ok());
        creds.password = "12345".to_string();
        assert_eq!(creds.validate().unwrap_err().field, "password");
        creds.email = "ana@example".to_string();
        assert_eq!(creds.validate().unwrap_err().field, "email");
    }

    #[test]
    fn test_registration_fields_in_order() {
        assert!(registration().validate().is_ok());
        let r = Registration { name: "A".to_string(), ..registration() };
        assert_eq!(r.validate().unwrap_err(), ValidationError::new("name", "must be at least 2 characters"));
        let r = Registration { currency: String::new(), ..registration() };
        assert_eq!(r.validate().unwrap_err(), ValidationError::new("currency", "is required"));
        let r = Registration { avatar: String::new(), ..registration() };
        assert_eq!(r.validate().unwrap_err().field, "avatar");
    }

    #[test]
    fn test_category_name() {
        let category = NewCategory {
            name: "Ñu".to_string(),
            kind: TransactionType::Income,
        };
        assert!(category.validate().is_ok());
        let category = NewCategory { name: "x".to_string(), ..category };
        assert_eq!(category.validate().unwrap_err().field, "name");
    }
}
