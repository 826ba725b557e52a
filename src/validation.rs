//! Client-side form validation.
//!
//! Each form validates every field and reports all problems at once, so a
//! caller can show them together instead of one per submit.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

pub const MIN_PASSWORD_LEN: usize = 8;

/// A single problem with a single form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All problems found in a form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check whether a given field has at least one error
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

static MOBILE_REGEX: OnceLock<Regex> = OnceLock::new();
static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
static CODE_REGEX: OnceLock<Regex> = OnceLock::new();

/// Normalize a Georgian mobile number to `+9955XXXXXXXX`.
///
/// Accepts `5XXXXXXXX`, `9955XXXXXXXX` and `+9955XXXXXXXX`, ignoring spaces,
/// dashes and parentheses. Returns `None` for anything else.
pub fn normalize_phone(input: &str) -> Option<String> {
    let compact: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let regex = MOBILE_REGEX.get_or_init(|| Regex::new(r"^(?:\+?995)?(5\d{8})$").unwrap());
    regex
        .captures(&compact)
        .map(|caps| format!("+995{}", &caps[1]))
}

pub fn is_valid_email(input: &str) -> bool {
    let regex = EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
    regex.is_match(input)
}

fn is_valid_code(input: &str) -> bool {
    let regex = CODE_REGEX.get_or_init(|| Regex::new(r"^\d{4,6}$").unwrap());
    regex.is_match(input)
}

fn check_phone(errors: &mut ValidationErrors, phone: &str) {
    if phone.trim().is_empty() {
        errors.add("phone", "Phone number is required");
    } else if normalize_phone(phone).is_none() {
        errors.add("phone", "Enter a Georgian mobile number, e.g. 5XX XXX XXX");
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub phone: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_phone(&mut errors, &self.phone);
        if self.password.is_empty() {
            errors.add("password", "Password is required");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub phone: String,
    pub verification_code: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        check_phone(&mut errors, &self.phone);

        if !is_valid_code(self.verification_code.trim()) {
            errors.add("verification_code", "Enter the 4-6 digit code sent by SMS");
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.add(
                "password",
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            );
        }
        if self.password != self.confirm_password {
            errors.add("confirm_password", "Passwords do not match");
        }

        if self.first_name.trim().is_empty() {
            errors.add("first_name", "First name is required");
        }
        if self.last_name.trim().is_empty() {
            errors.add("last_name", "Last name is required");
        }

        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            if !is_valid_email(email.trim()) {
                errors.add("email", "Enter a valid email address");
            }
        }

        errors.into_result()
    }
}

/// Editable profile fields; `None` leaves a field untouched and a blank
/// email removes the address.
#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if matches!(self.first_name.as_deref(), Some(n) if n.trim().is_empty()) {
            errors.add("first_name", "First name cannot be empty");
        }
        if matches!(self.last_name.as_deref(), Some(n) if n.trim().is_empty()) {
            errors.add("last_name", "Last name cannot be empty");
        }
        // A blank email clears the address
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            if !is_valid_email(email.trim()) {
                errors.add("email", "Enter a valid email address");
            }
        }
        if let Some(phone) = self.phone.as_deref() {
            check_phone(&mut errors, phone);
        }
        if self.is_empty() {
            errors.add("profile", "Nothing to update");
        }

        errors.into_result()
    }

    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LanguageForm {
    pub name: String,
    pub name_geo: String,
}

impl LanguageForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "Language name is required");
        }
        if self.name_geo.trim().is_empty() {
            errors.add("name_geo", "Georgian language name is required");
        }
        errors.into_result()
    }
}
