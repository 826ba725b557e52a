use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Georgian for "insufficient balance", as returned in backend error text
pub const INSUFFICIENT_BALANCE_KA: &str = "არასაკმარისი ბალანსი";

const INSUFFICIENT_KA_STEM: &str = "არასაკმარისი";

pub const MSG_INSUFFICIENT_BALANCE: &str =
    "Your balance is too low for this translation. Top up your balance and try again.";
pub const MSG_CONNECTIVITY: &str =
    "Could not reach the translation server. Check your connection and try again.";
pub const MSG_SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";
pub const MSG_NOT_AUTHENTICATED: &str = "Please log in to continue.";
pub const MSG_FORBIDDEN: &str = "You do not have permission to do that.";
pub const MSG_GENERIC: &str = "Something went wrong. Please try again.";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("session expired")]
    SessionExpired,

    #[error("not logged in")]
    NotAuthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("translation job failed: {0}")]
    JobFailed(String),

    #[error("job {job_id} did not finish within {waited_secs}s")]
    PollTimeout { job_id: String, waited_secs: u64 },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("invalid input: {0}")]
    Validation(#[from] crate::validation::ValidationErrors),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    title: Option<String>,
    error: Option<String>,
}

/// Pull the human-readable message out of a backend error body.
///
/// The backend answers with `{"message": ...}`, ASP.NET problem details
/// (`{"title": ...}`), `{"error": ...}`, or plain text.
pub fn extract_message(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(trimmed) {
        if let Some(msg) = parsed.message.or(parsed.error).or(parsed.title) {
            return msg;
        }
    }
    if let Ok(serde_json::Value::String(s)) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return s;
    }
    trimmed.to_string()
}

pub fn is_insufficient_balance(text: &str) -> bool {
    text.contains(INSUFFICIENT_KA_STEM) || text.to_lowercase().contains("insufficient balance")
}

fn is_connectivity_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("cors") || lower.contains("failed to fetch")
}

impl ApiError {
    /// Classify a non-success response once, at construction
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = extract_message(body);

        if is_insufficient_balance(&message) {
            return ApiError::InsufficientBalance(message);
        }

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            StatusCode::PAYMENT_REQUIRED => ApiError::InsufficientBalance(message),
            _ => ApiError::Server {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Failure message reported by a terminal `Failed` job status
    pub fn from_job_message(message: Option<&str>) -> Self {
        let message = message.unwrap_or_default().to_string();
        if is_insufficient_balance(&message) {
            ApiError::InsufficientBalance(message)
        } else {
            ApiError::JobFailed(message)
        }
    }

    /// Whether an idempotent request that failed this way is worth repeating
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            ApiError::Server { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// The string shown to the user in place of the alert component
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => MSG_CONNECTIVITY.to_string(),
            ApiError::InsufficientBalance(_) => MSG_INSUFFICIENT_BALANCE.to_string(),
            ApiError::SessionExpired | ApiError::Unauthorized => MSG_SESSION_EXPIRED.to_string(),
            ApiError::NotAuthenticated => MSG_NOT_AUTHENTICATED.to_string(),
            ApiError::Forbidden(_) => MSG_FORBIDDEN.to_string(),
            ApiError::Server { message, .. }
            | ApiError::NotFound(message)
            | ApiError::JobFailed(message) => {
                if is_connectivity_text(message) {
                    MSG_CONNECTIVITY.to_string()
                } else if message.trim().is_empty() {
                    MSG_GENERIC.to_string()
                } else {
                    message.clone()
                }
            }
            ApiError::PollTimeout { .. } => {
                "The translation is taking longer than expected. Check the job status later."
                    .to_string()
            }
            ApiError::Validation(errors) => errors.to_string(),
            ApiError::Decode(_) | ApiError::Io(_) => MSG_GENERIC.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message_from_json() {
        assert_eq!(extract_message(r#"{"message": "bad phone"}"#), "bad phone");
        assert_eq!(
            extract_message(r#"{"title": "One or more validation errors occurred."}"#),
            "One or more validation errors occurred."
        );
        assert_eq!(extract_message(r#"{"error": "nope"}"#), "nope");
    }

    #[test]
    fn test_extract_message_plain_text() {
        assert_eq!(extract_message("  Internal error \n"), "Internal error");
        assert_eq!(extract_message(r#""quoted text""#), "quoted text");
        assert_eq!(extract_message(""), "");
    }

    #[test]
    fn test_georgian_balance_phrase_is_classified() {
        let body = format!(r#"{{"message": "{} თარგმნისთვის"}}"#, INSUFFICIENT_BALANCE_KA);
        let err = ApiError::from_response(StatusCode::BAD_REQUEST, &body);
        assert!(matches!(err, ApiError::InsufficientBalance(_)));
        assert_eq!(err.user_message(), MSG_INSUFFICIENT_BALANCE);
    }

    #[test]
    fn test_english_balance_phrase_is_classified() {
        let err = ApiError::from_response(StatusCode::BAD_REQUEST, "Insufficient balance");
        assert!(matches!(err, ApiError::InsufficientBalance(_)));
    }

    #[test]
    fn test_payment_required_is_balance() {
        let err = ApiError::from_response(StatusCode::PAYMENT_REQUIRED, "");
        assert!(matches!(err, ApiError::InsufficientBalance(_)));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ApiError::from_response(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_response(StatusCode::FORBIDDEN, "admins only"),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from_response(StatusCode::NOT_FOUND, "no such job"),
            ApiError::NotFound(_)
        ));
        match ApiError::from_response(StatusCode::BAD_GATEWAY, "upstream down") {
            ApiError::Server { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cors_wording_shows_connectivity_message() {
        let err = ApiError::from_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Blocked by CORS policy",
        );
        assert_eq!(err.user_message(), MSG_CONNECTIVITY);
    }

    #[test]
    fn test_job_failure_message() {
        let err = ApiError::from_job_message(Some("OCR engine crashed"));
        assert!(matches!(err, ApiError::JobFailed(_)));
        assert_eq!(err.user_message(), "OCR engine crashed");

        let err = ApiError::from_job_message(Some(INSUFFICIENT_BALANCE_KA));
        assert!(matches!(err, ApiError::InsufficientBalance(_)));

        let err = ApiError::from_job_message(None);
        assert_eq!(err.user_message(), MSG_GENERIC);
    }

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::Server { status: 503, message: String::new() }.is_transient());
        assert!(ApiError::Server { status: 429, message: String::new() }.is_transient());
        assert!(!ApiError::Server { status: 400, message: String::new() }.is_transient());
        assert!(!ApiError::Unauthorized.is_transient());
        assert!(!ApiError::NotFound("x".into()).is_transient());
    }

    #[test]
    fn test_session_messages() {
        assert_eq!(ApiError::SessionExpired.user_message(), MSG_SESSION_EXPIRED);
        assert_eq!(ApiError::NotAuthenticated.user_message(), MSG_NOT_AUTHENTICATED);
    }
}
