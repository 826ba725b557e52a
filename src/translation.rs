use crate::api::{decode_json, ApiClient};
use crate::error::ApiError;
use crate::validation::ValidationErrors;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Longest text accepted by the text translation box
pub const MAX_TEXT_CHARS: usize = 10_000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateTextRequest<'a> {
    user_input: &'a str,
    target_language_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_language_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextTranslation {
    #[serde(alias = "translation", alias = "result", alias = "outputText")]
    pub translated_text: String,
    #[serde(default)]
    pub detected_language: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
}

fn check_text(text: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if text.trim().is_empty() {
        errors.add("text", "Enter some text to translate");
    } else if text.chars().count() > MAX_TEXT_CHARS {
        errors.add(
            "text",
            format!("Text is longer than {} characters", MAX_TEXT_CHARS),
        );
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

impl ApiClient {
    /// Translate a piece of text with `POST /UserContent/translate`
    pub async fn translate_text(
        &self,
        text: &str,
        target_language_id: i64,
        source_language_id: Option<i64>,
    ) -> Result<TextTranslation, ApiError> {
        check_text(text)?;

        let response = self
            .send_json(
                Method::POST,
                "/UserContent/translate",
                Some(&TranslateTextRequest {
                    user_input: text,
                    target_language_id,
                    source_language_id,
                }),
            )
            .await?;

        let translation: TextTranslation = decode_json(response).await?;
        info!(
            "Translated {} characters into language {}",
            text.chars().count(),
            target_language_id
        );
        Ok(translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::INSUFFICIENT_BALANCE_KA;
    use crate::session::{Session, SessionStore};
    use tempfile::TempDir;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    async fn client(server: &MockServer, dir: &TempDir) -> ApiClient {
        let config = Config::with_base_url(&server.uri(), dir.path().join("session.json"));
        let store = SessionStore::load(config.session_file.clone()).await;
        store
            .set(Session::new("token".to_string(), None, None))
            .await
            .unwrap();
        ApiClient::new(&config, store).unwrap()
    }

    #[test]
    fn test_request_serialization() {
        let request = TranslateTextRequest {
            user_input: "გამარჯობა",
            target_language_id: 2,
            source_language_id: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"userInput": "გამარჯობა", "targetLanguageId": 2}));
    }

    #[test]
    fn test_response_aliases() {
        let a: TextTranslation = serde_json::from_str(r#"{"translatedText": "Hello"}"#).unwrap();
        let b: TextTranslation = serde_json::from_str(r#"{"translation": "Hello", "cost": 0.2}"#).unwrap();
        assert_eq!(a.translated_text, "Hello");
        assert_eq!(b.translated_text, "Hello");
        assert_eq!(b.cost, Some(0.2));
    }

    #[test]
    fn test_check_text() {
        assert!(check_text("hello").is_ok());
        assert!(check_text("   \n").is_err());
        assert!(check_text(&"ა".repeat(MAX_TEXT_CHARS)).is_ok());
        assert!(check_text(&"ა".repeat(MAX_TEXT_CHARS + 1)).is_err());
    }

    #[tokio::test]
    async fn test_translate_text_success() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let client = client(&server, &dir).await;

        Mock::given(method("POST"))
            .and(path("/UserContent/translate"))
            .and(header("Authorization", "Bearer token"))
            .and(body_json(serde_json::json!({
                "userInput": "გამარჯობა",
                "targetLanguageId": 2,
                "sourceLanguageId": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "translatedText": "Hello",
                "detectedLanguage": "ka"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client.translate_text("გამარჯობა", 2, Some(1)).await.unwrap();
        assert_eq!(result.translated_text, "Hello");
        assert_eq!(result.detected_language.as_deref(), Some("ka"));
    }

    #[tokio::test]
    async fn test_translate_text_insufficient_balance() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let client = client(&server, &dir).await;

        Mock::given(method("POST"))
            .and(path("/UserContent/translate"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "message": INSUFFICIENT_BALANCE_KA
            })))
            .mount(&server)
            .await;

        let result = client.translate_text("text", 2, None).await;
        assert!(matches!(result, Err(ApiError::InsufficientBalance(_))));
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected_locally() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let client = client(&server, &dir).await;

        let result = client.translate_text("  ", 2, None).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
