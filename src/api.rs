//! HTTP core shared by every endpoint module.
//!
//! `ApiClient` owns the `reqwest::Client`, the backend base URL and the
//! session store. Authenticated calls go through [`ApiClient::send_authorized`],
//! which attaches the bearer token and performs a single refresh-and-retry on
//! a 401 before logging the user out.

use crate::config::Config;
use crate::error::ApiError;
use crate::language::Language;
use crate::retry::{with_retry_if, RetryConfig};
use crate::session::SessionStore;
use crate::validation::ValidationErrors;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct ApiClient {
    pub(crate) http: reqwest::Client,
    base_url: String,
    session: SessionStore,
    pub(crate) poll_interval: Duration,
    pub(crate) poll_max: Duration,
    pub(crate) language_cache: Arc<RwLock<Option<Vec<Language>>>>,
    // Serializes token refreshes so concurrent 401s trigger one refresh call
    refresh_lock: Arc<Mutex<()>>,
}

impl ApiClient {
    pub fn new(config: &Config, session: SessionStore) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("suliko-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
            poll_interval: config.poll_interval,
            poll_max: config.poll_max,
            language_cache: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a JSON body to an endpoint that needs no token
    pub(crate) async fn post_public<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post_public_raw(path, body).await?;
        decode_json(response).await
    }

    /// Like `post_public` for endpoints whose success body is empty or ignored
    pub(crate) async fn post_public_unit<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let response = self.post_public_raw(path, body).await?;
        let body = response.text().await?;
        if !body.trim().is_empty() {
            debug!("Ignoring response body from {}: {}", path, truncate(&body, 200));
        }
        Ok(())
    }

    async fn post_public_raw<B>(&self, path: &str, body: &B) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self.http.post(&url).json(body).send().await?;
        check_status(response).await
    }

    /// Send an authenticated request, refreshing the token once on 401.
    ///
    /// `build` is called again for the retry, so it must produce a fresh
    /// request each time (multipart bodies cannot be cloned).
    pub(crate) async fn send_authorized<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let token = self
            .session
            .access_token()
            .await
            .ok_or(ApiError::NotAuthenticated)?;

        let response = build(&self.http).bearer_auth(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        info!("Access token rejected, attempting refresh");
        let new_token = match self.refresh_after_rejection(&token).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Token refresh failed, logging out: {}", e);
                self.session.clear().await?;
                return Err(ApiError::SessionExpired);
            }
        };

        let response = build(&self.http).bearer_auth(&new_token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Request rejected after token refresh, logging out");
            self.session.clear().await?;
            return Err(ApiError::SessionExpired);
        }
        check_status(response).await
    }

    /// Refresh unless another task already replaced the rejected token
    async fn refresh_after_rejection(&self, rejected: &str) -> Result<String, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        match self.session.access_token().await {
            Some(current) if current != rejected => {
                debug!("Token already refreshed by a concurrent request");
                Ok(current)
            }
            Some(_) => self.refresh().await,
            None => Err(ApiError::NotAuthenticated),
        }
    }

    async fn get_json_once<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.send_authorized(|http| http.get(&url)).await?;
        decode_json(response).await
    }

    /// Authenticated GET with transient-failure retries
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_json_with(&RetryConfig::idempotent_get(), path).await
    }

    pub(crate) async fn get_json_with<T: DeserializeOwned>(
        &self,
        retry: &RetryConfig,
        path: &str,
    ) -> Result<T, ApiError> {
        with_retry_if(
            retry,
            &format!("GET {}", path),
            || self.get_json_once(path),
            ApiError::is_transient,
        )
        .await
    }

    /// Authenticated request with a JSON body; never retried automatically
    pub(crate) async fn send_json<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        debug!("{} {}", method, url);
        self.send_authorized(|http| {
            let request = http.request(method.clone(), &url);
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        })
        .await
    }
}

/// Turn a non-success response into a classified `ApiError`
pub(crate) async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
    debug!("Request failed with {}: {}", status, body);
    Err(ApiError::from_response(status, &body))
}

pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        ApiError::Decode(format!("{} (body: {})", e, truncate(&body, 200)))
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// `prefix/{id}` with `id` encoded as exactly one path segment
pub(crate) fn resource_path(prefix: &str, id: &str) -> Result<String, ApiError> {
    if matches!(id, "" | "." | "..") {
        let mut errors = ValidationErrors::new();
        errors.add("id", format!("'{}' is not a valid id", id));
        return Err(ApiError::Validation(errors));
    }
    Ok(format!("{}/{}", prefix, urlencoding::encode(id)))
}

/// Backend ids arrive as either JSON strings or numbers
pub(crate) fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use tempfile::TempDir;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    async fn client_with_session(server: &MockServer, dir: &TempDir) -> ApiClient {
        let config = Config::with_base_url(&server.uri(), dir.path().join("session.json"));
        let store = SessionStore::load(config.session_file.clone()).await;
        store
            .set(Session::new(
                "stale-token".to_string(),
                Some("refresh-1".to_string()),
                None,
            ))
            .await
            .unwrap();
        ApiClient::new(&config, store).unwrap()
    }

    #[derive(Debug, Deserialize)]
    struct Ping {
        ok: bool,
    }

    #[tokio::test]
    async fn test_url_joining() {
        let dir = TempDir::new().unwrap();
        let config = Config::with_base_url("http://localhost:5000/api/", dir.path().join("s.json"));
        let store = SessionStore::load(config.session_file.clone()).await;
        let client = ApiClient::new(&config, store).unwrap();

        assert_eq!(client.url("/Language"), "http://localhost:5000/api/Language");
        assert_eq!(client.url("User/7"), "http://localhost:5000/api/User/7");
    }

    #[test]
    fn test_resource_path_encodes_one_segment() {
        assert_eq!(resource_path("/User", "u-1").unwrap(), "/User/u-1");
        assert_eq!(
            resource_path("/Document/translate/status", "job#1").unwrap(),
            "/Document/translate/status/job%231"
        );
        assert_eq!(
            resource_path("/Document/translate/status", "../../../User/u-1").unwrap(),
            "/Document/translate/status/..%2F..%2F..%2FUser%2Fu-1"
        );
        assert_eq!(resource_path("/User", "a b?c").unwrap(), "/User/a%20b%3Fc");
    }

    #[test]
    fn test_resource_path_rejects_dot_segments() {
        for id in ["", ".", ".."] {
            assert!(
                matches!(resource_path("/User", id), Err(ApiError::Validation(_))),
                "id {:?} should be rejected",
                id
            );
        }
    }

    #[test]
    fn test_de_id_accepts_strings_and_numbers() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(deserialize_with = "de_id")]
            id: String,
        }

        let a: Row = serde_json::from_str(r#"{"id": "abc-1"}"#).unwrap();
        let b: Row = serde_json::from_str(r#"{"id": 17}"#).unwrap();
        assert_eq!(a.id, "abc-1");
        assert_eq!(b.id, "17");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ქართული ტექსტი", 7), "ქართული...");
    }

    #[tokio::test]
    async fn test_not_authenticated_makes_no_request() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let config = Config::with_base_url(&server.uri(), dir.path().join("session.json"));
        let store = SessionStore::load(config.session_file.clone()).await;
        let client = ApiClient::new(&config, store).unwrap();

        let result: Result<Ping, _> = client.get_json("/ping").await;
        assert!(matches!(result, Err(ApiError::NotAuthenticated)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_401_triggers_exactly_one_refresh_and_retry() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let client = client_with_session(&server, &dir).await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("Authorization", "Bearer stale-token"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/Auth/refresh-token"))
            .and(body_json(serde_json::json!({
                "refreshToken": "refresh-1",
                "accessToken": "stale-token"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "fresh-token",
                "refreshToken": "refresh-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(header("Authorization", "Bearer fresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let ping: Ping = client.get_json("/ping").await.unwrap();
        assert!(ping.ok);
        assert_eq!(
            client.session().access_token().await.as_deref(),
            Some("fresh-token")
        );
        assert_eq!(
            client.session().refresh_token().await.as_deref(),
            Some("refresh-2")
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_logs_out() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let client = client_with_session(&server, &dir).await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/Auth/refresh-token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid refresh token"))
            .expect(1)
            .mount(&server)
            .await;

        let result: Result<Ping, _> = client.get_json("/ping").await;
        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert!(!client.session().is_authenticated().await);
        assert!(!dir.path().join("session.json").exists());
    }

    #[tokio::test]
    async fn test_second_401_after_refresh_logs_out() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let client = client_with_session(&server, &dir).await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/Auth/refresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "fresh-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result: Result<Ping, _> = client.get_json("/ping").await;
        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert!(!client.session().is_authenticated().await);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let client = client_with_session(&server, &dir).await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({"message": "bad"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result: Result<Ping, _> = client.get_json("/ping").await;
        match result {
            Err(ApiError::Server { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_for_gets() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let client = client_with_session(&server, &dir).await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let retry = RetryConfig::new(2, Duration::from_millis(10));
        let ping: Ping = client.get_json_with(&retry, "/ping").await.unwrap();
        assert!(ping.ok);
    }

    #[tokio::test]
    async fn test_malformed_json_is_decode_error() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let client = client_with_session(&server, &dir).await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result: Result<Ping, _> = client.get_json("/ping").await;
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }
}
