//! Phone-based authentication endpoints.

use crate::api::{de_id, ApiClient};
use crate::error::ApiError;
use crate::session::Session;
use crate::user::User;
use crate::validation::{normalize_phone, LoginForm, RegistrationForm};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeRequest<'a> {
    phone_number: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    phone_number: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    phone_number: &'a str,
    verification_code: &'a str,
    password: &'a str,
    confirm_password: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
}

/// Token payload returned by login, registration and refresh
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(alias = "accessToken", alias = "jwtToken")]
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub user_id: Option<String>,
    pub user: Option<User>,
    pub message: Option<String>,
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "de_id")] String);

    Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|w| w.0))
}

impl AuthResponse {
    fn into_session(self) -> Option<Session> {
        let token = self.token?;
        let mut session = Session::new(token, self.refresh_token, self.user);
        if session.user_id.is_none() {
            session.user_id = self.user_id;
        }
        Some(session)
    }
}

impl ApiClient {
    /// Ask the backend to text a verification code to `phone`
    pub async fn send_verification_code(&self, phone: &str) -> Result<(), ApiError> {
        let phone = normalize_phone(phone).ok_or_else(|| {
            let mut errors = crate::validation::ValidationErrors::new();
            errors.add("phone", "Enter a Georgian mobile number, e.g. 5XX XXX XXX");
            ApiError::Validation(errors)
        })?;

        self.post_public_unit(
            "/Auth/send-verification-code",
            &SendCodeRequest {
                phone_number: &phone,
            },
        )
        .await?;

        info!("Verification code sent");
        Ok(())
    }

    pub async fn login_with_phone(&self, form: &LoginForm) -> Result<Session, ApiError> {
        form.validate()?;
        let phone = normalize_phone(&form.phone).unwrap_or_else(|| form.phone.clone());

        let response: AuthResponse = self
            .post_public(
                "/Auth/login-with-phone",
                &LoginRequest {
                    phone_number: &phone,
                    password: &form.password,
                },
            )
            .await?;

        let session = response
            .into_session()
            .ok_or_else(|| ApiError::Decode("login response carried no token".to_string()))?;
        self.session().set(session.clone()).await?;

        // Older backends return only the id; fetch the profile so the cache is complete
        if session.user.is_none() && session.user_id.is_some() {
            if let Err(e) = self.current_user().await {
                warn!("Profile fetch after login failed, discarding session: {}", e);
                self.session().clear().await?;
                return Err(e);
            }
        }

        info!("Logged in");
        self.session()
            .current()
            .await
            .ok_or(ApiError::NotAuthenticated)
    }

    /// Register a new account; logs the user in when the backend returns tokens
    pub async fn register_with_phone(
        &self,
        form: &RegistrationForm,
    ) -> Result<Option<Session>, ApiError> {
        form.validate()?;
        let phone = normalize_phone(&form.phone).unwrap_or_else(|| form.phone.clone());
        let email = form
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());

        let response: AuthResponse = self
            .post_public(
                "/Auth/register-with-phone",
                &RegisterRequest {
                    phone_number: &phone,
                    verification_code: form.verification_code.trim(),
                    password: &form.password,
                    confirm_password: &form.confirm_password,
                    first_name: form.first_name.trim(),
                    last_name: form.last_name.trim(),
                    email,
                },
            )
            .await?;

        info!("Registered new account");
        match response.into_session() {
            Some(session) => {
                self.session().set(session.clone()).await?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Exchange the stored refresh token for a new access token
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let refresh_token = self
            .session()
            .refresh_token()
            .await
            .ok_or(ApiError::SessionExpired)?;
        let access_token = self.session().access_token().await;

        let response: AuthResponse = self
            .post_public(
                "/Auth/refresh-token",
                &RefreshRequest {
                    refresh_token: &refresh_token,
                    access_token: access_token.as_deref(),
                },
            )
            .await?;

        let token = response
            .token
            .ok_or_else(|| ApiError::Decode("refresh response carried no token".to_string()))?;
        self.session()
            .update_tokens(token.clone(), response.refresh_token)
            .await?;

        info!("Access token refreshed");
        Ok(token)
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.session().clear().await?;
        info!("Logged out");
        Ok(())
    }

    /// The logged-in user, fetching and caching the profile when only an id is known
    pub async fn current_user(&self) -> Result<User, ApiError> {
        if let Some(user) = self.session().user().await {
            return Ok(user);
        }
        let id = self.session().require_user_id().await?;
        let user = self.get_user(&id).await?;
        self.session().set_user(user.clone()).await?;
        Ok(user)
    }
}
