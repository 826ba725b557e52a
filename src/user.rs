use crate::api::{de_id, resource_path, ApiClient};
use crate::error::ApiError;
use crate::validation::{normalize_phone, ProfileForm};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_role_id")]
    pub role_id: Option<String>,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub balance: f64,
}

fn de_opt_role_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "de_id")] String);

    Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|w| w.0))
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role_name
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case("admin"))
    }

    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        self.user_name
            .clone()
            .or_else(|| self.phone_number.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

/// Full profile body for `PUT /User/{id}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl UserProfileUpdate {
    /// Merge the edited form fields over the current profile
    pub fn merge(current: &User, form: &ProfileForm) -> Self {
        Self {
            first_name: form
                .first_name
                .as_ref()
                .map(|s| s.trim().to_string())
                .or_else(|| current.first_name.clone()),
            last_name: form
                .last_name
                .as_ref()
                .map(|s| s.trim().to_string())
                .or_else(|| current.last_name.clone()),
            email: match form.email.as_deref().map(str::trim) {
                Some("") => None,
                Some(email) => Some(email.to_string()),
                None => current.email.clone(),
            },
            phone_number: form
                .phone
                .as_deref()
                .and_then(normalize_phone)
                .or_else(|| current.phone_number.clone()),
        }
    }
}

/// Partial body for `PATCH /User/{id}`; only set fields are sent
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ApiClient {
    pub async fn get_user(&self, id: &str) -> Result<User, ApiError> {
        self.get_json(&resource_path("/User", id)?).await
    }

    /// Update the logged-in user's own profile and refresh the cached copy
    pub async fn update_profile(&self, form: &ProfileForm) -> Result<User, ApiError> {
        form.validate()?;
        let current = self.current_user().await?;
        let body = UserProfileUpdate::merge(&current, form);

        let updated = self.update_user(&current.id, &body).await?;
        self.session().set_user(updated.clone()).await?;
        info!("Profile updated");
        Ok(updated)
    }

    /// `PUT /User/{id}`; falls back to a fresh GET when the backend answers without a body
    pub async fn update_user(&self, id: &str, body: &UserProfileUpdate) -> Result<User, ApiError> {
        let response = self
            .send_json(Method::PUT, &resource_path("/User", id)?, Some(body))
            .await?;
        self.user_from_response(id, response).await
    }

    /// Admin: partial update such as a balance top-up or role change
    pub async fn patch_user(&self, id: &str, patch: &UserPatch) -> Result<User, ApiError> {
        self.require_admin().await?;
        let response = self
            .send_json(Method::PATCH, &resource_path("/User", id)?, Some(patch))
            .await?;
        info!("Patched user {}", id);
        self.user_from_response(id, response).await
    }

    /// Admin: remove an account
    pub async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        self.require_admin().await?;
        self.send_json::<()>(Method::DELETE, &resource_path("/User", id)?, None)
            .await?;
        info!("Deleted user {}", id);
        Ok(())
    }

    /// Admin: every account, in server order
    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.require_admin().await?;
        self.get_json("/User").await
    }

    pub(crate) async fn require_admin(&self) -> Result<User, ApiError> {
        let user = self.session().require_user().await?;
        if user.is_admin() {
            Ok(user)
        } else {
            Err(ApiError::Forbidden("administrator role required".to_string()))
        }
    }

    async fn user_from_response(
        &self,
        id: &str,
        response: reqwest::Response,
    ) -> Result<User, ApiError> {
        let body = response.text().await?;
        if body.trim().is_empty() {
            return self.get_user(id).await;
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

// ==================== Admin user table ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserColumn {
    Name,
    Email,
    Phone,
    Role,
    Balance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// In-memory view over the admin user list: search plus three-state column sort.
#[derive(Debug, Clone, Default)]
pub struct UserTable {
    users: Vec<User>,
    query: String,
    sort: Option<(UserColumn, SortDirection)>,
}

impl UserTable {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users,
            query: String::new(),
            sort: None,
        }
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.trim().to_lowercase();
    }

    pub fn sort_state(&self) -> Option<(UserColumn, SortDirection)> {
        self.sort
    }

    /// Header click: none -> asc -> desc -> none on the same column,
    /// and a different column always starts at asc
    pub fn toggle_sort(&mut self, column: UserColumn) {
        self.sort = match self.sort {
            Some((current, SortDirection::Asc)) if current == column => {
                Some((column, SortDirection::Desc))
            }
            Some((current, SortDirection::Desc)) if current == column => None,
            _ => Some((column, SortDirection::Asc)),
        };
    }

    pub fn remove(&mut self, id: &str) {
        self.users.retain(|u| u.id != id);
    }

    pub fn replace(&mut self, user: User) {
        if let Some(slot) = self.users.iter_mut().find(|u| u.id == user.id) {
            *slot = user;
        }
    }

    /// Rows to display: filtered by the query, then sorted (stable)
    pub fn rows(&self) -> Vec<&User> {
        let mut rows: Vec<&User> = self
            .users
            .iter()
            .filter(|u| matches_query(u, &self.query))
            .collect();

        if let Some((column, direction)) = self.sort {
            rows.sort_by(|a, b| {
                let ord = compare_by(a, b, column);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        rows
    }
}

fn matches_query(user: &User, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    [
        user.user_name.as_deref(),
        user.first_name.as_deref(),
        user.last_name.as_deref(),
        user.email.as_deref(),
        user.phone_number.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(query))
}

fn compare_by(a: &User, b: &User, column: UserColumn) -> Ordering {
    fn text(value: &Option<String>) -> String {
        value.as_deref().unwrap_or_default().to_lowercase()
    }

    match column {
        UserColumn::Name => a.display_name().to_lowercase().cmp(&b.display_name().to_lowercase()),
        UserColumn::Email => text(&a.email).cmp(&text(&b.email)),
        UserColumn::Phone => text(&a.phone_number).cmp(&text(&b.phone_number)),
        UserColumn::Role => text(&a.role_name).cmp(&text(&b.role_name)),
        UserColumn::Balance => a.balance.total_cmp(&b.balance),
    }
}
