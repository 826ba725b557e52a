use crate::api::{resource_path, ApiClient};
use crate::error::ApiError;
use crate::validation::LanguageForm;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A translation language from the backend's reference list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub name_geo: Option<String>,
}

impl Language {
    /// "English (ინგლისური)" when the Georgian name is known
    pub fn label(&self) -> String {
        match self.name_geo.as_deref().filter(|n| !n.is_empty()) {
            Some(geo) => format!("{} ({})", self.name, geo),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewLanguage<'a> {
    name: &'a str,
    name_geo: &'a str,
}

/// Resolve a language by numeric id, English name or Georgian name
pub fn find_language<'a>(languages: &'a [Language], query: &str) -> Option<&'a Language> {
    let query = query.trim();
    if let Ok(id) = query.parse::<i64>() {
        return languages.iter().find(|l| l.id == id);
    }
    let lower = query.to_lowercase();
    languages.iter().find(|l| {
        l.name.to_lowercase() == lower || l.name_geo.as_deref().is_some_and(|g| g == query)
    })
}

impl ApiClient {
    /// The language list, fetched once per client.
    ///
    /// Opening the language selector requires a login: an anonymous caller
    /// gets `NotAuthenticated` before any request is made.
    pub async fn list_languages(&self) -> Result<Vec<Language>, ApiError> {
        if !self.session().is_authenticated().await {
            return Err(ApiError::NotAuthenticated);
        }
        if let Some(cached) = self.language_cache.read().await.as_ref() {
            debug!("Using cached language list ({} entries)", cached.len());
            return Ok(cached.clone());
        }
        self.refresh_languages().await
    }

    /// Fetch the language list from the server, bypassing the cache
    pub async fn refresh_languages(&self) -> Result<Vec<Language>, ApiError> {
        let languages: Vec<Language> = self.get_json("/Language").await?;
        info!("Loaded {} languages", languages.len());
        *self.language_cache.write().await = Some(languages.clone());
        Ok(languages)
    }

    pub async fn resolve_language(&self, query: &str) -> Result<Language, ApiError> {
        let languages = self.list_languages().await?;
        find_language(&languages, query)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("language '{}'", query)))
    }

    /// Admin: add a language to the reference list
    pub async fn add_language(&self, form: &LanguageForm) -> Result<(), ApiError> {
        form.validate()?;
        self.require_admin().await?;
        self.send_json(
            Method::POST,
            "/Language",
            Some(&NewLanguage {
                name: form.name.trim(),
                name_geo: form.name_geo.trim(),
            }),
        )
        .await?;
        self.invalidate_languages().await;
        info!("Added language {}", form.name.trim());
        Ok(())
    }

    /// Admin: remove a language by id
    pub async fn delete_language(&self, id: i64) -> Result<(), ApiError> {
        self.require_admin().await?;
        self.send_json::<()>(Method::DELETE, &resource_path("/Language", &id.to_string())?, None)
            .await?;
        self.invalidate_languages().await;
        info!("Deleted language {}", id);
        Ok(())
    }

    async fn invalidate_languages(&self) {
        *self.language_cache.write().await = None;
    }
}
