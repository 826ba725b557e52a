//! Persisted client session.
//!
//! Holds the bearer and refresh tokens plus a cached copy of the logged-in
//! user. Every change is written through to a JSON file so that separate CLI
//! invocations share one login. Logout and unrecoverable 401s clear both the
//! in-memory copy and the file.

use crate::error::ApiError;
use crate::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: Option<String>,
    pub user: Option<User>,
    pub saved_at: DateTime<Utc>,
}

// Tokens stay out of logs
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("user", &self.user)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("saved_at", &self.saved_at)
            .finish()
    }
}

impl Session {
    pub fn new(access_token: String, refresh_token: Option<String>, user: Option<User>) -> Self {
        Self {
            access_token,
            refresh_token,
            user_id: user.as_ref().map(|u| u.id.clone()),
            user,
            saved_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    /// Load the session persisted at `path`.
    ///
    /// A missing file means "logged out". A corrupt file is logged and treated
    /// the same way rather than failing every command.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let session = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<Session>(&contents) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Could not read session file {}: {}", path.display(), e);
                None
            }
        };

        Self {
            path,
            inner: Arc::new(RwLock::new(session)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn current(&self) -> Option<Session> {
        self.inner.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.read().await.is_some()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|s| s.access_token.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
    }

    pub async fn user(&self) -> Option<User> {
        self.inner.read().await.as_ref().and_then(|s| s.user.clone())
    }

    /// The cached user, or `NotAuthenticated` without touching the network
    pub async fn require_user(&self) -> Result<User, ApiError> {
        self.user().await.ok_or(ApiError::NotAuthenticated)
    }

    /// The id of the logged-in user, even when the profile is not cached yet
    pub async fn require_user_id(&self) -> Result<String, ApiError> {
        let guard = self.inner.read().await;
        let session = guard.as_ref().ok_or(ApiError::NotAuthenticated)?;
        session
            .user
            .as_ref()
            .map(|u| u.id.clone())
            .or_else(|| session.user_id.clone())
            .ok_or(ApiError::NotAuthenticated)
    }

    pub async fn set(&self, session: Session) -> Result<(), ApiError> {
        let mut guard = self.inner.write().await;
        *guard = Some(session);
        self.persist(guard.as_ref()).await
    }

    /// Replace the tokens after a refresh, keeping the cached user
    pub async fn update_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<(), ApiError> {
        let mut guard = self.inner.write().await;
        match guard.as_mut() {
            Some(session) => {
                session.access_token = access_token;
                if refresh_token.is_some() {
                    session.refresh_token = refresh_token;
                }
                session.saved_at = Utc::now();
            }
            None => *guard = Some(Session::new(access_token, refresh_token, None)),
        }
        self.persist(guard.as_ref()).await
    }

    pub async fn set_user(&self, user: User) -> Result<(), ApiError> {
        let mut guard = self.inner.write().await;
        let Some(session) = guard.as_mut() else {
            return Err(ApiError::NotAuthenticated);
        };
        session.user_id = Some(user.id.clone());
        session.user = Some(user);
        session.saved_at = Utc::now();
        self.persist(guard.as_ref()).await
    }

    /// Forget the session in memory and on disk
    pub async fn clear(&self) -> Result<(), ApiError> {
        let mut guard = self.inner.write().await;
        *guard = None;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Removed session file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, session: Option<&Session>) -> Result<(), ApiError> {
        let Some(session) = session else {
            return Ok(());
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(session)
            .map_err(|e| ApiError::Decode(format!("failed to encode session: {}", e)))?;
        tokio::fs::write(&self.path, json).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        debug!("Saved session to {}", self.path.display());
        Ok(())
    }
}
