use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Backend
    pub api_base_url: String,
    pub request_timeout: Duration,

    // Session persistence
    pub session_file: PathBuf,

    // Job polling
    pub poll_interval: Duration,
    pub poll_max: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_base_url = std::env::var("API_BASE_URL").context("API_BASE_URL not set")?;

        let poll_interval_secs: u64 = std::env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(
                std::env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            ),

            session_file: match std::env::var("SULIKO_SESSION_FILE") {
                Ok(path) => PathBuf::from(path),
                Err(_) => session_file_under(dirs::home_dir())?,
            },

            // A zero interval would turn the poll loop into a busy loop
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            poll_max: Duration::from_secs(
                std::env::var("POLL_MAX_MINUTES")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60)
                    .saturating_mul(60),
            ),
        })
    }

    /// Build a config for a known base URL with default polling and session settings
    pub fn with_base_url(api_base_url: &str, session_file: PathBuf) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(60),
            session_file,
            poll_interval: Duration::from_secs(3),
            poll_max: Duration::from_secs(60 * 60),
        }
    }
}

/// `<home>/.suliko/session.json`; tokens are never written relative to the
/// working directory
fn session_file_under(home: Option<PathBuf>) -> Result<PathBuf> {
    let home = home
        .filter(|h| !h.as_os_str().is_empty())
        .context("no home directory found; set SULIKO_SESSION_FILE")?;
    Ok(home.join(".suliko").join("session.json"))
}
