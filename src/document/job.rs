//! Translation job status and the client-side store for the active job.

use crate::document::suggestions::Suggestion;
use crate::document::DocumentResult;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Processing)
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "processing" | "pending" | "queued" => Some(JobState::Processing),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for JobState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        JobState::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown job status '{}'", raw)))
    }
}

/// Payload of `GET /Document/translate/status/{jobId}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default)]
    pub job_id: Option<String>,
    pub status: JobState,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub estimated_remaining_minutes: Option<f64>,
}

impl JobStatus {
    /// One-line progress summary for terminals and logs
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("{:?}", self.status)];
        if let Some(progress) = self.progress {
            parts.push(format!("{:.0}%", progress.clamp(0.0, 100.0)));
        }
        if let Some(minutes) = self.estimated_remaining_minutes.filter(|m| *m > 0.0) {
            parts.push(format!("~{:.0} min left", minutes.ceil()));
        }
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            parts.push(message.to_string());
        }
        parts.join(" | ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceState {
    pub active_job: Option<String>,
    pub status: Option<JobStatus>,
    pub result: Option<DocumentResult>,
    pub suggestions: Vec<Suggestion>,
    pub error: Option<String>,
}

/// Client-side store for the document job the user is looking at.
///
/// Every update names the job it belongs to. Updates for any job other than
/// the active one are dropped, so an older polling loop that is still running
/// after a newer submit cannot overwrite the newer job's state.
#[derive(Debug, Clone, Default)]
pub struct DocumentWorkspace {
    state: Arc<Mutex<WorkspaceState>>,
}

impl DocumentWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut WorkspaceState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn with_active<R>(&self, job_id: &str, f: impl FnOnce(&mut WorkspaceState) -> R) -> Option<R> {
        self.with_state(|state| {
            if state.active_job.as_deref() == Some(job_id) {
                Some(f(state))
            } else {
                debug!("Dropping update for inactive job {}", job_id);
                None
            }
        })
    }

    /// Make `job_id` the active job, discarding everything about the previous one
    pub fn start(&self, job_id: &str) {
        self.with_state(|state| {
            *state = WorkspaceState {
                active_job: Some(job_id.to_string()),
                ..Default::default()
            };
        });
    }

    pub fn active_job(&self) -> Option<String> {
        self.with_state(|state| state.active_job.clone())
    }

    /// Returns false when the update was for a job that is no longer active
    pub fn set_status(&self, job_id: &str, status: JobStatus) -> bool {
        self.with_active(job_id, |state| state.status = Some(status))
            .is_some()
    }

    pub fn set_result(&self, job_id: &str, result: DocumentResult) -> bool {
        self.with_active(job_id, |state| state.result = Some(result))
            .is_some()
    }

    pub fn set_suggestions(&self, job_id: &str, suggestions: Vec<Suggestion>) -> bool {
        self.with_active(job_id, |state| state.suggestions = suggestions)
            .is_some()
    }

    pub fn set_error(&self, job_id: &str, message: String) -> bool {
        self.with_active(job_id, |state| state.error = Some(message))
            .is_some()
    }

    pub fn snapshot(&self) -> WorkspaceState {
        self.with_state(|state| state.clone())
    }

    pub fn clear(&self) {
        self.with_state(|state| *state = WorkspaceState::default());
    }
}
