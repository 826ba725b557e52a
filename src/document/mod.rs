//! Document translation: upload, job polling, result download.
//!
//! The lifecycle is submit -> poll status -> fetch result, with the
//! suggestions fetch running alongside the result download. A failed
//! suggestions fetch never fails the translation.

pub mod job;
pub mod suggestions;

use crate::api::{decode_json, resource_path, ApiClient};
use crate::error::ApiError;
use crate::retry::RetryConfig;
use futures::join;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

pub use job::{DocumentWorkspace, JobState, JobStatus, WorkspaceState};
pub use suggestions::{Decision, Suggestion, SuggestionReview};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

/// Which backend pipeline handles the upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DocumentKind {
    /// Text-based documents (DOCX, PDF with a text layer, TXT)
    Standard,
    /// Scanned documents and images, recognised with Tesseract
    Ocr,
    /// SRT subtitle files
    Subtitle,
}

impl DocumentKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            DocumentKind::Standard => "/Document/translate",
            DocumentKind::Ocr => "/Document/tesseract/translate",
            DocumentKind::Subtitle => "/Document/srt/translate",
        }
    }

    /// Guess the pipeline from the file extension
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if ext == "srt" {
            DocumentKind::Subtitle
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            DocumentKind::Ocr
        } else {
            DocumentKind::Standard
        }
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "txt" => "text/plain",
        "srt" => "application/x-subrip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub target_language_id: i64,
    pub source_language_id: Option<i64>,
    pub kind: DocumentKind,
}

impl DocumentUpload {
    /// Read a file from disk; `kind` defaults to a guess from the extension
    pub async fn from_path(
        path: &Path,
        target_language_id: i64,
        source_language_id: Option<i64>,
        kind: Option<DocumentKind>,
    ) -> Result<Self, ApiError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();

        Ok(Self {
            file_name,
            bytes,
            target_language_id,
            source_language_id,
            kind: kind.unwrap_or_else(|| DocumentKind::for_path(path)),
        })
    }

    fn form(&self) -> Result<Form, ApiError> {
        let part = Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(mime_for(&self.file_name))?;

        let mut form = Form::new()
            .part("file", part)
            .text("targetLanguageId", self.target_language_id.to_string());
        if let Some(source) = self.source_language_id {
            form = form.text("sourceLanguageId", source.to_string());
        }
        Ok(form)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    job_id: String,
}

/// A downloaded translation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentResult {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl DocumentResult {
    /// Where to save the result when the caller gave no path.
    ///
    /// Uses the final component of the server's file name, else
    /// `<stem>.<job id prefix>.<ext>` derived from the uploaded file.
    pub fn default_path(&self, input: &Path, job_id: &str) -> PathBuf {
        if let Some(name) = self
            .file_name
            .as_deref()
            .and_then(|n| Path::new(n).file_name())
        {
            return PathBuf::from(name);
        }
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let ext = input.extension().and_then(|e| e.to_str()).unwrap_or("bin");
        let short_id = job_id.get(..8).unwrap_or(job_id);
        PathBuf::from(format!("{}.{}.{}", stem, short_id, ext))
    }

    /// Write the bytes to `output`, or to [`default_path`](Self::default_path)
    pub async fn save(
        &self,
        output: Option<PathBuf>,
        input: &Path,
        job_id: &str,
    ) -> Result<PathBuf, ApiError> {
        let path = output.unwrap_or_else(|| self.default_path(input, job_id));
        tokio::fs::write(&path, &self.bytes).await?;
        info!("Saved job {} result to {}", job_id, path.display());
        Ok(path)
    }
}

#[derive(Debug, Clone)]
pub struct TranslatedDocument {
    pub job_id: String,
    pub status: JobStatus,
    pub result: DocumentResult,
    pub suggestions: Vec<Suggestion>,
}

/// Extract the file name from a `Content-Disposition` header value,
/// preferring the RFC 5987 `filename*` form
pub fn parse_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = raw.trim().trim_matches('"');
                let encoded = encoded
                    .split_once("''")
                    .map(|(_, rest)| rest)
                    .unwrap_or(encoded);
                if let Ok(decoded) = urlencoding::decode(encoded) {
                    return Some(decoded.into_owned());
                }
            }
            "filename" => plain = Some(raw.trim().trim_matches('"').to_string()),
            _ => {}
        }
    }
    plain.filter(|name| !name.is_empty())
}

impl ApiClient {
    /// Upload a document and return the server's job id
    pub async fn submit_document(&self, upload: &DocumentUpload) -> Result<String, ApiError> {
        // Fail before the first request rather than inside the retry closure
        upload.form()?;

        let url = self.url(upload.kind.endpoint());
        info!(
            "Submitting {} ({} bytes) to {}",
            upload.file_name,
            upload.bytes.len(),
            upload.kind.endpoint()
        );

        let response = self
            .send_authorized(|http| {
                let request = http.post(&url);
                match upload.form() {
                    Ok(form) => request.multipart(form),
                    Err(_) => request,
                }
            })
            .await?;

        let submitted: SubmitResponse = decode_json(response).await?;
        info!("Document accepted as job {}", submitted.job_id);
        Ok(submitted.job_id)
    }

    pub async fn job_status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        self.get_json_with(
            &RetryConfig::status_poll(),
            &resource_path("/Document/translate/status", job_id)?,
        )
        .await
    }

    /// Download the translated document
    pub async fn job_result(&self, job_id: &str) -> Result<DocumentResult, ApiError> {
        let url = self.url(&resource_path("/Document/translate/result", job_id)?);
        let response = self.send_authorized(|http| http.get(&url)).await?;

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let file_name = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition);

        let bytes = response.bytes().await?.to_vec();
        info!("Downloaded result of job {} ({} bytes)", job_id, bytes.len());

        Ok(DocumentResult {
            bytes,
            content_type,
            file_name,
        })
    }

    /// Poll until the job is terminal, reporting every status seen.
    ///
    /// Bounded by the configured maximum wait; dropping the returned future
    /// stops polling.
    pub async fn wait_for_job<F>(&self, job_id: &str, mut on_progress: F) -> Result<JobStatus, ApiError>
    where
        F: FnMut(&JobStatus),
    {
        let started = Instant::now();

        loop {
            let status = self.job_status(job_id).await?;
            on_progress(&status);

            match status.status {
                JobState::Completed => {
                    info!("Job {} completed", job_id);
                    return Ok(status);
                }
                JobState::Failed => {
                    warn!(
                        "Job {} failed: {}",
                        job_id,
                        status.message.as_deref().unwrap_or("no message")
                    );
                    return Err(ApiError::from_job_message(status.message.as_deref()));
                }
                JobState::Processing => {}
            }

            if started.elapsed() + self.poll_interval > self.poll_max {
                return Err(ApiError::PollTimeout {
                    job_id: job_id.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Run the whole lifecycle for one upload, mirroring it into `workspace`
    pub async fn translate_document<F>(
        &self,
        upload: &DocumentUpload,
        workspace: &DocumentWorkspace,
        mut on_progress: F,
    ) -> Result<TranslatedDocument, ApiError>
    where
        F: FnMut(&JobStatus),
    {
        let job_id = self.submit_document(upload).await?;
        workspace.start(&job_id);

        let status = match self
            .wait_for_job(&job_id, |status| {
                workspace.set_status(&job_id, status.clone());
                on_progress(status);
            })
            .await
        {
            Ok(status) => status,
            Err(e) => {
                workspace.set_error(&job_id, e.user_message());
                return Err(e);
            }
        };

        let (result, suggestions) = join!(self.job_result(&job_id), self.suggestions(&job_id));

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                workspace.set_error(&job_id, e.user_message());
                return Err(e);
            }
        };
        workspace.set_result(&job_id, result.clone());

        let suggestions = suggestions.unwrap_or_else(|e| {
            warn!("Could not load suggestions for job {}: {}", job_id, e);
            Vec::new()
        });
        workspace.set_suggestions(&job_id, suggestions.clone());

        Ok(TranslatedDocument {
            job_id,
            status,
            result,
            suggestions,
        })
    }
}
