//! AI correction suggestions for a translated document and the review
//! workflow (accept / reject / edit) that precedes applying them.

use crate::api::{de_id, resource_path, ApiClient};
use crate::error::ApiError;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub original_text: String,
    pub suggested_text: String,
}

/// The suggestions endpoint has returned both a bare array and a wrapper object
#[derive(Deserialize)]
#[serde(untagged)]
enum SuggestionsPayload {
    List(Vec<Suggestion>),
    Wrapped { suggestions: Vec<Suggestion> },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplySuggestionRequest<'a> {
    job_id: &'a str,
    suggestion_id: &'a str,
    original_text: &'a str,
    suggested_text: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Pending,
    Accepted,
    Rejected,
    Edited(String),
}

#[derive(Debug, Clone)]
struct ReviewEntry {
    suggestion: Suggestion,
    decision: Decision,
    applied: bool,
}

/// Per-suggestion decisions for one job
#[derive(Debug, Clone, Default)]
pub struct SuggestionReview {
    entries: Vec<ReviewEntry>,
}

impl SuggestionReview {
    pub fn new(suggestions: Vec<Suggestion>) -> Self {
        Self {
            entries: suggestions
                .into_iter()
                .map(|suggestion| ReviewEntry {
                    suggestion,
                    decision: Decision::Pending,
                    applied: false,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut ReviewEntry, ApiError> {
        self.entries
            .iter_mut()
            .find(|e| e.suggestion.id == id)
            .ok_or_else(|| ApiError::NotFound(format!("suggestion {}", id)))
    }

    fn decide(&mut self, id: &str, decision: Decision) -> Result<(), ApiError> {
        let entry = self.entry_mut(id)?;
        if entry.applied {
            return Err(ApiError::Forbidden(format!(
                "suggestion {} was already applied",
                id
            )));
        }
        entry.decision = decision;
        Ok(())
    }

    pub fn accept(&mut self, id: &str) -> Result<(), ApiError> {
        self.decide(id, Decision::Accepted)
    }

    pub fn reject(&mut self, id: &str) -> Result<(), ApiError> {
        self.decide(id, Decision::Rejected)
    }

    /// Accept with user-edited text. Editing back to the original suggestion counts as a plain accept.
    pub fn edit(&mut self, id: &str, text: &str) -> Result<(), ApiError> {
        let entry = self.entry_mut(id)?;
        let decision = if text == entry.suggestion.suggested_text {
            Decision::Accepted
        } else {
            Decision::Edited(text.to_string())
        };
        self.decide(id, decision)
    }

    pub fn reset(&mut self, id: &str) -> Result<(), ApiError> {
        self.decide(id, Decision::Pending)
    }

    /// Accept every suggestion still pending; decided ones are left alone
    pub fn accept_all(&mut self) {
        for entry in self.entries.iter_mut().filter(|e| !e.applied) {
            if entry.decision == Decision::Pending {
                entry.decision = Decision::Accepted;
            }
        }
    }

    pub fn decision(&self, id: &str) -> Option<&Decision> {
        self.entries
            .iter()
            .find(|e| e.suggestion.id == id)
            .map(|e| &e.decision)
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.decision == Decision::Pending)
            .count()
    }

    /// Accepted and edited suggestions not yet applied, carrying the final text
    pub fn to_apply(&self) -> Vec<Suggestion> {
        self.entries
            .iter()
            .filter(|e| !e.applied)
            .filter_map(|e| match &e.decision {
                Decision::Accepted => Some(e.suggestion.clone()),
                Decision::Edited(text) => Some(Suggestion {
                    suggested_text: text.clone(),
                    ..e.suggestion.clone()
                }),
                Decision::Pending | Decision::Rejected => None,
            })
            .collect()
    }

    fn mark_applied(&mut self, id: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.suggestion.id == id) {
            entry.applied = true;
        }
    }

    pub fn suggestions(&self) -> impl Iterator<Item = (&Suggestion, &Decision)> {
        self.entries.iter().map(|e| (&e.suggestion, &e.decision))
    }
}

impl ApiClient {
    pub async fn suggestions(&self, job_id: &str) -> Result<Vec<Suggestion>, ApiError> {
        let payload: SuggestionsPayload = self
            .get_json(&resource_path("/Document/translate/suggestions", job_id)?)
            .await?;
        let suggestions = match payload {
            SuggestionsPayload::List(list) => list,
            SuggestionsPayload::Wrapped { suggestions } => suggestions,
        };
        debug!("Job {} has {} suggestions", job_id, suggestions.len());
        Ok(suggestions)
    }

    pub async fn apply_suggestion(
        &self,
        job_id: &str,
        suggestion: &Suggestion,
    ) -> Result<(), ApiError> {
        self.send_json(
            Method::POST,
            "/Document/apply-suggestion",
            Some(&ApplySuggestionRequest {
                job_id,
                suggestion_id: &suggestion.id,
                original_text: &suggestion.original_text,
                suggested_text: &suggestion.suggested_text,
            }),
        )
        .await?;
        Ok(())
    }

    /// Apply every accepted or edited suggestion in order.
    ///
    /// Stops at the first failure; suggestions applied before it stay marked,
    /// so calling again resumes where it left off. Returns how many were applied.
    pub async fn apply_review(
        &self,
        job_id: &str,
        review: &mut SuggestionReview,
    ) -> Result<usize, ApiError> {
        let mut applied = 0;
        for suggestion in review.to_apply() {
            self.apply_suggestion(job_id, &suggestion).await?;
            review.mark_applied(&suggestion.id);
            applied += 1;
        }
        info!("Applied {} suggestions to job {}", applied, job_id);
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::{Session, SessionStore};
    use tempfile::TempDir;
    use wiremock::{
        matchers::{body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn suggestion(id: &str) -> Suggestion {
        Suggestion {
            id: id.to_string(),
            title: format!("Fix {}", id),
            description: "Terminology".to_string(),
            original_text: format!("original {}", id),
            suggested_text: format!("suggested {}", id),
        }
    }

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
    fn test_payload_shapes() {
        let list = r#"[{"id": 1, "title": "t", "description": "d", "originalText": "a", "suggestedText": "b"}]"#;
        let wrapped = r#"{"suggestions": [{"id": "s1", "originalText": "a", "suggestedText": "b"}]}"#;

        match serde_json::from_str::<SuggestionsPayload>(list).unwrap() {
            SuggestionsPayload::List(items) => assert_eq!(items[0].id, "1"),
            SuggestionsPayload::Wrapped { .. } => panic!("expected list"),
        }
        match serde_json::from_str::<SuggestionsPayload>(wrapped).unwrap() {
            SuggestionsPayload::Wrapped { suggestions } => {
                assert_eq!(suggestions[0].id, "s1");
                assert!(suggestions[0].title.is_empty());
            }
            SuggestionsPayload::List(_) => panic!("expected wrapper"),
        }
    }

    #[test]
    fn test_review_decisions() {
        let mut review = SuggestionReview::new(vec![suggestion("1"), suggestion("2"), suggestion("3")]);
        assert_eq!(review.pending_count(), 3);

        review.accept("1").unwrap();
        review.reject("2").unwrap();
        review.edit("3", "my own wording").unwrap();
        assert_eq!(review.pending_count(), 0);

        let to_apply = review.to_apply();
        assert_eq!(to_apply.len(), 2);
        assert_eq!(to_apply[0].suggested_text, "suggested 1");
        assert_eq!(to_apply[1].suggested_text, "my own wording");
        assert_eq!(to_apply[1].original_text, "original 3");
    }

    #[test]
    fn test_edit_to_same_text_is_accept() {
        let mut review = SuggestionReview::new(vec![suggestion("1")]);
        review.edit("1", "suggested 1").unwrap();
        assert_eq!(review.decision("1"), Some(&Decision::Accepted));
    }

    #[test]
    fn test_reset_and_accept_all() {
        let mut review = SuggestionReview::new(vec![suggestion("1"), suggestion("2")]);
        review.reject("1").unwrap();
        review.reset("1").unwrap();
        review.reject("2").unwrap();
        review.accept_all();

        assert_eq!(review.decision("1"), Some(&Decision::Accepted));
        assert_eq!(review.decision("2"), Some(&Decision::Rejected));
    }

    #[test]
    fn test_unknown_suggestion() {
        let mut review = SuggestionReview::new(vec![suggestion("1")]);
        assert!(matches!(review.accept("9"), Err(ApiError::NotFound(_))));
        assert!(review.decision("9").is_none());
    }

    #[tokio::test]
    async fn test_fetch_suggestions() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let client = client(&server, &dir).await;

        Mock::given(method("GET"))
            .and(path("/Document/translate/suggestions/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![suggestion("1")]))
            .mount(&server)
            .await;

        let suggestions = client.suggestions("job-1").await.unwrap();
        assert_eq!(suggestions, vec![suggestion("1")]);
    }

    #[tokio::test]
    async fn test_apply_review_sends_decided_suggestions() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let client = client(&server, &dir).await;

        Mock::given(method("POST"))
            .and(path("/Document/apply-suggestion"))
            .and(body_partial_json(serde_json::json!({
                "jobId": "job-1",
                "suggestionId": "3",
                "suggestedText": "edited"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Document/apply-suggestion"))
            .and(body_partial_json(serde_json::json!({"suggestionId": "1"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut review = SuggestionReview::new(vec![suggestion("1"), suggestion("2"), suggestion("3")]);
        review.accept("1").unwrap();
        review.edit("3", "edited").unwrap();

        assert_eq!(client.apply_review("job-1", &mut review).await.unwrap(), 2);
        // Nothing left to send on a second pass
        assert_eq!(client.apply_review("job-1", &mut review).await.unwrap(), 0);
        assert!(matches!(review.reject("1"), Err(ApiError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_apply_review_stops_on_error_and_resumes() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let client = client(&server, &dir).await;

        Mock::given(method("POST"))
            .and(path("/Document/apply-suggestion"))
            .and(body_partial_json(serde_json::json!({"suggestionId": "2"})))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/Document/apply-suggestion"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut review = SuggestionReview::new(vec![suggestion("1"), suggestion("2")]);
        review.accept_all();

        assert!(client.apply_review("job-1", &mut review).await.is_err());
        assert_eq!(review.to_apply().len(), 1);
        assert_eq!(client.apply_review("job-1", &mut review).await.unwrap(), 1);
    }
}
