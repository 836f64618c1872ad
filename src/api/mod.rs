mod types;

pub use types::*;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

use crate::error::{Result, RevWatchError};
use crate::session::{is_auth_expired, Session};

/// Client for the remote project API.
///
/// Every call carries the current session token as the `cookie` header and
/// decodes the response exactly once: an expiry-shaped body maps to
/// `AuthExpired`, an unexpected status to `Api`, everything else to the
/// typed payload. Call sites never re-probe response shapes themselves.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<Session>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("revwatch/0.1.0")
            .build()
            .map_err(|e| RevWatchError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| RevWatchError::Config(format!("Invalid base URL: {e}")))?;

        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RevWatchError::Config(format!("Invalid endpoint `{path}`: {e}")))
    }

    /// Send one request and return its status plus raw body.
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<(StatusCode, String)> {
        let url = self.endpoint(path)?;
        let mut request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header("cookie", self.session.token().await);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    /// Decode a response once into the tagged result every call site
    /// consumes: expired session, unexpected status, or the parsed body.
    async fn check(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        expected: StatusCode,
    ) -> Result<Value> {
        let (status, text) = self.send(method, path, body).await?;

        // A non-JSON body cannot be expiry-shaped; keep it for the error
        let value = serde_json::from_str::<Value>(&text).unwrap_or(Value::Null);

        if is_auth_expired(&value) {
            return Err(RevWatchError::AuthExpired);
        }

        if status != expected {
            return Err(RevWatchError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(value)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        expected: StatusCode,
    ) -> Result<T> {
        let value = self.check(method, path, body, expected).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn fetch_revisions(&self, project_id: &str) -> Result<RevisionListing> {
        let path = format!("api/v1/projects/{project_id}/revisions");
        self.fetch(Method::GET, &path, None, StatusCode::OK).await
    }

    pub async fn fetch_comments(&self, project_id: &str) -> Result<CommentListing> {
        let path = format!("api/v1/projects/{project_id}/comments");
        self.fetch(Method::GET, &path, None, StatusCode::OK).await
    }

    pub async fn fetch_replies(&self, project_id: &str, comment_id: &str) -> Result<CommentListing> {
        let path = format!("api/v1/projects/{project_id}/comments/{comment_id}/replies");
        self.fetch(Method::GET, &path, None, StatusCode::OK).await
    }

    /// Post a reply under an existing comment. The remote is not picky
    /// about the created status here, so any success code is accepted.
    pub async fn post_reply(&self, project_id: &str, parent_comment_id: &str, content: &str) -> Result<()> {
        let path = format!("api/v1/projects/{project_id}/comments");
        let body = json!({
            "content": content,
            "parent_comment_id": parent_comment_id,
        });

        let (status, text) = self.send(Method::POST, &path, Some(&body)).await?;

        let value = serde_json::from_str::<Value>(&text).unwrap_or(Value::Null);
        if is_auth_expired(&value) {
            return Err(RevWatchError::AuthExpired);
        }

        if !status.is_success() {
            return Err(RevWatchError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(())
    }

    pub async fn fetch_project(&self, project_id: &str) -> Result<ProjectInfo> {
        let path = format!("api/v1/projects/{project_id}");
        self.fetch(Method::GET, &path, None, StatusCode::OK).await
    }

    pub async fn create_revision(&self, project_id: &str, parent_version: u64) -> Result<CreatedRevision> {
        let path = format!("api/v1/projects/{project_id}/revisions");
        let body = json!({ "parent_version": parent_version });
        self.fetch(Method::POST, &path, Some(&body), StatusCode::CREATED)
            .await
    }

    pub async fn create_site<P: Serialize>(&self, payload: &P) -> Result<()> {
        let body = serde_json::to_value(payload)?;
        self.check(Method::POST, "api/v1/sites", Some(&body), StatusCode::CREATED)
            .await?;
        Ok(())
    }

    pub async fn confirm_draft(&self, project_id: &str, version: u64) -> Result<()> {
        let path = format!("api/v1/projects/{project_id}/revisions/{version}");
        let body = json!({ "draft": false });
        self.check(Method::PATCH, &path, Some(&body), StatusCode::OK)
            .await?;
        Ok(())
    }

    pub async fn promote_version(&self, project_id: &str, version: u64) -> Result<()> {
        let path = format!("api/v1/projects/{project_id}");
        let body = json!({ "current_version": version });
        self.check(Method::PATCH, &path, Some(&body), StatusCode::OK)
            .await?;
        Ok(())
    }
}
