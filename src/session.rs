use log::{error, info, warn};
use reqwest::header::SET_COOKIE;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::error::{Result, RevWatchError};

/// Destination for a renewed credential, so it survives a restart.
/// Implemented by `config::ConfigStore`.
pub trait TokenStore: Send + Sync {
    fn persist_token(&self, token: &str) -> anyhow::Result<()>;
}

/// Outcome of a refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The probe produced a new credential, now stored and persisted.
    Renewed(String),
    /// The probe gave us nothing usable; the previous credential stays
    /// in place and may still work on the next cycle.
    Unchanged,
}

struct SessionState {
    token: String,
    generation: u64,
}

/// The single process-wide session.
///
/// Holds the credential string sent as the `cookie` header on every
/// outbound call. `refresh` probes the base URL and adopts whatever
/// renewed cookies the server hands back. Refreshes are single-flight:
/// callers that were already waiting when a refresh completed adopt its
/// result instead of issuing their own probe.
pub struct Session {
    http: reqwest::Client,
    base_url: Url,
    state: RwLock<SessionState>,
    refresh_gate: Mutex<()>,
    store: Arc<dyn TokenStore>,
}

impl Session {
    pub fn new(base_url: Url, token: String, store: Arc<dyn TokenStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("revwatch/0.1.0")
            .build()
            .map_err(|e| RevWatchError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            state: RwLock::new(SessionState {
                token,
                generation: 0,
            }),
            refresh_gate: Mutex::new(()),
            store,
        })
    }

    /// Current credential string.
    pub async fn token(&self) -> String {
        self.state.read().await.token.clone()
    }

    /// Probe the base URL and adopt renewed cookies from the response.
    ///
    /// A non-success status or a response without `Set-Cookie` headers
    /// leaves the stored token untouched; the caller simply retries on a
    /// later cycle with the stale credential.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let seen_generation = self.state.read().await.generation;

        let _flight = self.refresh_gate.lock().await;

        {
            let state = self.state.read().await;
            if state.generation != seen_generation {
                // Another caller finished a refresh while we waited.
                return Ok(RefreshOutcome::Renewed(state.token.clone()));
            }
        }

        info!("Refreshing session from base URL");

        let current = self.state.read().await.token.clone();
        let response = self
            .http
            .get(self.base_url.clone())
            .header("cookie", current)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Session refresh failed: status {status}");
            return Ok(RefreshOutcome::Unchanged);
        }

        let pairs: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .filter_map(cookie_pair)
            .collect();

        if pairs.is_empty() {
            warn!("No Set-Cookie headers in refresh response; keeping current token");
            return Ok(RefreshOutcome::Unchanged);
        }

        let token = pairs.join("; ");

        {
            let mut state = self.state.write().await;
            state.token = token.clone();
            state.generation += 1;
        }

        if let Err(e) = self.store.persist_token(&token) {
            error!("Failed to persist refreshed token: {e}");
        } else {
            info!("Refreshed session token ({} cookie(s))", pairs.len());
        }

        Ok(RefreshOutcome::Renewed(token))
    }
}

/// Extract the leading `name=value` pair from a `Set-Cookie` header value,
/// dropping attributes such as `Path` or `HttpOnly`.
fn cookie_pair(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, _value) = pair.split_once('=')?;
    if name.is_empty() {
        return None;
    }
    Some(pair.to_string())
}

/// Shape check for an "authentication expired" response body.
///
/// The remote reports credential rejection inside an otherwise ordinary
/// JSON body: `{"error": {"name": "ResponseError", ...}}`. Anything not
/// matching that shape is not an expiry, including non-object bodies.
pub fn is_auth_expired(body: &Value) -> bool {
    body.get("error")
        .and_then(Value::as_object)
        .and_then(|error| error.get("name"))
        .and_then(Value::as_str)
        == Some("ResponseError")
}
