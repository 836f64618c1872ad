use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevWatchError {
    /// The remote rejected our credential; the session must be refreshed
    /// before the next attempt.
    #[error("authentication expired")]
    AuthExpired,

    #[error("API request failed: status {status}, body: {body}")]
    Api { status: u16, body: String },

    #[error("revision pipeline failed at `{step}`: {source}")]
    Pipeline {
        step: &'static str,
        #[source]
        source: Box<RevWatchError>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RevWatchError {
    /// Wrap an error with the pipeline step it occurred in.
    pub fn in_step(self, step: &'static str) -> Self {
        RevWatchError::Pipeline {
            step,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, RevWatchError>;
