use thiserror::Error;

/// Errors surfaced by the session controllers.
///
/// None of these are fatal: every one ends up as an `error` entry in the
/// session log and the owning state machine returns to its idle state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("empty query")]
    Validation,

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Server(String),

    #[error("playback failed: {0}")]
    Playback(String),
}

impl From<reqwest::Error> for SessionError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            SessionError::Server(format!("server returned {status}"))
        } else {
            SessionError::Network(e.to_string())
        }
    }
}
