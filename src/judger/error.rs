use thiserror::Error;

use super::classifier::SubmissionOutcome;

pub type Result<T> = std::result::Result<T, JudgeError>;

/// Failure of a single transport call. Never retried inside the crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
}

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Rejected before any network call.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Anti-automation challenge page. Retrying on the same transport is pointless.
    #[error("blocked by anti-automation challenge at {final_url}")]
    Blocked { final_url: String },

    #[error("not authenticated: cookies invalid or expired")]
    NotAuthenticated,

    #[error("unexpected response: HTTP {status_code} at {final_url}")]
    UnexpectedResponse { status_code: u16, final_url: String },

    /// The read-only status feed answered but not with `status: "OK"`.
    #[error("status feed failed: {0}")]
    Feed(String),
}

impl JudgeError {
    /// The terminal submission outcome this error stands for, if it is one.
    /// Transport, input and feed failures have no outcome and stay errors.
    pub fn as_outcome(&self) -> Option<SubmissionOutcome> {
        match self {
            JudgeError::Blocked { .. } => Some(SubmissionOutcome::Blocked),
            JudgeError::NotAuthenticated => Some(SubmissionOutcome::NotAuthenticated),
            JudgeError::UnexpectedResponse {
                status_code,
                final_url,
            } => Some(SubmissionOutcome::UnexpectedResponse {
                status_code: *status_code,
                final_url: final_url.clone(),
            }),
            JudgeError::Transport(_) | JudgeError::MalformedInput(_) | JudgeError::Feed(_) => {
                None
            }
        }
    }
}
