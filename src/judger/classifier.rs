//! Post-submit outcome classification.
//!
//! The judge answers every outcome with HTTP 200, so the decision is made on
//! the redirect target and prose fragments, in a fixed order:
//! challenge page, status-page redirect, rate limit, duplicate code, and
//! anything else is unexpected. The phrase lists below are the only place
//! the judge's wording is known.

use super::utils::Response;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Serialize;

pub const CHALLENGE_MARKERS: &[&str] = &[
    "Attention Required",
    "Just a moment...",
    "cf-browser-verification",
];

pub const STATUS_PAGE_MARKERS: &[&str] = &["my=on", "/status"];

static SUBMISSION_ID_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-submission-id]").unwrap());

pub const RATE_LIMIT_PHRASE: &str = "You have submitted";

pub const DUPLICATE_PHRASES: &[&str] = &["You have already submitted", "Same code"];

/// Lifecycle of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    TokenAcquired,
    Submitted,
    Accepted,
    /// A classified non-success: rate limited or duplicate code.
    Rejected,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Accepted | SessionState::Rejected | SessionState::Failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// `submission_id` is `None` when the judge redirected to the status page
    /// but the id could not be read from it; resolve it from the status feed.
    Accepted { submission_id: Option<u64> },
    RateLimited,
    DuplicateSubmission,
    NotAuthenticated,
    Blocked,
    UnexpectedResponse { status_code: u16, final_url: String },
}

impl SubmissionOutcome {
    pub fn terminal_state(&self) -> SessionState {
        match self {
            SubmissionOutcome::Accepted { .. } => SessionState::Accepted,
            SubmissionOutcome::RateLimited | SubmissionOutcome::DuplicateSubmission => {
                SessionState::Rejected
            }
            SubmissionOutcome::NotAuthenticated
            | SubmissionOutcome::Blocked
            | SubmissionOutcome::UnexpectedResponse { .. } => SessionState::Failed,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted { .. })
    }

    pub fn submission_id(&self) -> Option<u64> {
        match self {
            SubmissionOutcome::Accepted { submission_id } => *submission_id,
            _ => None,
        }
    }
}

pub fn is_challenge_page(body: &str) -> bool {
    CHALLENGE_MARKERS.iter().any(|m| body.contains(m))
}

pub fn is_status_page(final_url: &str) -> bool {
    STATUS_PAGE_MARKERS.iter().any(|m| final_url.contains(m))
}

/// First `data-submission-id` attribute holding a number.
pub fn extract_submission_id(html: &str) -> Option<u64> {
    let document = Html::parse_document(html);
    document
        .select(&SUBMISSION_ID_SELECTOR)
        .filter_map(|ele| ele.value().attr("data-submission-id"))
        .find_map(|sid| sid.trim().parse().ok())
}

fn mentions_duplicate(body: &str) -> bool {
    DUPLICATE_PHRASES.iter().any(|dup| body.contains(dup))
}

pub fn classify(resp: &Response) -> SubmissionOutcome {
    if is_challenge_page(&resp.body) {
        return SubmissionOutcome::Blocked;
    }
    if is_status_page(&resp.final_url) {
        return SubmissionOutcome::Accepted {
            submission_id: extract_submission_id(&resp.body),
        };
    }
    if resp.body.contains(RATE_LIMIT_PHRASE) {
        return SubmissionOutcome::RateLimited;
    }
    if mentions_duplicate(&resp.body) {
        return SubmissionOutcome::DuplicateSubmission;
    }
    SubmissionOutcome::UnexpectedResponse {
        status_code: resp.status_code,
        final_url: resp.final_url.clone(),
    }
}
