use crate::judger::classifier::SubmissionOutcome;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookieValidation {
    pub valid: bool,
    pub handle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub success: bool,
    pub submission_id: Option<u64>,
    /// Account the cookies belong to, when identity validation got that far.
    pub handle: Option<String>,
    /// Newest id for the same problem seen just before submitting.
    pub previous_id: Option<u64>,
    pub outcome: SubmissionOutcome,
}

impl SubmitReceipt {
    pub fn new(outcome: SubmissionOutcome, handle: Option<String>) -> Self {
        Self {
            success: outcome.is_accepted(),
            submission_id: outcome.submission_id(),
            handle,
            previous_id: None,
            outcome,
        }
    }

    pub fn with_previous_id(mut self, previous_id: Option<u64>) -> Self {
        self.previous_id = previous_id;
        self
    }
}
