use super::{CookieValidation, SubmitReceipt};
use crate::judger::error::Result;
use crate::judger::poller::Verdict;
use async_trait::async_trait;

/// What the service shell asks of a remote judge.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn validate_cookies(&self, cookies: &str) -> Result<CookieValidation>;

    /// Classified rejections (rate limit, duplicate, blocked, ...) come back
    /// inside the receipt; only transport and input failures are errors.
    async fn submit_code(
        &self,
        cookies: &str,
        problem_code: &str,
        source: &str,
        language_id: &str,
    ) -> Result<SubmitReceipt>;

    async fn get_verdict(&self, handle: &str, submission_id: u64) -> Result<Verdict>;
}
