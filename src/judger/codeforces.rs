use super::definition::{IdentityContext, RemoteJudgeConfig, SubmissionRequest};
use super::error::{JudgeError, Result};
use super::poller::{PollConfig, PollTarget, Verdict, VerdictPoller};
use super::provider::{CookieValidation, Provider, SubmitReceipt};
use super::session::SubmissionSession;
use super::utils::{HttpTransport, Transport};
use crate::global;

use async_trait::async_trait;
use simple_log::log::info;
use std::sync::Arc;

/// Codeforces behind any [`Transport`]. Every call builds its own identity
/// and session; only the transport (and its connection pool) is shared.
pub struct Codeforces {
    transport: Arc<dyn Transport>,
    config: RemoteJudgeConfig,
    poll_config: PollConfig,
}

impl Codeforces {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: RemoteJudgeConfig,
        poll_config: PollConfig,
    ) -> Self {
        Self {
            transport,
            config,
            poll_config,
        }
    }

    /// HTTP transport and the loaded service configuration.
    pub fn from_global() -> Result<Self> {
        let config = global::remote_judge_config().clone();
        let poll_config = global::server_config().poll_config(config.feed_count);
        Ok(Self::new(
            Arc::new(HttpTransport::new()?),
            config,
            poll_config,
        ))
    }

    pub fn config(&self) -> &RemoteJudgeConfig {
        &self.config
    }

    /// A poller that can be moved into its own task.
    pub fn poller(&self) -> VerdictPoller {
        VerdictPoller::new(
            self.transport.clone(),
            self.config.base_url.clone(),
            self.config.read_timeout(),
            self.poll_config.clone(),
        )
    }

    fn single_look_poller(&self) -> VerdictPoller {
        VerdictPoller::new(
            self.transport.clone(),
            self.config.base_url.clone(),
            self.config.read_timeout(),
            PollConfig {
                max_attempts: 1,
                ..self.poll_config.clone()
            },
        )
    }
}

/// Where to look for a submission in the status feed after submitting.
pub fn poll_target(receipt: &SubmitReceipt, problem_code: &str) -> PollTarget {
    match receipt.submission_id {
        Some(id) => PollTarget::ById(id),
        None => PollTarget::LatestForProblem {
            problem_key: problem_code.trim().to_uppercase(),
            newer_than: receipt.previous_id,
        },
    }
}

#[async_trait]
impl Provider for Codeforces {
    async fn validate_cookies(&self, cookies: &str) -> Result<CookieValidation> {
        let identity = IdentityContext::from_cookie_string(cookies)?;
        let mut session = SubmissionSession::new(self.transport.as_ref(), &identity, &self.config);
        match session.validate_identity().await {
            Ok(handle) => Ok(CookieValidation {
                valid: true,
                handle: Some(handle),
            }),
            Err(JudgeError::NotAuthenticated) => Ok(CookieValidation {
                valid: false,
                handle: None,
            }),
            Err(e) => Err(e),
        }
    }

    async fn submit_code(
        &self,
        cookies: &str,
        problem_code: &str,
        source: &str,
        language_id: &str,
    ) -> Result<SubmitReceipt> {
        let request = SubmissionRequest::new(problem_code, source, language_id)?;
        let identity = IdentityContext::from_cookie_string(cookies)?;
        let mut session = SubmissionSession::new(self.transport.as_ref(), &identity, &self.config);
        let handle = match session.validate_identity().await {
            Ok(handle) => handle,
            Err(e) => return Ok(SubmitReceipt::new(e.as_outcome().ok_or(e)?, None)),
        };
        // the new id is not always readable after submitting
        let previous_id = self
            .poller()
            .latest_id(&handle, request.problem_code())
            .await;
        let outcome = session.run(&request).await?;
        info!(
            "submission of {} finished in state {:?}",
            request.problem_code(),
            session.state()
        );
        Ok(SubmitReceipt::new(outcome, Some(handle)).with_previous_id(previous_id))
    }

    async fn get_verdict(&self, handle: &str, submission_id: u64) -> Result<Verdict> {
        self.single_look_poller()
            .poll(handle, PollTarget::ById(submission_id))
            .await
    }
}
