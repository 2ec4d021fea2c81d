use super::classifier::{self, SessionState, SubmissionOutcome};
use super::definition::{AntiForgeryToken, IdentityContext, RemoteJudgeConfig, SubmissionRequest};
use super::error::{JudgeError, Result};
use super::token::TokenExtractor;
use super::utils::{appears_near, excerpt, join_url, origin_of, Response, Transport};
use crate::global::remote_judge_constant::paths;

use once_cell::sync::Lazy;
use rand::prelude::*;
use regex::Regex;
use simple_log::log::{debug, info, warn};

const EXCERPT_LEN: usize = 512;

static HANDLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"handle\s*=\s*"([^"]+)""#).unwrap());
static PROFILE_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a[^>]+href="/profile/([^"]+)"[^>]*>([^<]+)</a>"#).unwrap());

/// Handle of the logged-in user, if the page shows one.
pub fn find_logged_in_handle(html: &str) -> Option<String> {
    if let Some(cap) = HANDLE_RE.captures(html) {
        return Some(cap[1].to_string());
    }
    if !html.to_ascii_lowercase().contains("logout") {
        return None;
    }
    PROFILE_LINK_RE
        .captures_iter(html)
        .find(|cap| &cap[1] == cap[2].trim())
        .map(|cap| cap[1].to_string())
}

pub fn is_login_redirect(final_url: &str) -> bool {
    final_url.contains("/enter")
}

/// Login and register prompts side by side, or a bare redirect stub.
pub fn looks_logged_out(html: &str) -> bool {
    appears_near(html, "Enter", "Register", 120)
        || (html.len() < 1000 && html.contains("Redirecting..."))
}

/// One submission attempt, from raw credentials to a classified outcome.
///
/// Steps run strictly in order: each needs the previous response. Nothing
/// is retried here; a failed step ends the attempt.
pub struct SubmissionSession<'a> {
    transport: &'a dyn Transport,
    identity: &'a IdentityContext,
    config: &'a RemoteJudgeConfig,
    extractor: TokenExtractor,
    state: SessionState,
    handle: Option<String>,
}

impl<'a> SubmissionSession<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        identity: &'a IdentityContext,
        config: &'a RemoteJudgeConfig,
    ) -> Self {
        Self {
            transport,
            identity,
            config,
            extractor: TokenExtractor::default(),
            state: SessionState::Unauthenticated,
            handle: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.config.base_url, path)
    }

    fn fail<T>(&mut self, err: JudgeError) -> Result<T> {
        self.state = SessionState::Failed;
        Err(err)
    }

    async fn read_page(&mut self, path: &str) -> Result<Response> {
        let url = self.url(path);
        match self
            .transport
            .get(&url, self.identity, &[], self.config.read_timeout())
            .await
        {
            Ok(resp) => Ok(resp),
            Err(e) => self.fail(e.into()),
        }
    }

    fn unexpected<T>(&mut self, step: &str, resp: &Response) -> Result<T> {
        warn!(
            "{step}: unexpected response HTTP {} at {}: {}",
            resp.status_code,
            resp.final_url,
            excerpt(&resp.body, EXCERPT_LEN)
        );
        self.fail(JudgeError::UnexpectedResponse {
            status_code: resp.status_code,
            final_url: resp.final_url.clone(),
        })
    }

    fn blocked<T>(&mut self, step: &str, resp: &Response) -> Result<T> {
        warn!("{step}: challenge page at {}", resp.final_url);
        self.fail(JudgeError::Blocked {
            final_url: resp.final_url.clone(),
        })
    }

    pub async fn validate_identity(&mut self) -> Result<String> {
        let resp = self.read_page(paths::HOME).await?;
        if classifier::is_challenge_page(&resp.body) {
            return self.blocked("validate identity", &resp);
        }
        if resp.status_code != 200 {
            return self.unexpected("validate identity", &resp);
        }
        let Some(handle) = find_logged_in_handle(&resp.body) else {
            info!("no logged-in handle on {}", resp.final_url);
            return self.fail(JudgeError::NotAuthenticated);
        };
        debug!("session authenticated as {handle}");
        self.handle = Some(handle.clone());
        self.state = SessionState::Authenticated;
        Ok(handle)
    }

    pub async fn acquire_token(&mut self) -> Result<AntiForgeryToken> {
        let resp = self.read_page(paths::SUBMIT).await?;
        if classifier::is_challenge_page(&resp.body) {
            return self.blocked("acquire token", &resp);
        }
        // login pages carry a token of their own
        if is_login_redirect(&resp.final_url) {
            info!("submit page redirected to login: {}", resp.final_url);
            return self.fail(JudgeError::NotAuthenticated);
        }
        if resp.status_code != 200 {
            return self.unexpected("acquire token", &resp);
        }
        match self.extractor.extract(&resp.body) {
            Some(token) => {
                debug!("token found via {:?}", token.extracted_from());
                self.state = SessionState::TokenAcquired;
                Ok(token)
            }
            None if looks_logged_out(&resp.body) => self.fail(JudgeError::NotAuthenticated),
            None => self.unexpected("acquire token", &resp),
        }
    }

    pub async fn submit(
        &mut self,
        token: AntiForgeryToken,
        request: &SubmissionRequest,
    ) -> Result<SubmissionOutcome> {
        let submit_page = self.url(paths::SUBMIT);
        let url = match reqwest::Url::parse_with_params(&submit_page, &[("csrf_token", token.value())]) {
            Ok(url) => url.to_string(),
            Err(e) => {
                return self.fail(JudgeError::MalformedInput(format!(
                    "invalid submit url {submit_page}: {e}"
                )))
            }
        };
        let source = if self.config.salt_source {
            let salt: u64 = rand::thread_rng().gen();
            format!("{}\n//{}", request.source_code(), salt)
        } else {
            request.source_code().to_string()
        };
        let form = [
            ("csrf_token", token.value()),
            ("action", "submitSolutionFormSubmitted"),
            ("submittedProblemCode", request.problem_code()),
            ("programTypeId", request.language_id()),
            ("source", source.as_str()),
            ("tabSize", "4"),
            ("_tta", "176"),
        ];
        let headers = [
            ("Referer", submit_page.as_str()),
            ("Origin", origin_of(&self.config.base_url)),
        ];

        let resp = match self
            .transport
            .post(
                &url,
                self.identity,
                &headers,
                &form,
                self.config.submit_timeout(),
            )
            .await
        {
            Ok(resp) => resp,
            Err(e) => return self.fail(e.into()),
        };
        self.state = SessionState::Submitted;

        let outcome = classifier::classify(&resp);
        match &outcome {
            SubmissionOutcome::Accepted { submission_id } => {
                info!(
                    "submitted {} as {:?}, id {:?}",
                    request.problem_code(),
                    self.handle,
                    submission_id
                );
            }
            SubmissionOutcome::RateLimited | SubmissionOutcome::DuplicateSubmission => {
                info!("submission of {} rejected: {outcome:?}", request.problem_code());
            }
            SubmissionOutcome::Blocked => warn!("submit: challenge page at {}", resp.final_url),
            SubmissionOutcome::UnexpectedResponse { .. } => warn!(
                "submit: unexpected response HTTP {} at {}: {}",
                resp.status_code,
                resp.final_url,
                excerpt(&resp.body, EXCERPT_LEN)
            ),
            SubmissionOutcome::NotAuthenticated => {}
        }
        self.state = outcome.terminal_state();
        Ok(outcome)
    }

    /// Validate, acquire a fresh token and submit. A session that is already
    /// authenticated skips validation. A failing step is reported as its
    /// terminal outcome; only transport and input failures come back as
    /// errors.
    pub async fn run(&mut self, request: &SubmissionRequest) -> Result<SubmissionOutcome> {
        match self.run_steps(request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => e.as_outcome().ok_or(e),
        }
    }

    async fn run_steps(&mut self, request: &SubmissionRequest) -> Result<SubmissionOutcome> {
        if self.state != SessionState::Authenticated {
            self.validate_identity().await?;
        }
        let token = self.acquire_token().await?;
        self.submit(token, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judger::definition::TokenSource;
    use crate::judger::error::TransportError;
    use crate::judger::test_helpers::{page, MockTransport};

    const TOKEN: &str = "0123456789abcdef0123456789abcdef";
    const HOME: &str = "https://codeforces.com/";
    const SUBMIT: &str = "https://codeforces.com/problemset/submit";

    fn home_page() -> String {
        r#"<script>var handle = "tourist";</script><a href="/profile/tourist">tourist</a> | <a href="/logout">Logout</a>"#.into()
    }

    fn submit_page() -> String {
        format!(
            r#"<form method="post"><input type='hidden' name='csrf_token' value='{TOKEN}'/></form>"#
        )
    }

    fn identity() -> IdentityContext {
        IdentityContext::from_cookie_string("JSESSIONID=abc123; 39ce7=xyz").unwrap()
    }

    fn request() -> SubmissionRequest {
        SubmissionRequest::new("4A", "int main() { return 0; }", "54").unwrap()
    }

    #[test]
    fn test_find_logged_in_handle() {
        assert_eq!(find_logged_in_handle(&home_page()).as_deref(), Some("tourist"));

        let fallback = r#"<a href="/profile/Petr">Petr</a> <a href="/abc/logout">Logout</a>"#;
        assert_eq!(find_logged_in_handle(fallback).as_deref(), Some("Petr"));

        let no_logout = r#"<a href="/profile/Petr">Petr</a>"#;
        assert_eq!(find_logged_in_handle(no_logout), None);

        let other_profile = r#"<a href="/profile/Petr">top rated</a> logout"#;
        assert_eq!(find_logged_in_handle(other_profile), None);
    }

    #[test]
    fn test_looks_logged_out() {
        assert!(looks_logged_out(
            r#"<a href="/enter">Enter</a> | <a href="/register">Register</a>"#
        ));
        assert!(looks_logged_out("<html>Redirecting...</html>"));
        assert!(!looks_logged_out(&submit_page()));
    }

    #[tokio::test]
    async fn test_run_accepted() {
        let transport = MockTransport::new()
            .with_response(page(HOME, &home_page()))
            .with_response(page(SUBMIT, &submit_page()))
            .with_response(page(
                "https://codeforces.com/problemset/status?my=on",
                r#"<table><tr data-submission-id="363219620"></tr></table>"#,
            ));
        let identity = identity();
        let config = RemoteJudgeConfig::default();
        let mut session = SubmissionSession::new(&transport, &identity, &config);

        let outcome = session.run(&request()).await.unwrap();

        assert_eq!(
            outcome,
            SubmissionOutcome::Accepted {
                submission_id: Some(363219620)
            }
        );
        assert_eq!(session.state(), SessionState::Accepted);
        assert_eq!(session.handle(), Some("tourist"));

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].method, "GET");
        assert_eq!(calls[0].url, HOME);
        assert_eq!(calls[1].url, SUBMIT);
        assert_eq!(
            calls[1].cookie_header.as_deref(),
            Some("39ce7=xyz; JSESSIONID=abc123")
        );

        let post = &calls[2];
        assert_eq!(post.method, "POST");
        assert_eq!(post.url, format!("{SUBMIT}?csrf_token={TOKEN}"));
        assert_eq!(post.form_value("csrf_token"), Some(TOKEN));
        assert_eq!(post.form_value("submittedProblemCode"), Some("4A"));
        assert_eq!(post.form_value("programTypeId"), Some("54"));
        assert_eq!(post.form_value("source"), Some("int main() { return 0; }"));
        assert_eq!(post.form_value("action"), Some("submitSolutionFormSubmitted"));
        assert!(post
            .headers
            .contains(&("Origin".to_string(), "https://codeforces.com".to_string())));
        assert_eq!(post.timeout, config.submit_timeout());
        assert_eq!(calls[0].timeout, config.read_timeout());
    }

    #[tokio::test]
    async fn test_failed_identity_short_circuits() {
        let transport = MockTransport::new()
            .with_response(page(HOME, "<a href=\"/enter\">Enter</a> <a>Register</a>"))
            .with_response(page(SUBMIT, &submit_page()));
        let identity = identity();
        let config = RemoteJudgeConfig::default();
        let mut session = SubmissionSession::new(&transport, &identity, &config);

        let outcome = session.run(&request()).await.unwrap();

        assert_eq!(outcome, SubmissionOutcome::NotAuthenticated);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_blocked_identity_page() {
        let transport = MockTransport::new().with_response(Response {
            status_code: 403,
            final_url: HOME.into(),
            body: "<title>Attention Required! | Cloudflare</title>".into(),
            ..Default::default()
        });
        let identity = identity();
        let config = RemoteJudgeConfig::default();
        let mut session = SubmissionSession::new(&transport, &identity, &config);

        assert!(matches!(
            session.validate_identity().await,
            Err(JudgeError::Blocked { .. })
        ));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_blocked_submit_page_stops_before_post() {
        let transport = MockTransport::new()
            .with_response(page(HOME, &home_page()))
            .with_response(page(SUBMIT, "<title>Just a moment...</title>"));
        let identity = identity();
        let config = RemoteJudgeConfig::default();
        let mut session = SubmissionSession::new(&transport, &identity, &config);

        let outcome = session.run(&request()).await.unwrap();

        assert_eq!(outcome, SubmissionOutcome::Blocked);
        assert_eq!(transport.call_count(), 2);
        assert!(transport.calls().iter().all(|c| c.method == "GET"));
    }

    #[tokio::test]
    async fn test_server_error_pages_are_unexpected() {
        let error_page = |url: &str| Response {
            status_code: 500,
            final_url: url.into(),
            body: r#"<script>var handle = "tourist";</script>"#.into(),
            ..Default::default()
        };
        let identity = identity();
        let config = RemoteJudgeConfig::default();

        let transport = MockTransport::new().with_response(error_page(HOME));
        let mut session = SubmissionSession::new(&transport, &identity, &config);
        assert!(matches!(
            session.validate_identity().await,
            Err(JudgeError::UnexpectedResponse {
                status_code: 500,
                ..
            })
        ));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.handle(), None);

        let transport = MockTransport::new().with_response(Response {
            body: submit_page(),
            ..error_page(SUBMIT)
        });
        let mut session = SubmissionSession::new(&transport, &identity, &config);
        assert!(matches!(
            session.acquire_token().await,
            Err(JudgeError::UnexpectedResponse {
                status_code: 500,
                ..
            })
        ));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_run_after_validation_skips_identity_page() {
        let transport = MockTransport::new()
            .with_response(page(HOME, &home_page()))
            .with_response(page(SUBMIT, &submit_page()))
            .with_response(page("https://codeforces.com/problemset/status?my=on", ""));
        let identity = identity();
        let config = RemoteJudgeConfig::default();
        let mut session = SubmissionSession::new(&transport, &identity, &config);

        session.validate_identity().await.unwrap();
        let outcome = session.run(&request()).await.unwrap();

        assert!(outcome.is_accepted());
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_acquire_token_login_redirect() {
        let transport = MockTransport::new().with_response(page(
            "https://codeforces.com/enter?back=%2Fproblemset%2Fsubmit",
            &submit_page(),
        ));
        let identity = identity();
        let config = RemoteJudgeConfig::default();
        let mut session = SubmissionSession::new(&transport, &identity, &config);

        assert!(matches!(
            session.acquire_token().await,
            Err(JudgeError::NotAuthenticated)
        ));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_acquire_token_missing() {
        let logged_out = MockTransport::new().with_response(page(
            SUBMIT,
            r#"<a href="/enter">Enter</a> | <a href="/register">Register</a>"#,
        ));
        let drifted = MockTransport::new().with_response(page(SUBMIT, "<html>new layout</html>"));
        let identity = identity();
        let config = RemoteJudgeConfig::default();

        let mut session = SubmissionSession::new(&logged_out, &identity, &config);
        assert!(matches!(
            session.acquire_token().await,
            Err(JudgeError::NotAuthenticated)
        ));

        let mut session = SubmissionSession::new(&drifted, &identity, &config);
        assert!(matches!(
            session.acquire_token().await,
            Err(JudgeError::UnexpectedResponse {
                status_code: 200,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_acquire_token_records_source() {
        let transport = MockTransport::new().with_response(page(
            SUBMIT,
            r#"<meta name="X-Csrf-Token" content="abc123"/>"#,
        ));
        let identity = identity();
        let config = RemoteJudgeConfig::default();
        let mut session = SubmissionSession::new(&transport, &identity, &config);

        let token = session.acquire_token().await.unwrap();
        assert_eq!(token.value(), "abc123");
        assert_eq!(token.extracted_from(), TokenSource::MetaTag);
        assert_eq!(session.state(), SessionState::TokenAcquired);
    }

    #[tokio::test]
    async fn test_rejected_outcomes() {
        for (body, expected) in [
            ("You have submitted too often", SubmissionOutcome::RateLimited),
            (
                "You have already submitted this code",
                SubmissionOutcome::DuplicateSubmission,
            ),
        ] {
            let transport = MockTransport::new()
                .with_response(page(HOME, &home_page()))
                .with_response(page(SUBMIT, &submit_page()))
                .with_response(page(SUBMIT, body));
            let identity = identity();
            let config = RemoteJudgeConfig::default();
            let mut session = SubmissionSession::new(&transport, &identity, &config);

            assert_eq!(session.run(&request()).await.unwrap(), expected);
            assert_eq!(session.state(), SessionState::Rejected);
            assert_eq!(transport.call_count(), 3);
        }
    }

    #[tokio::test]
    async fn test_transport_timeout_is_an_error() {
        let transport = MockTransport::new()
            .with_response(page(HOME, &home_page()))
            .with_response(page(SUBMIT, &submit_page()))
            .with_error(TransportError::Timeout {
                url: SUBMIT.into(),
            });
        let identity = identity();
        let config = RemoteJudgeConfig::default();
        let mut session = SubmissionSession::new(&transport, &identity, &config);

        let err = session.run(&request()).await.unwrap_err();

        assert!(matches!(
            err,
            JudgeError::Transport(TransportError::Timeout { .. })
        ));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_salted_source() {
        let transport = MockTransport::new()
            .with_response(page(SUBMIT, &submit_page()))
            .with_response(page("https://codeforces.com/problemset/status?my=on", ""));
        let identity = identity();
        let config = RemoteJudgeConfig {
            salt_source: true,
            ..Default::default()
        };
        let mut session = SubmissionSession::new(&transport, &identity, &config);

        let token = session.acquire_token().await.unwrap();
        let outcome = session.submit(token, &request()).await.unwrap();

        assert_eq!(
            outcome,
            SubmissionOutcome::Accepted {
                submission_id: None
            }
        );
        let calls = transport.calls();
        let source = calls[1].form_value("source").unwrap();
        assert!(source.starts_with("int main() { return 0; }\n//"));
    }
}
