//! Scripted transport double shared by the judger tests.

use super::definition::IdentityContext;
use super::error::TransportError;
use super::utils::{Response, Transport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub cookie_header: Option<String>,
    pub headers: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub timeout: Duration,
}

impl RecordedCall {
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Answers calls from a queue in order and records every call. An exhausted
/// queue answers with a network error.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Response, TransportError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, resp: Response) -> Self {
        self.responses.lock().unwrap().push_back(Ok(resp));
        self
    }

    pub fn with_error(self, err: TransportError) -> Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn answer(
        &self,
        method: &'static str,
        url: &str,
        identity: &IdentityContext,
        headers: &[(&str, &str)],
        form: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            url: url.into(),
            cookie_header: identity.cookie_header(),
            headers: owned(headers),
            form: owned(form),
            timeout,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::Network {
                    url: url.into(),
                    message: "no scripted response".into(),
                })
            })
    }
}

fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(
        &self,
        url: &str,
        identity: &IdentityContext,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        self.answer("GET", url, identity, headers, &[], timeout)
    }

    async fn post(
        &self,
        url: &str,
        identity: &IdentityContext,
        headers: &[(&str, &str)],
        form: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        self.answer("POST", url, identity, headers, form, timeout)
    }
}

pub fn page(final_url: &str, body: &str) -> Response {
    Response {
        status_code: 200,
        final_url: final_url.into(),
        body: body.into(),
        ..Default::default()
    }
}
