use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};

use crate::judger::definition::IdentityContext;
use crate::judger::error::TransportError;

/// Outcome of one request, after redirects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status_code: u16,
    pub final_url: String,
    pub body: String,
    pub headers: HashMap<String, String>,
}

/// How the judge is reached. Implementations must follow redirects and
/// report the final url, and must be safe to share between independent
/// sessions.
///
/// [`HttpTransport`] talks plain HTTP with browser-like headers. A full
/// browser driving page JavaScript fits behind the same trait.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        identity: &IdentityContext,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Response, TransportError>;

    async fn post(
        &self,
        url: &str,
        identity: &IdentityContext,
        headers: &[(&str, &str)],
        form: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Response, TransportError>;
}

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

fn default_header() -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    [
        (
            header::ACCEPT,
            header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        ),
        (
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.9"),
        ),
        (
            header::CONNECTION,
            header::HeaderValue::from_static("keep-alive"),
        ),
    ]
    .into_iter()
    .for_each(|(x, y)| {
        headers.insert(x, y);
    });
    headers
}

impl TransportError {
    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout { url: url.into() }
        } else {
            TransportError::Network {
                url: url.into(),
                message: err.to_string(),
            }
        }
    }
}

/// reqwest-backed transport. Cookies travel as an explicit header built from
/// the caller's identity, so one client (and its connection pool) can serve
/// many users without a shared cookie store.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(default_header())
            .build()
            .map_err(|e| TransportError::Network {
                url: String::new(),
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        url: &str,
        mut req: reqwest::RequestBuilder,
        identity: &IdentityContext,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        if let Some(cookie) = identity.cookie_header() {
            req = req.header(header::COOKIE, cookie);
        }
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let resp = req
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, e))?;

        let status_code = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&final_url, e))?;

        Ok(Response {
            status_code,
            final_url,
            body,
            headers,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        identity: &IdentityContext,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        self.send(url, self.client.get(url), identity, headers, timeout)
            .await
    }

    async fn post(
        &self,
        url: &str,
        identity: &IdentityContext,
        headers: &[(&str, &str)],
        form: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        self.send(url, self.client.post(url).form(form), identity, headers, timeout)
            .await
    }
}
