use super::error::{JudgeError, Result};
use crate::global::remote_judge_constant as constant;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteJudgeConfig {
    pub base_url: String,
    pub lang_map: HashMap<String, String>,
    pub read_timeout_secs: u64,
    pub submit_timeout_secs: u64,
    pub feed_count: usize,
    /// Append a random comment to every source so resubmissions are not
    /// rejected as duplicates.
    pub salt_source: bool,
}

impl Default for RemoteJudgeConfig {
    fn default() -> Self {
        Self {
            base_url: constant::BASE_URL.into(),
            lang_map: HashMap::new(),
            read_timeout_secs: 15,
            submit_timeout_secs: 30,
            feed_count: 10,
            salt_source: false,
        }
    }
}

impl RemoteJudgeConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    /// Language name to `programTypeId`. A numeric name is taken as an id.
    pub fn resolve_lang(&self, lang: &str) -> Option<String> {
        if let Some(id) = self.lang_map.get(lang) {
            return Some(id.clone());
        }
        if !lang.is_empty() && lang.chars().all(|c| c.is_ascii_digit()) {
            return Some(lang.into());
        }
        None
    }
}

/// Split a browser-exported `k=v; k2=v2` string. On duplicate names the
/// last occurrence wins.
pub fn parse_cookies(raw: &str) -> BTreeMap<String, String> {
    raw.split(';')
        .filter_map(|part| {
            let (k, v) = part.trim().split_once('=')?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_string(), v.trim().to_string()))
        })
        .collect()
}

/// Credentials of one user, scoped to the judge's cookie domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    cookies: BTreeMap<String, String>,
    domain: String,
}

impl IdentityContext {
    pub fn from_cookie_string(raw: &str) -> Result<Self> {
        let cookies = parse_cookies(raw);
        if cookies.is_empty() {
            return Err(JudgeError::MalformedInput(
                "cookie string contains no name=value pairs".into(),
            ));
        }
        Ok(Self {
            cookies,
            domain: constant::COOKIE_DOMAIN.into(),
        })
    }

    /// No cookies, for the public read API.
    pub fn anonymous() -> Self {
        Self {
            cookies: BTreeMap::new(),
            domain: constant::COOKIE_DOMAIN.into(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

static PROBLEM_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)([A-Za-z]\d*)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    problem_code: String,
    source_code: String,
    language_id: String,
}

impl SubmissionRequest {
    pub fn new(problem_code: &str, source_code: &str, language_id: &str) -> Result<Self> {
        let problem_code = problem_code.trim();
        if !PROBLEM_CODE_RE.is_match(problem_code) {
            return Err(JudgeError::MalformedInput(format!(
                "invalid problem code {problem_code:?}"
            )));
        }
        if source_code.trim().is_empty() {
            return Err(JudgeError::MalformedInput("empty source code".into()));
        }
        let language_id = language_id.trim();
        if language_id.is_empty() || !language_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(JudgeError::MalformedInput(format!(
                "invalid language id {language_id:?}"
            )));
        }
        Ok(Self {
            problem_code: problem_code.to_uppercase(),
            source_code: source_code.into(),
            language_id: language_id.into(),
        })
    }

    /// e.g. `4A`, the same shape as the feed's problem key.
    pub fn problem_code(&self) -> &str {
        &self.problem_code
    }

    pub fn source_code(&self) -> &str {
        &self.source_code
    }

    pub fn language_id(&self) -> &str {
        &self.language_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenSource {
    FormField,
    MetaTag,
    InlineScript,
}

/// Single use: consumed by the submission it protects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntiForgeryToken {
    value: String,
    extracted_from: TokenSource,
}

impl AntiForgeryToken {
    pub fn new(value: impl Into<String>, extracted_from: TokenSource) -> Self {
        Self {
            value: value.into(),
            extracted_from,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn extracted_from(&self) -> TokenSource {
        self.extracted_from
    }
}
