//! Anti-forgery token discovery.
//!
//! The judge exposes one authoritative token per page but has moved it
//! between a hidden form field, inline scripts and a meta tag over time.
//! Strategies are tried in order and the first match is reported; nothing is
//! merged or cross-checked. Missing or malformed markup yields `None`.

use super::definition::{AntiForgeryToken, TokenSource};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone)]
struct TokenStrategy {
    source: TokenSource,
    pattern: Regex,
}

impl TokenStrategy {
    /// `pattern` must capture the token in group 1.
    fn new(source: TokenSource, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source,
            pattern: Regex::new(pattern)?,
        })
    }

    fn apply(&self, html: &str) -> Option<AntiForgeryToken> {
        let value = self.pattern.captures(html)?.get(1)?.as_str().trim();
        if value.is_empty() {
            return None;
        }
        Some(AntiForgeryToken::new(value, self.source))
    }
}

static DEFAULT_STRATEGIES: Lazy<Vec<TokenStrategy>> = Lazy::new(|| {
    [
        (
            TokenSource::FormField,
            r#"name=["']csrf_token["']\s+value=["']([^"']+)["']"#,
        ),
        (
            TokenSource::InlineScript,
            r#"csrf_token\s*["']?\s*[:=]\s*["']?([a-f0-9]{32})"#,
        ),
        (TokenSource::InlineScript, r#"csrf_token\s*=\s*'([^']+)'"#),
        (
            TokenSource::MetaTag,
            r#"name=["']X-Csrf-Token["']\s+content=["']([[:alnum:]]+)["']"#,
        ),
    ]
    .into_iter()
    .map(|(source, pattern)| TokenStrategy::new(source, pattern).unwrap())
    .collect()
});

#[derive(Debug, Clone)]
pub struct TokenExtractor {
    strategies: Vec<TokenStrategy>,
}

impl Default for TokenExtractor {
    fn default() -> Self {
        Self {
            strategies: DEFAULT_STRATEGIES.clone(),
        }
    }
}

impl TokenExtractor {
    pub fn extract(&self, html: &str) -> Option<AntiForgeryToken> {
        self.strategies.iter().find_map(|s| s.apply(html))
    }
}
