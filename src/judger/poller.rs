//! Verdict polling over the judge's read-only `user.status` feed.

use super::definition::IdentityContext;
use super::error::{JudgeError, Result};
use super::utils::{excerpt, join_url, Transport};
use crate::global::{self, remote_judge_constant::paths};

use serde::{Deserialize, Serialize};
use simple_log::log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "verdict", rename_all = "snake_case")]
pub enum VerdictState {
    Testing,
    /// Raw verdict name from the feed, e.g. `OK`, `WRONG_ANSWER`.
    Final(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// `None` only for the placeholder of a submission that was never seen.
    pub submission_id: Option<u64>,
    pub state: VerdictState,
    pub tests_passed: u32,
    pub time_ms: u64,
    pub memory_bytes: u64,
    pub problem_key: String,
}

impl Verdict {
    /// Stand-in while the submission is not yet visible in the feed.
    pub fn placeholder(target: &PollTarget) -> Self {
        let (submission_id, problem_key) = match target {
            PollTarget::ById(id) => (Some(*id), "unknown".to_string()),
            PollTarget::LatestForProblem { problem_key, .. } => (None, problem_key.clone()),
        };
        Self {
            submission_id,
            state: VerdictState::Testing,
            tests_passed: 0,
            time_ms: 0,
            memory_bytes: 0,
            problem_key,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self.state, VerdictState::Final(_))
    }

    /// Display label, e.g. `Accepted` for `OK`.
    pub fn label(&self) -> &str {
        match &self.state {
            VerdictState::Testing => global::judge_status::RN,
            VerdictState::Final(name) => global::judge_status_map()
                .get(name.as_str())
                .copied()
                .unwrap_or(name.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTarget {
    ById(u64),
    /// Most recent submission for a problem key such as `4A`, for
    /// submissions whose id could not be read after submitting. Entries at
    /// or below `newer_than` predate the submission and are skipped.
    LatestForProblem {
        problem_key: String,
        newer_than: Option<u64>,
    },
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub max_attempts: usize,
    pub interval: Duration,
    /// Added to the sleep after each attempt that saw no change.
    pub interval_incr: Duration,
    pub max_interval: Duration,
    /// How many recent feed entries to scan.
    pub feed_count: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(5),
            interval_incr: Duration::ZERO,
            max_interval: Duration::from_secs(5),
            feed_count: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    status: String,
    comment: Option<String>,
    #[serde(default)]
    result: Vec<FeedEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedEntry {
    id: u64,
    verdict: Option<String>,
    #[serde(default)]
    passed_test_count: u32,
    #[serde(default)]
    time_consumed_millis: u64,
    #[serde(default)]
    memory_consumed_bytes: u64,
    problem: FeedProblem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedProblem {
    contest_id: Option<u64>,
    index: String,
}

impl FeedEntry {
    fn problem_key(&self) -> String {
        match self.problem.contest_id {
            Some(contest_id) => format!("{}{}", contest_id, self.problem.index),
            None => self.problem.index.clone(),
        }
    }

    fn matches(&self, target: &PollTarget) -> bool {
        match target {
            PollTarget::ById(id) => self.id == *id,
            PollTarget::LatestForProblem {
                problem_key,
                newer_than,
            } => {
                newer_than.map_or(true, |floor| self.id > floor)
                    && self.problem_key().eq_ignore_ascii_case(problem_key)
            }
        }
    }

    fn into_verdict(self) -> Verdict {
        let state = match self.verdict.as_deref() {
            None | Some("TESTING") => VerdictState::Testing,
            Some(name) => VerdictState::Final(name.into()),
        };
        Verdict {
            submission_id: Some(self.id),
            problem_key: self.problem_key(),
            state,
            tests_passed: self.passed_test_count,
            time_ms: self.time_consumed_millis,
            memory_bytes: self.memory_consumed_bytes,
        }
    }
}

/// Polls one outstanding submission. Owns its transport handle so it can be
/// moved into its own task.
pub struct VerdictPoller {
    transport: Arc<dyn Transport>,
    base_url: String,
    read_timeout: Duration,
    config: PollConfig,
}

impl VerdictPoller {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        read_timeout: Duration,
        config: PollConfig,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            read_timeout,
            config,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    async fn fetch_feed(&self, handle: &str) -> Result<Vec<FeedEntry>> {
        let count = self.config.feed_count.max(1).to_string();
        let url = reqwest::Url::parse_with_params(
            &join_url(&self.base_url, paths::USER_STATUS),
            &[("handle", handle), ("from", "1"), ("count", count.as_str())],
        )
        .map_err(|e| JudgeError::MalformedInput(format!("invalid feed url: {e}")))?;

        let resp = self
            .transport
            .get(
                url.as_str(),
                &IdentityContext::anonymous(),
                &[("Accept", "application/json")],
                self.read_timeout,
            )
            .await?;

        let envelope = serde_json::from_str::<FeedEnvelope>(&resp.body).map_err(|e| {
            JudgeError::Feed(format!(
                "HTTP {}: undecodable body ({e}): {}",
                resp.status_code,
                excerpt(&resp.body, 200)
            ))
        })?;
        if envelope.status != "OK" {
            return Err(JudgeError::Feed(
                envelope.comment.unwrap_or_else(|| envelope.status.clone()),
            ));
        }
        Ok(envelope.result)
    }

    /// One look at the feed. `None` if the target is not among the recent
    /// entries.
    pub async fn look(&self, handle: &str, target: &PollTarget) -> Result<Option<Verdict>> {
        let entries = self.fetch_feed(handle).await?;
        Ok(entries
            .into_iter()
            .find(|e| e.matches(target))
            .map(FeedEntry::into_verdict))
    }

    /// Newest submission id for `problem_key` currently in the feed. Feed
    /// failures are logged and read as "none seen".
    pub async fn latest_id(&self, handle: &str, problem_key: &str) -> Option<u64> {
        let target = PollTarget::LatestForProblem {
            problem_key: problem_key.into(),
            newer_than: None,
        };
        match self.look(handle, &target).await {
            Ok(verdict) => verdict.and_then(|v| v.submission_id),
            Err(e) => {
                warn!("reading latest {problem_key} submission of {handle} failed: {e}");
                None
            }
        }
    }

    pub async fn poll(&self, handle: &str, target: PollTarget) -> Result<Verdict> {
        self.watch(handle, target, None).await
    }

    /// Poll until a final verdict or `max_attempts` feed queries. Running out
    /// of attempts is not an error: the last observed state is returned, or
    /// a `Testing` placeholder if the submission never showed up. Feed
    /// failures only surface when no attempt succeeded. Every change in the
    /// observed state is sent to `updates`.
    pub async fn watch(
        &self,
        handle: &str,
        mut target: PollTarget,
        updates: Option<UnboundedSender<Verdict>>,
    ) -> Result<Verdict> {
        if handle.trim().is_empty() {
            return Err(JudgeError::MalformedInput("empty handle".into()));
        }

        let attempts = self.config.max_attempts.max(1);
        let ceiling = std::cmp::max(self.config.max_interval, self.config.interval);
        let mut sleep_time = self.config.interval;
        let mut last: Option<Verdict> = None;
        let mut last_err: Option<JudgeError> = None;
        let mut any_success = false;

        for attempt in 1..=attempts {
            let mut changed = false;
            match self.look(handle, &target).await {
                Ok(Some(verdict)) => {
                    any_success = true;
                    if let (PollTarget::LatestForProblem { .. }, Some(id)) =
                        (&target, verdict.submission_id)
                    {
                        debug!("resolved latest submission for {handle} to {id}");
                        target = PollTarget::ById(id);
                    }
                    if last.as_ref() != Some(&verdict) {
                        changed = true;
                        if let Some(tx) = &updates {
                            if tx.send(verdict.clone()).is_err() {
                                info!("nobody is listening for {target:?} any more, stop polling");
                                return Ok(verdict);
                            }
                        }
                    }
                    if verdict.is_final() {
                        info!(
                            "submission {:?} final verdict {} after {attempt} polls",
                            verdict.submission_id,
                            verdict.label()
                        );
                        return Ok(verdict);
                    }
                    last = Some(verdict);
                }
                Ok(None) => {
                    any_success = true;
                    debug!("{target:?} not yet in the feed of {handle} (attempt {attempt})");
                }
                Err(e) => {
                    warn!("polling {target:?} for {handle} failed (attempt {attempt}): {e}");
                    last_err = Some(e);
                }
            }

            if attempt == attempts {
                break;
            }
            sleep_time = if changed {
                self.config.interval
            } else {
                std::cmp::min(sleep_time + self.config.interval_incr, ceiling)
            };
            tokio::time::sleep(sleep_time).await;
        }

        if let Some(verdict) = last {
            return Ok(verdict);
        }
        match last_err {
            Some(e) if !any_success => Err(e),
            _ => Ok(Verdict::placeholder(&target)),
        }
    }
}
