use crate::judger::PollConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub ws_port: String,
    pub access_token: Option<String>,
    pub max_poll_times: usize,
    pub max_wait_time: u32,
    pub wait_incr: u32,
    pub wait_base: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            ws_port: "8020".into(),
            access_token: None,
            max_poll_times: 60,
            max_wait_time: 5,
            wait_incr: 0,
            wait_base: 5,
        }
    }
}

impl ServerConfig {
    /// Poll schedule in seconds from the config file.
    pub fn poll_config(&self, feed_count: usize) -> PollConfig {
        PollConfig {
            max_attempts: self.max_poll_times,
            interval: Duration::from_secs(self.wait_base as u64),
            interval_incr: Duration::from_secs(self.wait_incr as u64),
            max_interval: Duration::from_secs(self.max_wait_time as u64),
            feed_count,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WsRequest {
    pub request_type: String, // validate | judge | verdict

    pub cookies: Option<String>,
    pub problem_id: Option<String>,
    pub source: Option<String>,
    pub lang: Option<String>,
    pub handle: Option<String>,
    pub submission_id: Option<u64>,
}
