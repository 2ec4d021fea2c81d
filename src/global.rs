use crate::judger::RemoteJudgeConfig;
use crate::server::ServerConfig;
use anyhow::Context;
use once_cell::sync::OnceCell;
use std::collections::HashMap;

static REMOTE_JUDGE_CONFIG: OnceCell<RemoteJudgeConfig> = OnceCell::new();
static SERVER_CONFIG: OnceCell<ServerConfig> = OnceCell::new();

use simple_log::LogConfigBuilder;
use std::path::PathBuf;

pub async fn init_config(
    server_path: PathBuf,
    config_path: PathBuf,
    logger_path: PathBuf,
) -> anyhow::Result<()> {
    // service config
    let server_config_file = tokio::fs::read(server_path.as_path())
        .await
        .with_context(|| format!("missing server config {}", server_path.display()))?;
    let server_config = serde_json::from_slice::<ServerConfig>(&server_config_file)
        .context("failed to parse server config")?;
    SERVER_CONFIG
        .set(server_config)
        .map_err(|_| anyhow::anyhow!("server config already initialised"))?;

    // remote judge config
    let rj_config_file = tokio::fs::read(config_path.as_path())
        .await
        .with_context(|| format!("missing remote judge config {}", config_path.display()))?;
    let rj_config = serde_json::from_slice::<RemoteJudgeConfig>(&rj_config_file)
        .context("failed to parse remote judge config")?;
    REMOTE_JUDGE_CONFIG
        .set(rj_config)
        .map_err(|_| anyhow::anyhow!("remote judge config already initialised"))?;

    let log_path = logger_path
        .to_str()
        .context("log path is not valid utf-8")?;
    let log_config = LogConfigBuilder::builder()
        .path(log_path)
        .level("info")
        .output_file()
        .build();
    simple_log::new(log_config).map_err(|e| anyhow::anyhow!("failed to init logger: {e}"))?;

    Ok(())
}

pub fn remote_judge_config() -> &'static RemoteJudgeConfig {
    REMOTE_JUDGE_CONFIG.get_or_init(RemoteJudgeConfig::default)
}

pub fn server_config() -> &'static ServerConfig {
    SERVER_CONFIG.get_or_init(ServerConfig::default)
}

pub mod remote_judge_constant {
    pub const BASE_URL: &str = "https://codeforces.com/";
    pub const COOKIE_DOMAIN: &str = ".codeforces.com";

    pub mod paths {
        pub const HOME: &str = "";
        pub const SUBMIT: &str = "problemset/submit";
        pub const USER_STATUS: &str = "api/user.status";
    }
}

pub mod task_constant {
    pub mod names {
        pub const VALIDATE: &str = "validate";
        pub const JUDGE: &str = "judge";
        pub const VERDICT: &str = "verdict";
    }
}

pub mod judge_status {
    pub const AC: &str = "Accepted";
    pub const WA: &str = "Wrong Answer";
    pub const RE: &str = "Runtime Error";
    pub const TLE: &str = "Time Limit Exceeded";
    pub const MLE: &str = "Memory Limit Exceeded";
    pub const ILE: &str = "Idleness Limit Exceeded";
    pub const CE: &str = "Compile Error";
    pub const PC: &str = "Partial";
    pub const SK: &str = "Skipped";
    pub const RJ: &str = "Rejected";
    pub const SE: &str = "System Error";
    pub const RN: &str = "Running";
}

/// Codeforces API verdict names to display labels.
pub fn judge_status_map() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceCell<HashMap<&'static str, &'static str>> = OnceCell::new();
    MAP.get_or_init(|| {
        vec![
            ("OK", judge_status::AC),
            ("WRONG_ANSWER", judge_status::WA),
            ("PRESENTATION_ERROR", judge_status::WA),
            ("RUNTIME_ERROR", judge_status::RE),
            ("TIME_LIMIT_EXCEEDED", judge_status::TLE),
            ("MEMORY_LIMIT_EXCEEDED", judge_status::MLE),
            ("IDLENESS_LIMIT_EXCEEDED", judge_status::ILE),
            ("COMPILATION_ERROR", judge_status::CE),
            ("PARTIAL", judge_status::PC),
            ("SKIPPED", judge_status::SK),
            ("REJECTED", judge_status::RJ),
            ("CHALLENGED", judge_status::WA),
            ("SECURITY_VIOLATED", judge_status::RE),
            ("CRASHED", judge_status::SE),
            ("INPUT_PREPARATION_CRASHED", judge_status::SE),
            ("FAILED", judge_status::SE),
            ("TESTING", judge_status::RN),
        ]
        .into_iter()
        .collect()
    })
}
