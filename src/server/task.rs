use super::WsRequest;
use crate::global::task_constant::names as task_names;
use crate::judger::codeforces::{poll_target, Codeforces};
use crate::judger::provider::Provider;
use anyhow::anyhow;
use axum::extract::ws::{Message, WebSocket};
use simple_log::log::info;

async fn send_json(ws: &mut WebSocket, value: serde_json::Value) -> anyhow::Result<()> {
    ws.send(Message::Text(value.to_string())).await?;
    Ok(())
}

async fn validate_task(cf: &Codeforces, ws: &mut WebSocket, req: WsRequest) -> anyhow::Result<()> {
    let Some(cookies) = req.cookies.as_deref() else {
        return Err(anyhow!("missing cookies"));
    };
    let res = cf.validate_cookies(cookies).await?;
    send_json(ws, serde_json::json!(res)).await
}

async fn judge_task(cf: &Codeforces, ws: &mut WebSocket, req: WsRequest) -> anyhow::Result<()> {
    let (Some(cookies), Some(problem_id), Some(source), Some(lang)) = (
        req.cookies.as_deref(),
        req.problem_id.as_deref(),
        req.source.as_deref(),
        req.lang.as_deref(),
    ) else {
        return Err(anyhow!("missing cookies, problem_id, source or lang"));
    };

    let Some(lang_id) = cf.config().resolve_lang(lang) else {
        return Err(anyhow!("unsupported language {lang}"));
    };

    let receipt = cf.submit_code(cookies, problem_id, source, &lang_id).await?;
    send_json(ws, serde_json::json!(receipt)).await?;
    if !receipt.success {
        return Ok(());
    }
    let Some(handle) = receipt.handle.clone() else {
        return Err(anyhow!("submitted, but the account handle is unknown"));
    };

    // the poller runs as its own task; this connection only relays updates
    let poller = cf.poller();
    let max_attempts = poller.config().max_attempts;
    let target = poll_target(&receipt, problem_id);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let job = tokio::spawn(async move { poller.watch(&handle, target, Some(tx)).await });

    while let Some(verdict) = rx.recv().await {
        send_json(ws, serde_json::json!({"verdict": verdict, "label": verdict.label()})).await?;
    }

    let verdict = job.await??;
    if !verdict.is_final() {
        return Err(anyhow!(
            "no final verdict after {max_attempts} polls, check the submission on the judge"
        ));
    }
    info!(
        "submission {:?} finished: {}",
        verdict.submission_id,
        verdict.label()
    );
    Ok(())
}

async fn verdict_task(cf: &Codeforces, ws: &mut WebSocket, req: WsRequest) -> anyhow::Result<()> {
    let (Some(handle), Some(submission_id)) = (req.handle.as_deref(), req.submission_id) else {
        return Err(anyhow!("missing handle or submission_id"));
    };
    let verdict = cf.get_verdict(handle, submission_id).await?;
    send_json(ws, serde_json::json!({"verdict": verdict, "label": verdict.label()})).await
}

pub async fn run(cf: &Codeforces, ws: &mut WebSocket, req: WsRequest) -> anyhow::Result<()> {
    match req.request_type.as_str() {
        task_names::VALIDATE => validate_task(cf, ws, req).await,
        task_names::JUDGE => judge_task(cf, ws, req).await,
        task_names::VERDICT => verdict_task(cf, ws, req).await,
        _ => Err(anyhow!("unknown request type {}", req.request_type)),
    }
}
