use crate::{global, judger::Codeforces};

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use hyper::Request;
use simple_log::log::{info, warn};
use std::sync::Arc;

use super::{task, WsRequest};

pub async fn make_ws_server() -> anyhow::Result<()> {
    let config = global::server_config();
    let ws_addr = format!("{}:{}", config.host, config.ws_port);

    // one HTTP client, and so one connection pool, for all connections
    let cf = Arc::new(Codeforces::from_global()?);

    info!("websocket service: {}", ws_addr);
    axum::Server::bind(&ws_addr.parse().context("invalid listen address")?)
        .serve(router(cf).into_make_service())
        .await?;
    Ok(())
}

fn router(cf: Arc<Codeforces>) -> Router {
    Router::new()
        .route("/entry", get(web_socket_handler))
        .route_layer(middleware::from_fn(check_access_token))
        .with_state(cf)
}

async fn check_access_token<B>(req: Request<B>, next: Next<B>) -> Response {
    let Some(token) = global::server_config().access_token.as_ref() else {
        return next.run(req).await;
    };
    if let Some(token_header) = req.headers().get("ACCESS_TOKEN") {
        if let Ok(access_token) = token_header.to_str() {
            if access_token == token.as_str() {
                return next.run(req).await;
            }
        }
    }
    serde_json::json!({"error": "permission denied"})
        .to_string()
        .into_response()
}

async fn send_error(socket: &mut WebSocket, msg: String) {
    let _ = socket
        .send(Message::Text(serde_json::json!({ "error": msg }).to_string()))
        .await;
}

async fn web_socket_handler(State(cf): State<Arc<Codeforces>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket| async move {
        let Some(Ok(msg)) = socket.recv().await else {
            send_error(&mut socket, "failed to read websocket message".into()).await;
            return;
        };

        let req = match serde_json::from_slice::<WsRequest>(msg.into_data().as_slice()) {
            Ok(req) => req,
            Err(e) => {
                send_error(&mut socket, format!("invalid request: {e}")).await;
                return;
            }
        };

        // cookies and source stay out of the log
        info!(
            "{} request for {:?}",
            req.request_type,
            req.problem_id.as_deref().or(req.handle.as_deref())
        );

        if let Err(e) = task::run(&cf, &mut socket, req).await {
            warn!("request failed: {e}");
            send_error(&mut socket, e.to_string()).await;
        }
    })
}
