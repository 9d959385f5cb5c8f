//! Axum routes for the `getwork` JSON-RPC dispatcher and the `/lp`
//! long-polling endpoint. `jsonrpsee`'s one-fn-per-method model can't
//! express this: a `getwork` call with no cached work must park the
//! connection itself, and a long-poll connection is answered later from a
//! different task entirely when a block changes.
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use pd_core::constants::{server_header, LONG_POLL_PATH};
use pd_core::types::ShareSubmission;
use pd_events::ClientInfo;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::warn;

use crate::queue::PendingRequest;
use crate::PoolServer;

pub fn router(server: PoolServer) -> Router {
    Router::new()
        .route("/", post(rpc))
        .route(LONG_POLL_PATH, get(long_poll))
        .with_state(server)
}

fn client_info(headers: &HeaderMap, remote_addr: SocketAddr) -> ClientInfo {
    let (user, password) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|b64| base64::engine::general_purpose::STANDARD.decode(b64).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|decoded| decoded.split_once(':').map(|(u, p)| (u.to_owned(), p.to_owned())))
        .unwrap_or_default();

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_owned();

    ClientInfo {
        user,
        password,
        remote_addr: remote_addr.to_string(),
        user_agent,
    }
}

/// Attaches the headers the original mutates in place on every response:
/// `Server`, `X-Long-Polling` (constant) and `X-Blocknum` (the current tip).
fn respond(server: &PoolServer, body: Value) -> Response {
    let mut response = Json(body).into_response();
    let headers = response.headers_mut();
    headers.insert("Server", HeaderValue::from_str(&server_header()).unwrap());
    headers.insert("X-Long-Polling", HeaderValue::from_static(LONG_POLL_PATH));
    headers.insert(
        "X-Blocknum",
        HeaderValue::from_str(&server.current_block().to_string()).unwrap_or(HeaderValue::from_static("0")),
    );
    response
}

fn envelope(result: Value, id: Value) -> Value {
    json!({ "result": result, "error": Value::Null, "id": id })
}

#[derive(Deserialize)]
struct RpcRequest {
    method: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    id: Value,
}

/// Parks the caller in the shared getwork queue and waits for the
/// orchestrator to hand back a template once one is available.
async fn park_for_work(server: &PoolServer, from_lp: bool, info: ClientInfo) -> Value {
    let (reply, rx) = oneshot::channel();
    server.push_request(PendingRequest { reply, from_lp, info });
    match rx.await {
        Ok(template) => serde_json::to_value(template.for_miner()).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}

async fn rpc(
    State(server): State<PoolServer>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<RpcRequest>,
) -> Response {
    let info = client_info(&headers, remote_addr);

    if req.method != "getwork" {
        let body = envelope(Value::Null, req.id);
        return respond(&server, body);
    }

    let params = req.params.as_array().cloned().unwrap_or_default();

    if params.is_empty() {
        server.dispatcher().notify_work_requested(&info);
        let work = park_for_work(&server, false, info).await;
        return respond(&server, envelope(work, req.id));
    }

    let data = match params[0].as_str() {
        Some(s) => s.to_owned(),
        None => {
            return (StatusCode::BAD_REQUEST, "params[0] must be a hex string").into_response();
        }
    };

    server.dispatcher().notify_work_submitted(&info);

    let submission = ShareSubmission { data: data.clone(), user: info.user.clone() };
    let accepted = match server.validator().validate(submission).await {
        Ok(()) => {
            server
                .dispatcher()
                .notify_work_validated(&info, pd_core::error::ShareOutcome::Success, None);

            let client = server.client().clone();
            let dispatcher = server.dispatcher().clone();
            let block = server.validator().current_block();
            let info = info.clone();
            tokio::spawn(async move {
                match client.submit_work(&data).await {
                    Ok(true) => dispatcher.notify_block_found(block, &info),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "submitting accepted share upstream failed"),
                }
            });

            true
        }
        Err(e) => {
            server
                .dispatcher()
                .notify_work_validated(&info, e.outcome(), Some(&e.to_string()));
            false
        }
    };

    respond(&server, envelope(json!(accepted), req.id))
}

async fn long_poll(
    State(server): State<PoolServer>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let info = client_info(&headers, remote_addr);
    server.dispatcher().notify_work_requested(&info);

    let work = park_for_work(&server, true, info).await;
    respond(&server, envelope(work, Value::String("0".into())))
}
