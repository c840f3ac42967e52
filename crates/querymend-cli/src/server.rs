//! Webhook server.
//!
//! Exposes the correction step over HTTP so a workflow engine can call it
//! between the NL→SQL agent and query execution. Every endpoint is
//! stateless; the only shared state is the resolved [`PipelineConfig`].
//!
//! - `GET  /healthz`
//! - `POST /correct`          payload (object or array) → output/error records
//! - `POST /check`            `{sql, limit?, sample?}` → guard report
//! - `POST /analysis/prompt`  executed rows → analysis prompt

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use querymend_pipeline::PipelineConfig;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;

use crate::ops::{self, CheckRequest};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Written once the listener is bound: `{"addr": ..., "pid": ...}`.
    pub ready_file: Option<PathBuf>,
    pub pipeline: PipelineConfig,
}

struct ServerState {
    pipeline: PipelineConfig,
}

pub fn serve(config: ServerConfig) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;

    rt.block_on(async move { serve_async(config).await })
}

async fn serve_async(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|e| anyhow!("serve: failed to bind {}: {e}", config.listen))?;
    let bound = listener
        .local_addr()
        .map_err(|e| anyhow!("serve: failed to read bound addr: {e}"))?;

    tracing::info!(
        addr = %bound,
        row_cap = config.pipeline.correction.row_cap,
        positive_only = config.pipeline.correction.positive_only,
        "serve: listening"
    );
    eprintln!("serve: listening on http://{bound}");
    if let Some(path) = config.ready_file.as_ref() {
        let payload = serde_json::json!({
            "addr": bound.to_string(),
            "pid": std::process::id(),
        });
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::write(path, serde_json::to_string_pretty(&payload).unwrap_or_default()).ok();
    }

    let state = Arc::new(ServerState {
        pipeline: config.pipeline,
    });

    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| anyhow!("serve: accept failed: {e}"))?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::warn!(%peer, error = %e, "serve: connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    tracing::debug!(%method, %path, "request");

    let resp = match (method, path.as_str()) {
        (Method::GET, "/healthz") => text_response(StatusCode::OK, "ok\n"),
        (Method::POST, "/correct") => {
            let body = req.into_body().collect().await?.to_bytes().to_vec();
            match handle_correct(&state, &body) {
                Ok(v) => json_response(StatusCode::OK, &v),
                Err(e) => json_error(StatusCode::BAD_REQUEST, &e.to_string()),
            }
        }
        (Method::POST, "/check") => {
            let body = req.into_body().collect().await?.to_bytes().to_vec();
            match handle_check(&body) {
                Ok(v) => json_response(StatusCode::OK, &v),
                Err(e) => json_error(StatusCode::BAD_REQUEST, &e.to_string()),
            }
        }
        (Method::POST, "/analysis/prompt") => {
            let body = req.into_body().collect().await?.to_bytes().to_vec();
            match handle_analysis_prompt(&state, &body) {
                Ok(v) => json_response(StatusCode::OK, &v),
                Err(e) => json_error(StatusCode::BAD_REQUEST, &e.to_string()),
            }
        }
        (_, "/healthz" | "/correct" | "/check" | "/analysis/prompt") => {
            json_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
        _ => json_error(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(resp)
}

/// Malformed records come back as error records with status 200; only a
/// body that is not JSON at all is rejected.
fn handle_correct(state: &ServerState, body: &[u8]) -> Result<Value> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| anyhow!("invalid JSON body: {e}"))?;
    Ok(ops::correct_payload(&payload, &state.pipeline, None))
}

fn handle_check(body: &[u8]) -> Result<ops::CheckReport> {
    let req: CheckRequest =
        serde_json::from_slice(body).map_err(|e| anyhow!("invalid check request: {e}"))?;
    Ok(ops::check_sql(&req))
}

fn handle_analysis_prompt(state: &ServerState, body: &[u8]) -> Result<Value> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| anyhow!("invalid JSON body: {e}"))?;
    Ok(ops::analysis_payload(&payload, &state.pipeline)?)
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"internal error"))))
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{\"error\":\"serialize\"}".to_vec());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"{\"error\":\"internal\"}"))))
}

fn json_error(status: StatusCode, msg: &str) -> Response<Full<Bytes>> {
    let v = serde_json::json!({ "error": msg });
    json_response(status, &v)
}
