//! HTTP routes.
//!
//! Every audit route is POST-only and answers either the report or
//! `{ "error": message }`. An empty body counts as `{}`.

use std::future::Future;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use wcag_audit::{AuditReport, AuditRequestBody, RenderMode, SourceKind, ValidationError};

use crate::error::ApiError;
use crate::AppState;

/// Build the router with all endpoints.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/audit", post(audit).fallback(method_not_allowed))
        .route("/api/audit_url", post(audit_url).fallback(method_not_allowed))
        .route(
            "/api/audit_dynamic",
            post(audit_dynamic).fallback(method_not_allowed),
        )
        .route("/api/audit_html", post(audit_html).fallback(method_not_allowed))
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("audit API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

fn parse_body(bytes: &[u8]) -> Result<AuditRequestBody, ValidationError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(AuditRequestBody::default());
    }
    serde_json::from_slice(bytes).map_err(|e| ValidationError::InvalidBody(e.to_string()))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let engine = state.auditor.evaluator().engine();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "chromium": state.chromium.as_ref().map(|p| p.display().to_string()),
        "scriptEngine": engine.script().map(|s| s.global().to_string()),
        // Markup and static URL audits never load the script payload.
        "staticEngine": engine.document_engine().map(|e| e.name().to_string()),
    }))
}

async fn audit(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AuditReport>, ApiError> {
    let request = parse_body(&body)?.validate()?;
    Ok(Json(state.auditor.execute(request).await?))
}

async fn audit_url(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AuditReport>, ApiError> {
    let request = parse_body(&body)?.validate_as(SourceKind::Url, RenderMode::Static)?;
    Ok(Json(state.auditor.execute(request).await?))
}

async fn audit_dynamic(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AuditReport>, ApiError> {
    let request = parse_body(&body)?.validate_as(SourceKind::Url, RenderMode::Dynamic)?;
    Ok(Json(state.auditor.execute(request).await?))
}

async fn audit_html(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AuditReport>, ApiError> {
    let request = parse_body(&body)?.validate_as(SourceKind::Html, RenderMode::Static)?;
    Ok(Json(state.auditor.execute(request).await?))
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
