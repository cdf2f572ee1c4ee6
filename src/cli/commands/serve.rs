//! HTTP API server for integration with other systems.
//!
//! Exposes the summarize and deep-search flow as JSON endpoints.

use crate::cli::Output;
use crate::config::Settings;
use crate::execution::{FailureKind, Outcome};
use crate::results::{parse_records, SourceRecord};
use crate::session::Session;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared application state.
struct AppState {
    session: Session,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let session = Session::new(settings)?;
    let app = router(Arc::new(AppState { session }));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("tubedigest API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Summarize", "POST /summarize");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/summarize", post(summarize))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SummarizeRequest {
    /// YouTube URL or video ID
    url: String,
    /// Overrides `deep_search.enabled` when present
    #[serde(default)]
    deep_search: Option<bool>,
}

#[derive(Serialize, Default)]
struct SummarizeResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deep_search: Option<DeepSearchResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorResponse>,
}

#[derive(Serialize)]
struct DeepSearchResponse {
    topic: String,
    /// Backend text as returned.
    raw: String,
    /// Parsed records, when the backend produced a JSON array.
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<SourceRecord>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<FailureKind>,
    message: String,
}

fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::BackendUnavailable | FailureKind::ConnectionRefused => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        FailureKind::MalformedOutput => StatusCode::BAD_GATEWAY,
        FailureKind::ConfigError | FailureKind::TemplateError | FailureKind::Unknown => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// === Handlers ===

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "backend": state.session.backend().descriptor().to_string(),
    }))
}

async fn summarize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummarizeRequest>,
) -> impl IntoResponse {
    let url = req.url.trim();
    if url.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(SummarizeResponse {
                error: Some(ErrorResponse {
                    kind: None,
                    message: "Please enter a valid URL.".to_string(),
                }),
                ..Default::default()
            }),
        )
            .into_response();
    }

    info!("Summarize request for {}", url);
    let summary = match state.session.summarize_outcome(url).await {
        Outcome::Success(summary) => summary,
        Outcome::Failure(failure) => {
            return (
                status_for(failure.kind),
                Json(SummarizeResponse {
                    error: Some(ErrorResponse {
                        kind: Some(failure.kind),
                        message: failure.to_string(),
                    }),
                    ..Default::default()
                }),
            )
                .into_response();
        }
    };

    let deep_search = req
        .deep_search
        .unwrap_or(state.session.settings().deep_search.enabled);
    let deep_search = if deep_search {
        let (topic, raw) = state.session.extract_topic_then_deep_search(&summary).await;
        let sources = parse_records(&raw).ok();
        Some(DeepSearchResponse { topic, raw, sources })
    } else {
        None
    };

    Json(SummarizeResponse {
        success: true,
        summary: Some(summary),
        deep_search,
        error: None,
    })
    .into_response()
}
