use crate::relay::{RelayError, StreamRelay};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use grounded_core::extract_sources;
use grounded_ipc::{encode_frame, ChatRequest, DebugResponse, ErrorResponse};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    relay: StreamRelay,
}

impl AppState {
    pub fn new(relay: StreamRelay) -> Self {
        Self { relay }
    }
}

/// Error type for HTTP server. Only used before a stream is opened.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Upstream(String),
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            RelayError::UpstreamFailure(e) => ApiError::Upstream(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => {
                warn!(error = %msg, "Rejected chat request");
                (StatusCode::BAD_REQUEST, msg)
            }
            Self::Upstream(msg) => {
                error!(error = %msg, "Upstream generation failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to process chat request".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/api/chat", post(handle_chat))
        .route("/api/debug", post(handle_debug))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server and run until `shutdown` resolves
pub async fn run_server(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    info!("Starting HTTP server on {}", addr);

    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start HTTP server: {}", e))
}

/// Health check handler
async fn health() -> impl IntoResponse {
    "Grounded chat relay is running"
}

/// Streams the answer as server-sent events
async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let frames = state
        .relay
        .open(request.into_messages(), CancellationToken::new())
        .await?;

    let events = frames.filter_map(|frame| async move {
        match encode_frame(&frame) {
            Ok(json) => Some(Ok::<_, Infallible>(Event::default().data(json))),
            Err(e) => {
                error!(error = %e, "Dropping frame that failed to encode");
                None
            }
        }
    });

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// Runs the generation to completion and returns everything at once
async fn handle_debug(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<DebugResponse>, ApiError> {
    let Json(request) = payload?;
    let answer = state.relay.collect(request.into_messages()).await?;

    let sources = extract_sources(answer.metadata.as_ref());
    Ok(Json(DebugResponse {
        text: answer.text,
        grounding_metadata: answer.metadata,
        sources,
    }))
}
