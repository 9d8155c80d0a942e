//! Stub retrieval service over HTTP.
//!
//! Serves the six endpoints the client consumes from a [`MemoryBackend`], so
//! the CLI (or a browser front-end) can be developed without the real
//! scrape/answer service. Integration tests bind it to an ephemeral port to
//! exercise [`HttpBackend`](crate::backend::HttpBackend) end to end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/list-collections` | Collection keywords |
//! | `POST` | `/chat-history` | Persisted messages of a collection |
//! | `POST` | `/ask` | Answer a question (scripted or placeholder) |
//! | `POST` | `/chat-save` | Append an exchange |
//! | `POST` | `/del-collection` | Delete a collection |
//! | `POST` | `/scrape` | Create a collection |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Validation and backend-reported failures answer `400` with
//! `{ "error": "<message>" }`. Injected network failures answer `503` with a
//! plain-text body, which clients see as a transport failure.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front-end
//! served from another port can call it.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::backend::memory::MemoryBackend;
use crate::backend::wire::{
    AskBody, AskReplyBody, CollectionListBody, ErrorBody, HistoryBody, KeywordBody, SaveBody,
    ScrapeBody, WireCitation, WireMessage,
};
use crate::backend::{AskRequest, Backend};
use crate::config::Config;
use crate::error::ClientError;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    backend: Arc<MemoryBackend>,
}

/// Starts the stub server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_stub_server(config: &Config, backend: Arc<MemoryBackend>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Stub backend listening on http://{}", bind_addr);
    serve(listener, backend).await
}

/// Serve the stub endpoints on an already bound listener.
pub async fn serve(
    listener: tokio::net::TcpListener,
    backend: Arc<MemoryBackend>,
) -> anyhow::Result<()> {
    info!(addr = ?listener.local_addr().ok(), "stub backend started");
    axum::serve(listener, router(backend)).await?;
    Ok(())
}

pub fn router(backend: Arc<MemoryBackend>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/list-collections", get(handle_list_collections))
        .route("/chat-history", post(handle_chat_history))
        .route("/ask", post(handle_ask))
        .route("/chat-save", post(handle_chat_save))
        .route("/del-collection", post(handle_del_collection))
        .route("/scrape", post(handle_scrape))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { backend })
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
    json: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.json {
            let body = ErrorBody {
                error: self.message,
            };
            (self.status, Json(body)).into_response()
        } else {
            (self.status, self.message).into_response()
        }
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Network(message) => AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message,
                json: false,
            },
            other => bad_request(match other {
                ClientError::Backend(message) => message,
                validation => validation.to_string(),
            }),
        }
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
        json: true,
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Collections ============

async fn handle_list_collections(
    State(state): State<AppState>,
) -> Result<Json<CollectionListBody>, AppError> {
    let collection_list = state.backend.list_collections().await?;
    Ok(Json(CollectionListBody { collection_list }))
}

async fn handle_del_collection(
    State(state): State<AppState>,
    Json(body): Json<KeywordBody>,
) -> Result<Json<KeywordBody>, AppError> {
    let keyword = state.backend.delete_collection(&body.keyword).await?;
    Ok(Json(KeywordBody { keyword }))
}

async fn handle_scrape(
    State(state): State<AppState>,
    Json(body): Json<ScrapeBody>,
) -> Result<Json<KeywordBody>, AppError> {
    let keyword = state
        .backend
        .create_collection(&body.keyword, &body.subject)
        .await?;
    Ok(Json(KeywordBody { keyword }))
}

// ============ History ============

async fn handle_chat_history(
    State(state): State<AppState>,
    Json(body): Json<KeywordBody>,
) -> Result<Json<HistoryBody>, AppError> {
    let messages = state.backend.chat_history(&body.keyword).await?;
    Ok(Json(HistoryBody {
        messages: messages.iter().map(WireMessage::from).collect(),
    }))
}

async fn handle_chat_save(
    State(state): State<AppState>,
    Json(body): Json<SaveBody>,
) -> Result<Json<KeywordBody>, AppError> {
    let keyword = body.keyword.clone();
    if keyword.is_empty() {
        return Err(bad_request("No chat provided"));
    }
    let exchange = body
        .into_exchange()
        .ok_or_else(|| bad_request("No content provided"))?;
    state.backend.save_exchange(&keyword, &exchange).await?;
    Ok(Json(KeywordBody { keyword }))
}

// ============ POST /ask ============

async fn handle_ask(
    State(state): State<AppState>,
    Json(body): Json<AskBody>,
) -> Result<Json<AskReplyBody>, AppError> {
    let request = AskRequest {
        question: body.question,
        keyword: body.keyword,
        history: body.history,
    };
    match state.backend.ask(&request).await {
        Ok(answer) => Ok(Json(AskReplyBody {
            answer: Some(answer.text),
            citation: answer.citations.iter().map(WireCitation::from).collect(),
            error: None,
        })),
        // The service reports answer failures in a 200 body.
        Err(ClientError::Backend(message)) => Ok(Json(AskReplyBody {
            error: Some(message),
            ..Default::default()
        })),
        Err(e) => Err(e.into()),
    }
}
