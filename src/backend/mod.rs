//! Backend abstraction for the retrieval service.
//!
//! The [`Backend`] trait covers the six endpoints the client consumes,
//! enabling pluggable implementations:
//!
//! - [`HttpBackend`]: the real JSON-over-HTTP service.
//! - [`MemoryBackend`]: an in-process fake with a call log, scripted
//!   answers and injectable latency/failures. It also backs the stub server.
//!
//! | Operation | Method & Path |
//! |-----------|---------------|
//! | [`list_collections`](Backend::list_collections) | `GET /list-collections` |
//! | [`chat_history`](Backend::chat_history) | `POST /chat-history` |
//! | [`ask`](Backend::ask) | `POST /ask` |
//! | [`save_exchange`](Backend::save_exchange) | `POST /chat-save` |
//! | [`delete_collection`](Backend::delete_collection) | `POST /del-collection` |
//! | [`create_collection`](Backend::create_collection) | `POST /scrape` |
//!
//! Implementations must be `Send + Sync`; the session controller shares one
//! behind an `Arc` across concurrently running operations.

pub mod http;
pub mod memory;
pub mod wire;

pub use http::HttpBackend;
pub use memory::MemoryBackend;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::models::{Answer, Exchange, Message};

/// A role-labelled transcript line: `(role, text)`.
pub type TranscriptLine = (String, String);

/// Everything `/ask` needs: the question, the collection to ground it in and
/// the prior conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskRequest {
    pub question: String,
    pub keyword: String,
    pub history: Vec<TranscriptLine>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Known collection keywords, in backend order.
    async fn list_collections(&self) -> Result<Vec<String>, ClientError>;

    /// Persisted messages of a collection, oldest first.
    async fn chat_history(&self, keyword: &str) -> Result<Vec<Message>, ClientError>;

    /// Ask a question. A body-level `error` comes back as
    /// [`ClientError::Backend`].
    async fn ask(&self, request: &AskRequest) -> Result<Answer, ClientError>;

    /// Append an exchange to a collection's history.
    async fn save_exchange(&self, keyword: &str, exchange: &Exchange) -> Result<(), ClientError>;

    /// Delete a collection. Returns the keyword the backend confirmed.
    async fn delete_collection(&self, keyword: &str) -> Result<String, ClientError>;

    /// Start a scrape job for `subject` under collection `name`. Returns the
    /// keyword of the (possibly pre-existing) collection.
    async fn create_collection(&self, name: &str, subject: &str) -> Result<String, ClientError>;
}
