//! History store client.
//!
//! Loads the persisted conversation of a collection and appends exchanges to
//! it. The controller always awaits [`HistoryClient::save_exchange`] before
//! reloading, so the reload sees what was just written.

use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{ClientError, ValidationError};
use crate::models::{Exchange, Message};

#[derive(Clone)]
pub struct HistoryClient {
    backend: Arc<dyn Backend>,
}

impl HistoryClient {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Messages of `collection_id`, oldest first. No collection means no
    /// history; the backend is not asked.
    pub async fn load_history(&self, collection_id: &str) -> Result<Vec<Message>, ClientError> {
        if collection_id.is_empty() {
            return Ok(Vec::new());
        }
        self.backend.chat_history(collection_id).await
    }

    pub async fn save_exchange(
        &self,
        collection_id: &str,
        exchange: &Exchange,
    ) -> Result<(), ClientError> {
        if collection_id.is_empty() {
            return Err(ValidationError::MissingCollection.into());
        }
        if exchange.question.trim().is_empty() {
            return Err(ValidationError::BlankQuestion.into());
        }
        self.backend.save_exchange(collection_id, exchange).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{Endpoint, MemoryBackend};

    #[tokio::test]
    async fn empty_collection_id_loads_nothing_without_a_call() {
        let backend = Arc::new(MemoryBackend::with_collections(["alpha"]));
        let client = HistoryClient::new(backend.clone());

        assert!(client.load_history("").await.unwrap().is_empty());
        assert_eq!(backend.call_count(Endpoint::ChatHistory), 0);
    }

    #[tokio::test]
    async fn blank_question_is_never_saved() {
        let backend = Arc::new(MemoryBackend::with_collections(["alpha"]));
        let client = HistoryClient::new(backend.clone());
        let exchange = Exchange {
            question: "   ".to_string(),
            answer: "a".to_string(),
            citations: vec![],
        };

        let err = client.save_exchange("alpha", &exchange).await.unwrap_err();
        assert_eq!(err, ClientError::Validation(ValidationError::BlankQuestion));
        assert_eq!(backend.call_count(Endpoint::SaveExchange), 0);
    }
}
