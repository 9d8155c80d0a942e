//! In-memory [`Backend`] for tests and the local stub server.
//!
//! Uses `HashMap` and `Vec` behind `std::sync` locks. Besides mirroring the
//! service's validation rules, it records every call it receives and lets a
//! test script answers, inject failures per endpoint, and delay asks, deletes
//! and history loads (per collection). Locks are never held across an `.await`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::models::{Answer, Exchange, Message};

use super::{AskRequest, Backend};

/// One received call, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    ListCollections,
    ChatHistory { keyword: String },
    Ask(AskRequest),
    SaveExchange { keyword: String, exchange: Exchange },
    DeleteCollection { keyword: String },
    CreateCollection { name: String, subject: String },
}

impl BackendCall {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            BackendCall::ListCollections => Endpoint::ListCollections,
            BackendCall::ChatHistory { .. } => Endpoint::ChatHistory,
            BackendCall::Ask(_) => Endpoint::Ask,
            BackendCall::SaveExchange { .. } => Endpoint::SaveExchange,
            BackendCall::DeleteCollection { .. } => Endpoint::DeleteCollection,
            BackendCall::CreateCollection { .. } => Endpoint::CreateCollection,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListCollections,
    ChatHistory,
    Ask,
    SaveExchange,
    DeleteCollection,
    CreateCollection,
}

pub struct MemoryBackend {
    collections: RwLock<Vec<String>>,
    histories: RwLock<HashMap<String, Vec<Message>>>,
    answers: Mutex<VecDeque<Result<Answer, ClientError>>>,
    failures: Mutex<HashMap<Endpoint, ClientError>>,
    history_latency: RwLock<HashMap<String, Duration>>,
    ask_latency: RwLock<Option<Duration>>,
    delete_latency: RwLock<Option<Duration>>,
    calls: Mutex<Vec<BackendCall>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(Vec::new()),
            histories: RwLock::new(HashMap::new()),
            answers: Mutex::new(VecDeque::new()),
            failures: Mutex::new(HashMap::new()),
            history_latency: RwLock::new(HashMap::new()),
            ask_latency: RwLock::new(None),
            delete_latency: RwLock::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A backend that already knows `keywords`, each with an empty history.
    pub fn with_collections<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new();
        for keyword in keywords {
            backend.add_collection(keyword);
        }
        backend
    }

    pub fn add_collection(&self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        let mut collections = self.collections.write().unwrap();
        if !collections.contains(&keyword) {
            collections.push(keyword.clone());
        }
        self.histories.write().unwrap().entry(keyword).or_default();
    }

    /// Replace the stored history of `keyword`, creating the collection if needed.
    pub fn set_history(&self, keyword: &str, messages: Vec<Message>) {
        self.add_collection(keyword);
        self.histories
            .write()
            .unwrap()
            .insert(keyword.to_string(), messages);
    }

    pub fn history(&self, keyword: &str) -> Vec<Message> {
        self.histories
            .read()
            .unwrap()
            .get(keyword)
            .cloned()
            .unwrap_or_default()
    }

    pub fn collections(&self) -> Vec<String> {
        self.collections.read().unwrap().clone()
    }

    /// Queue the result of a future `/ask` call. Unscripted asks get a
    /// placeholder answer without citations.
    pub fn script_answer(&self, answer: Result<Answer, ClientError>) {
        self.answers.lock().unwrap().push_back(answer);
    }

    /// Make every call to `endpoint` fail with `error` until cleared.
    pub fn fail(&self, endpoint: Endpoint, error: ClientError) {
        self.failures.lock().unwrap().insert(endpoint, error);
    }

    pub fn clear_failure(&self, endpoint: Endpoint) {
        self.failures.lock().unwrap().remove(&endpoint);
    }

    /// Delay every history load of `keyword` by `delay`. The history is read
    /// before the delay, so the reply reflects the state when it was asked.
    pub fn set_history_latency(&self, keyword: &str, delay: Duration) {
        self.history_latency
            .write()
            .unwrap()
            .insert(keyword.to_string(), delay);
    }

    pub fn set_ask_latency(&self, delay: Duration) {
        *self.ask_latency.write().unwrap() = Some(delay);
    }

    pub fn set_delete_latency(&self, delay: Duration) {
        *self.delete_latency.write().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.endpoint() == endpoint)
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: BackendCall) -> Result<(), ClientError> {
        let endpoint = call.endpoint();
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().get(&endpoint) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn collection_exists(&self, keyword: &str) -> bool {
        self.collections
            .read()
            .unwrap()
            .iter()
            .any(|k| k == keyword)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list_collections(&self) -> Result<Vec<String>, ClientError> {
        self.record(BackendCall::ListCollections)?;
        Ok(self.collections())
    }

    async fn chat_history(&self, keyword: &str) -> Result<Vec<Message>, ClientError> {
        self.record(BackendCall::ChatHistory {
            keyword: keyword.to_string(),
        })?;
        if keyword.is_empty() {
            return Err(ClientError::Backend("No chat provided".to_string()));
        }

        let messages = self.history(keyword);
        let delay = self.history_latency.read().unwrap().get(keyword).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(messages)
    }

    async fn ask(&self, request: &AskRequest) -> Result<Answer, ClientError> {
        self.record(BackendCall::Ask(request.clone()))?;
        if request.question.is_empty() {
            return Err(ClientError::Backend("No question provided".to_string()));
        }
        if request.keyword.is_empty() {
            return Err(ClientError::Backend("No database provided".to_string()));
        }

        let delay = *self.ask_latency.read().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.answers.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(Answer {
                text: format!(
                    "The stub backend has no retrieval model; \"{}\" was not looked up in '{}'.",
                    request.question, request.keyword
                ),
                citations: Vec::new(),
            })
        })
    }

    async fn save_exchange(&self, keyword: &str, exchange: &Exchange) -> Result<(), ClientError> {
        self.record(BackendCall::SaveExchange {
            keyword: keyword.to_string(),
            exchange: exchange.clone(),
        })?;
        if keyword.is_empty() {
            return Err(ClientError::Backend("No chat provided".to_string()));
        }
        if !self.collection_exists(keyword) {
            return Err(ClientError::Backend(format!(
                "Chat with keyword '{}' does not exist",
                keyword
            )));
        }

        let mut histories = self.histories.write().unwrap();
        histories
            .entry(keyword.to_string())
            .or_default()
            .extend(exchange.clone().into_messages());
        Ok(())
    }

    async fn delete_collection(&self, keyword: &str) -> Result<String, ClientError> {
        self.record(BackendCall::DeleteCollection {
            keyword: keyword.to_string(),
        })?;
        if keyword.is_empty() {
            return Err(ClientError::Backend("No collection provided".to_string()));
        }

        let delay = *self.delete_latency.read().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.collections.write().unwrap().retain(|k| k != keyword);
        self.histories.write().unwrap().remove(keyword);
        Ok(keyword.to_string())
    }

    async fn create_collection(&self, name: &str, subject: &str) -> Result<String, ClientError> {
        self.record(BackendCall::CreateCollection {
            name: name.to_string(),
            subject: subject.to_string(),
        })?;
        if subject.is_empty() {
            return Err(ClientError::Backend("No database provided".to_string()));
        }
        if name.is_empty() {
            return Err(ClientError::Backend("No collection name provided".to_string()));
        }

        self.add_collection(name);
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Citation;

    #[tokio::test]
    async fn save_appends_user_then_assistant() {
        let backend = MemoryBackend::with_collections(["alpha"]);
        let exchange = Exchange {
            question: "q".to_string(),
            answer: "a".to_string(),
            citations: vec![Citation::new("http://a", 1, "A")],
        };
        backend.save_exchange("alpha", &exchange).await.unwrap();

        let history = backend.chat_history("alpha").await.unwrap();
        assert_eq!(history, exchange.into_messages().to_vec());
    }

    #[tokio::test]
    async fn save_to_unknown_collection_is_rejected() {
        let backend = MemoryBackend::new();
        let exchange = Exchange {
            question: "q".to_string(),
            answer: "a".to_string(),
            citations: vec![],
        };
        let err = backend.save_exchange("ghost", &exchange).await.unwrap_err();
        assert!(matches!(err, ClientError::Backend(_)));
    }

    #[tokio::test]
    async fn injected_failure_is_recorded_and_returned() {
        let backend = MemoryBackend::with_collections(["alpha"]);
        backend.fail(
            Endpoint::ListCollections,
            ClientError::Network("down".to_string()),
        );
        assert!(backend.list_collections().await.is_err());
        assert_eq!(backend.call_count(Endpoint::ListCollections), 1);

        backend.clear_failure(Endpoint::ListCollections);
        assert_eq!(backend.list_collections().await.unwrap(), vec!["alpha"]);
    }

    #[tokio::test]
    async fn scripted_answers_are_consumed_in_order() {
        let backend = MemoryBackend::with_collections(["alpha"]);
        backend.script_answer(Err(ClientError::Backend("backend failure".to_string())));
        let request = AskRequest {
            question: "q".to_string(),
            keyword: "alpha".to_string(),
            history: vec![],
        };

        assert!(backend.ask(&request).await.is_err());
        let fallback = backend.ask(&request).await.unwrap();
        assert!(fallback.citations.is_empty());
    }

    #[tokio::test]
    async fn create_is_idempotent_for_existing_names() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.create_collection("rust", "rust lang").await.unwrap(), "rust");
        assert_eq!(backend.create_collection("rust", "rust lang").await.unwrap(), "rust");
        assert_eq!(backend.collections(), vec!["rust"]);
    }
}
