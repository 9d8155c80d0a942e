//! [`Backend`] over the service's JSON HTTP API.
//!
//! One `reqwest::Client` is built per backend with the configured timeout.
//! Requests are never retried: a failure is reported once and the user
//! resubmits.
//!
//! # Status handling
//!
//! - body with an `error` field (any status) → [`ClientError::Backend`]
//! - non-2xx without `error` → [`ClientError::Network`]
//! - transport failure or undecodable JSON → [`ClientError::Network`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::ClientError;
use crate::models::{Answer, Citation, Exchange, Message};

use super::wire::{
    error_message, AskBody, AskReplyBody, CollectionListBody, HistoryBody, KeywordBody, SaveBody,
    ScrapeBody,
};
use super::{AskRequest, Backend};

pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(&config.base_url)?;
        // Endpoints are joined relative to the base, which needs a trailing slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Network(format!("invalid endpoint {}: {}", path, e)))
    }

    /// Send a request and decode the body as `T`, applying the status rules
    /// from the module docs.
    async fn call<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%method, %url, "backend request");

        let mut request = self
            .client
            .request(method, url)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let value: Option<Value> = serde_json::from_str(&text).ok();

        if let Some(message) = value.as_ref().and_then(error_message) {
            return Err(ClientError::Backend(message));
        }
        if !status.is_success() {
            return Err(ClientError::Network(format!("{} returned HTTP {}", path, status)));
        }

        let value = value
            .ok_or_else(|| ClientError::Network(format!("{} returned a non-JSON body", path)))?;
        serde_json::from_value(value)
            .map_err(|e| ClientError::Network(format!("{} returned an unexpected body: {}", path, e)))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_collections(&self) -> Result<Vec<String>, ClientError> {
        let body: CollectionListBody = self
            .call::<(), _>(Method::GET, "list-collections", None)
            .await?;
        Ok(body.collection_list)
    }

    async fn chat_history(&self, keyword: &str) -> Result<Vec<Message>, ClientError> {
        let request = KeywordBody {
            keyword: keyword.to_string(),
        };
        let body: HistoryBody = self
            .call(Method::POST, "chat-history", Some(&request))
            .await?;
        Ok(body.into_messages())
    }

    async fn ask(&self, request: &AskRequest) -> Result<Answer, ClientError> {
        let body = AskBody {
            question: request.question.clone(),
            keyword: request.keyword.clone(),
            history: request.history.clone(),
        };
        let reply: AskReplyBody = self.call(Method::POST, "ask", Some(&body)).await?;
        let text = reply
            .answer
            .ok_or_else(|| ClientError::Network("ask returned no answer".to_string()))?;
        Ok(Answer {
            text,
            citations: reply.citation.into_iter().map(Citation::from).collect(),
        })
    }

    async fn save_exchange(&self, keyword: &str, exchange: &Exchange) -> Result<(), ClientError> {
        let body = SaveBody::new(keyword, exchange);
        // The acknowledgement carries nothing the client uses.
        let _: Value = self.call(Method::POST, "chat-save", Some(&body)).await?;
        Ok(())
    }

    async fn delete_collection(&self, keyword: &str) -> Result<String, ClientError> {
        let request = KeywordBody {
            keyword: keyword.to_string(),
        };
        let body: KeywordBody = self
            .call(Method::POST, "del-collection", Some(&request))
            .await?;
        Ok(body.keyword)
    }

    async fn create_collection(&self, name: &str, subject: &str) -> Result<String, ClientError> {
        let request = ScrapeBody {
            keyword: name.to_string(),
            subject: subject.to_string(),
        };
        let body: KeywordBody = self.call(Method::POST, "scrape", Some(&request)).await?;
        if body.keyword.is_empty() {
            return Err(ClientError::Backend(
                "failed to scrape the collection".to_string(),
            ));
        }
        Ok(body.keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base_url: &str) -> HttpBackend {
        HttpBackend::new(&BackendConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn endpoints_join_onto_base_url() {
        let b = backend("http://127.0.0.1:5000");
        assert_eq!(
            b.endpoint("chat-history").unwrap().as_str(),
            "http://127.0.0.1:5000/chat-history"
        );

        let b = backend("http://example.com/api");
        assert_eq!(
            b.endpoint("ask").unwrap().as_str(),
            "http://example.com/api/ask"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = HttpBackend::new(&BackendConfig {
            base_url: "not a url".to_string(),
            timeout_secs: 5,
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let b = backend("http://127.0.0.1:9");
        let err = b.list_collections().await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {:?}", err);
    }
}
