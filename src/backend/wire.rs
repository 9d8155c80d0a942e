//! JSON bodies exchanged with the retrieval service.
//!
//! This is the only place that knows how the service encodes things:
//!
//! - history roles are numeric (`0` = assistant, `1` = user); the decoder
//!   also accepts the strings `"assistant"` / `"user"`. Messages with any
//!   other role are dropped from the history.
//! - `/ask` citations carry their URL under `link`, history citations under
//!   `url`. Both decode into [`Citation::url`]; `page` and `title` may be
//!   missing or null. Encoded citations carry both keys, since `/chat-save`
//!   reads `link`.
//! - the `/ask` transcript labels roles `"assistant"` / `"user"`.
//!
//! Both directions are implemented so the same types serve the HTTP client
//! and the stub server.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ClientError;
use crate::models::{Citation, Exchange, Message, Speaker};

use super::TranscriptLine;

const ROLE_ASSISTANT: u8 = 0;
const ROLE_USER: u8 = 1;

/// `GET /list-collections` response.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CollectionListBody {
    #[serde(rename = "collectionList", default)]
    pub collection_list: Vec<String>,
}

/// `{ "keyword": ... }`: request of `/chat-history` and `/del-collection`,
/// response of `/del-collection`, `/chat-save` and `/scrape`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct KeywordBody {
    #[serde(default)]
    pub keyword: String,
}

/// `POST /chat-history` response.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HistoryBody {
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

impl HistoryBody {
    /// The decodable messages, in order. Entries with an unknown role are
    /// logged and skipped.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
            .into_iter()
            .filter_map(|m| match m.into_message() {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(error = %e, "skipping history entry");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireRole {
    Code(u8),
    Name(String),
}

impl From<Speaker> for WireRole {
    fn from(speaker: Speaker) -> Self {
        match speaker {
            Speaker::Assistant => WireRole::Code(ROLE_ASSISTANT),
            Speaker::User => WireRole::Code(ROLE_USER),
        }
    }
}

impl TryFrom<WireRole> for Speaker {
    type Error = ClientError;

    fn try_from(role: WireRole) -> Result<Self, Self::Error> {
        match role {
            WireRole::Code(ROLE_ASSISTANT) => Ok(Speaker::Assistant),
            WireRole::Code(ROLE_USER) => Ok(Speaker::User),
            WireRole::Name(name) if name.eq_ignore_ascii_case("assistant") => {
                Ok(Speaker::Assistant)
            }
            WireRole::Name(name) if name.eq_ignore_ascii_case("user") => Ok(Speaker::User),
            other => Err(ClientError::Network(format!(
                "unrecognised message role: {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: WireRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub citations: Vec<WireCitation>,
}

impl WireMessage {
    pub fn into_message(self) -> Result<Message, ClientError> {
        Ok(Message {
            role: Speaker::try_from(self.role)?,
            content: self.content,
            citations: self.citations.into_iter().map(Citation::from).collect(),
        })
    }
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.into(),
            content: message.content.clone(),
            citations: message.citations.iter().map(WireCitation::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireCitation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
}

impl From<WireCitation> for Citation {
    fn from(wire: WireCitation) -> Self {
        Citation {
            url: wire.url.or(wire.link).unwrap_or_default(),
            page: wire.page.unwrap_or(0),
            title: wire.title.unwrap_or_default(),
        }
    }
}

impl From<&Citation> for WireCitation {
    fn from(citation: &Citation) -> Self {
        Self {
            url: Some(citation.url.clone()),
            link: Some(citation.url.clone()),
            page: Some(citation.page),
            title: Some(citation.title.clone()),
        }
    }
}

/// `POST /ask` request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AskBody {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub history: Vec<TranscriptLine>,
}

/// `POST /ask` response. `citation` is singular on the wire.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AskReplyBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default)]
    pub citation: Vec<WireCitation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /chat-save` request. `content` is `[question, answer]`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SaveBody {
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub citations: Vec<WireCitation>,
}

impl SaveBody {
    pub fn new(keyword: &str, exchange: &Exchange) -> Self {
        Self {
            keyword: keyword.to_string(),
            content: vec![exchange.question.clone(), exchange.answer.clone()],
            citations: exchange.citations.iter().map(WireCitation::from).collect(),
        }
    }

    /// Back to an [`Exchange`]; `None` unless `content` has both halves.
    pub fn into_exchange(self) -> Option<Exchange> {
        let mut content = self.content.into_iter();
        let question = content.next()?;
        let answer = content.next()?;
        Some(Exchange {
            question,
            answer,
            citations: self.citations.into_iter().map(Citation::from).collect(),
        })
    }
}

/// `POST /scrape` request: `keyword` is the collection name, `subject` the
/// search term to scrape.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ScrapeBody {
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub subject: String,
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Extract a body-level `error` field, whatever its JSON type.
pub fn error_message(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_roles_decode_to_speakers() {
        let body: HistoryBody = serde_json::from_value(json!({
            "messages": [
                { "role": 1, "content": "hi", "citations": [] },
                { "role": 0, "content": "hello", "citations": [
                    { "url": "http://a", "page": 2, "title": "Doc", "id": 7 }
                ], "timestamp": "Mon, 01 Jan 2024 00:00:00 GMT", "id": 3 }
            ]
        }))
        .unwrap();

        let messages: Vec<Message> = body
            .messages
            .into_iter()
            .map(|m| m.into_message().unwrap())
            .collect();
        assert_eq!(messages[0], Message::user("hi"));
        assert_eq!(
            messages[1],
            Message::assistant("hello", vec![Citation::new("http://a", 2, "Doc")])
        );
    }

    #[test]
    fn string_roles_decode_to_speakers() {
        let msg: WireMessage =
            serde_json::from_value(json!({ "role": "assistant", "content": "x" })).unwrap();
        assert_eq!(msg.into_message().unwrap().role, Speaker::Assistant);
        let msg: WireMessage =
            serde_json::from_value(json!({ "role": "USER", "content": "x" })).unwrap();
        assert_eq!(msg.into_message().unwrap().role, Speaker::User);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let msg: WireMessage = serde_json::from_value(json!({ "role": 7, "content": "x" })).unwrap();
        assert!(msg.into_message().is_err());
    }

    #[test]
    fn unknown_role_entries_are_skipped_in_history() {
        let body: HistoryBody = serde_json::from_value(json!({
            "messages": [
                { "role": 1, "content": "q" },
                { "role": "system", "content": "prompt" },
                { "role": 0, "content": "a" }
            ]
        }))
        .unwrap();
        assert_eq!(
            body.into_messages(),
            vec![Message::user("q"), Message::assistant("a", vec![])]
        );
    }

    #[test]
    fn speakers_encode_numerically() {
        let wire = WireMessage::from(&Message::user("q"));
        assert_eq!(serde_json::to_value(&wire).unwrap()["role"], json!(1));
        let wire = WireMessage::from(&Message::assistant("a", vec![]));
        assert_eq!(serde_json::to_value(&wire).unwrap()["role"], json!(0));
    }

    #[test]
    fn ask_citations_accept_link_and_missing_fields() {
        let reply: AskReplyBody = serde_json::from_value(json!({
            "answer": "X is Y",
            "citation": [
                { "link": "http://a", "page": 2, "title": "Doc" },
                { "url": "http://b", "title": null }
            ]
        }))
        .unwrap();
        let citations: Vec<Citation> = reply.citation.into_iter().map(Citation::from).collect();
        assert_eq!(
            citations,
            vec![Citation::new("http://a", 2, "Doc"), Citation::new("http://b", 0, "")]
        );
    }

    #[test]
    fn save_body_matches_service_shape() {
        let exchange = Exchange {
            question: "What is X?".to_string(),
            answer: "X is Y".to_string(),
            citations: vec![Citation::new("http://a", 2, "Doc")],
        };
        let value = serde_json::to_value(SaveBody::new("beta", &exchange)).unwrap();
        assert_eq!(
            value,
            json!({
                "keyword": "beta",
                "content": ["What is X?", "X is Y"],
                "citations": [{
                    "url": "http://a",
                    "link": "http://a",
                    "page": 2,
                    "title": "Doc"
                }]
            })
        );
    }

    #[test]
    fn citation_with_both_keys_decodes() {
        let body: SaveBody = serde_json::from_value(json!({
            "keyword": "beta",
            "content": ["q", "a"],
            "citations": [{ "url": "http://a", "link": "http://a", "page": 1, "title": "A" }]
        }))
        .unwrap();
        let exchange = body.into_exchange().unwrap();
        assert_eq!(exchange.citations, vec![Citation::new("http://a", 1, "A")]);
    }

    #[test]
    fn transcript_serializes_as_pairs() {
        let body = AskBody {
            question: "q".to_string(),
            keyword: "k".to_string(),
            history: vec![("user".to_string(), "hi".to_string())],
        };
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["history"], json!([["user", "hi"]]));
    }

    #[test]
    fn error_field_of_any_type_is_extracted() {
        assert_eq!(
            error_message(&json!({ "error": "backend failure" })),
            Some("backend failure".to_string())
        );
        assert_eq!(
            error_message(&json!({ "error": { "code": 1 } })),
            Some("{\"code\":1}".to_string())
        );
        assert_eq!(error_message(&json!({ "error": null })), None);
        assert_eq!(error_message(&json!({ "answer": "x" })), None);
    }
}
