//! Core data models used throughout the chat client.
//!
//! These types are the canonical in-process representation. Wire encodings
//! (numeric roles, `link` vs `url`) are converted in [`crate::backend::wire`]
//! and never leak past it.

use serde::Serialize;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    /// Role label used in the conversational transcript sent to `/ask`.
    pub fn transcript_role(self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Assistant => "assistant",
        }
    }
}

/// A pointer into a source document backing part of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub url: String,
    pub page: u32,
    pub title: String,
}

impl Citation {
    pub fn new(url: impl Into<String>, page: u32, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            page,
            title: title.into(),
        }
    }
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Speaker,
    pub content: String,
    /// Only ever non-empty on assistant messages.
    pub citations: Vec<Citation>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Speaker::User,
            content: content.into(),
            citations: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            role: Speaker::Assistant,
            content: content.into(),
            citations,
        }
    }
}

/// A question, its answer and the answer's citations: the unit persisted
/// after every successful ask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
    pub citations: Vec<Citation>,
}

impl Exchange {
    /// The two messages this exchange becomes once persisted, in order.
    pub fn into_messages(self) -> [Message; 2] {
        [
            Message::user(self.question),
            Message::assistant(self.answer, self.citations),
        ]
    }
}

/// A successful `/ask` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
}
