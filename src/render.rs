//! Conversation → view model.
//!
//! The view model is deterministic: the same conversation always renders the
//! same way. Assistant messages are rich text (markdown) aligned left, user
//! messages are plain text aligned right, and every message carries its
//! rendered citations (empty for user messages).

use serde::Serialize;

use crate::citations::{render_citations, CitationLink};
use crate::models::{Message, Speaker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "format", content = "text", rename_all = "snake_case")]
pub enum MessageBody {
    /// Markdown to be rendered as rich text.
    RichText(String),
    /// Shown verbatim.
    PlainText(String),
}

impl MessageBody {
    pub fn text(&self) -> &str {
        match self {
            MessageBody::RichText(t) | MessageBody::PlainText(t) => t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub speaker: Speaker,
    pub alignment: Alignment,
    pub body: MessageBody,
    pub citations: Vec<CitationLink>,
}

pub fn render_message(message: &Message) -> RenderedMessage {
    let (alignment, body) = match message.role {
        Speaker::User => (Alignment::Right, MessageBody::PlainText(message.content.clone())),
        Speaker::Assistant => (Alignment::Left, MessageBody::RichText(message.content.clone())),
    };
    RenderedMessage {
        speaker: message.role,
        alignment,
        body,
        citations: render_citations(&message.citations),
    }
}

pub fn render_conversation(messages: &[Message]) -> Vec<RenderedMessage> {
    messages.iter().map(render_message).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Citation;

    #[test]
    fn user_messages_are_plain_and_right_aligned() {
        let rendered = render_message(&Message::user("hi"));
        assert_eq!(rendered.alignment, Alignment::Right);
        assert_eq!(rendered.body, MessageBody::PlainText("hi".to_string()));
        assert!(rendered.citations.is_empty());
    }

    #[test]
    fn assistant_messages_are_rich_and_carry_citations() {
        let rendered = render_message(&Message::assistant(
            "**X** is Y",
            vec![Citation::new("http://a", 2, "Doc")],
        ));
        assert_eq!(rendered.alignment, Alignment::Left);
        assert_eq!(rendered.body, MessageBody::RichText("**X** is Y".to_string()));
        assert_eq!(rendered.citations.len(), 1);
        assert_eq!(rendered.citations[0].href, "http://a#page=2");
    }

    #[test]
    fn conversation_keeps_order() {
        let messages = vec![Message::user("q"), Message::assistant("a", vec![])];
        let rendered = render_conversation(&messages);
        assert_eq!(rendered[0].body.text(), "q");
        assert_eq!(rendered[1].body.text(), "a");
    }
}
