//! Terminal and JSON formatting of a rendered conversation.
//!
//! The terminal stands in for the chat box: assistant messages hug the left
//! margin, user messages are pushed right, and citations follow each message
//! as numbered references with their link targets.

use serde::Serialize;

use crate::render::{Alignment, RenderedMessage};

/// Width the user column is right-aligned against.
const LINE_WIDTH: usize = 80;

#[derive(Serialize)]
pub struct JsonConversation<'a> {
    pub collection: &'a str,
    pub messages: &'a [RenderedMessage],
}

pub fn format_json(collection: &str, messages: &[RenderedMessage]) -> String {
    let output = JsonConversation {
        collection,
        messages,
    };
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_human(collection: &str, messages: &[RenderedMessage]) -> String {
    if messages.is_empty() {
        return format!("No messages in \"{}\" yet.", collection);
    }

    let mut output = String::new();
    for message in messages {
        output.push_str(&format_message(message));
        output.push('\n');
    }
    output.trim_end().to_string()
}

pub fn format_message(message: &RenderedMessage) -> String {
    let mut output = String::new();
    for line in message.body.text().lines() {
        output.push_str(&align(line, message.alignment));
        output.push('\n');
    }

    for link in &message.citations {
        let reference = format!("[{}] {} <{}>", link.label(), link.tooltip, link.href);
        output.push_str(&align(&format!("  {}", reference), message.alignment));
        output.push('\n');
    }
    output
}

/// Names of the collections, the selected one marked.
pub fn format_collections(collections: &[String], selected: &str) -> String {
    if collections.is_empty() {
        return "No collections available.".to_string();
    }
    collections
        .iter()
        .map(|c| {
            let marker = if c == selected { "*" } else { " " };
            format!("{} {}", marker, c)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn align(line: &str, alignment: Alignment) -> String {
    match alignment {
        Alignment::Left => line.to_string(),
        Alignment::Right => format!("{:>width$}", line, width = LINE_WIDTH),
    }
}
