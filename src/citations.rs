//! Citation rendering.
//!
//! Turns the citations attached to an answer into numbered, clickable
//! references: one per citation, numbered from 1 in input order, linking to
//! the cited page of the source document.

use serde::Serialize;

use crate::models::Citation;

/// A single rendered reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationLink {
    /// 1-based position in the citation list.
    pub number: usize,
    /// Link target: the document URL with a `#page=` fragment.
    pub href: String,
    /// Hover text: `"<title> (Page <page>)"`.
    pub tooltip: String,
}

impl CitationLink {
    /// The visible label of the link.
    pub fn label(&self) -> String {
        self.number.to_string()
    }
}

/// Render `citations` as numbered links. An empty list renders as an empty
/// list.
pub fn render_citations(citations: &[Citation]) -> Vec<CitationLink> {
    citations
        .iter()
        .enumerate()
        .map(|(i, c)| CitationLink {
            number: i + 1,
            href: format!("{}#page={}", c.url, c.page),
            tooltip: format!("{} (Page {})", c.title, c.page),
        })
        .collect()
}
