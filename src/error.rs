//! Error taxonomy for the chat client.
//!
//! Every remote call returns a [`ClientError`]. The session controller never
//! lets one escape: network and backend failures are logged and degraded to
//! an empty list or an empty conversation, and the front-end only ever sees
//! outcome enums.

use thiserror::Error;

/// Failure of a backend operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Transport failure, undecodable body, or a non-2xx status without an
    /// `error` field in the body.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered but its body carries an `error` field.
    #[error("backend reported: {0}")]
    Backend(String),

    /// A client-side guard refused the action before any request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ClientError {
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

/// Client-side guards. None of these ever reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("question must not be blank")]
    BlankQuestion,
    #[error("no collection is selected")]
    NoCollectionSelected,
    #[error("a question is already pending")]
    RequestPending,
    #[error("collection name must not be blank")]
    BlankName,
    #[error("search subject must not be blank")]
    BlankSubject,
    #[error("collection id must not be empty")]
    MissingCollection,
}
