//! Collection directory client.
//!
//! Thin wrapper over the collection endpoints. It owns no state: the session
//! controller keeps the list it returns.

use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{ClientError, ValidationError};

/// Yes/no gate in front of destructive actions.
///
/// Decoupled from any particular UI: the terminal front-end reads stdin,
/// tests answer with a constant.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl Confirm for bool {
    fn confirm(&self, _prompt: &str) -> bool {
        *self
    }
}

#[derive(Clone)]
pub struct DirectoryClient {
    backend: Arc<dyn Backend>,
}

impl DirectoryClient {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn list_collections(&self) -> Result<Vec<String>, ClientError> {
        self.backend.list_collections().await
    }

    /// Issue the delete. Callers are expected to have confirmed first.
    pub async fn delete_collection(&self, id: &str) -> Result<String, ClientError> {
        if id.is_empty() {
            return Err(ValidationError::MissingCollection.into());
        }
        self.backend.delete_collection(id).await
    }

    /// Start a collection: `name` becomes its keyword, `subject` is the
    /// search term the backend scrapes. Both are trimmed and must be
    /// non-blank.
    pub async fn create_collection(&self, name: &str, subject: &str) -> Result<String, ClientError> {
        let name = name.trim();
        let subject = subject.trim();
        if name.is_empty() {
            return Err(ValidationError::BlankName.into());
        }
        if subject.is_empty() {
            return Err(ValidationError::BlankSubject.into());
        }
        self.backend.create_collection(name, subject).await
    }
}
