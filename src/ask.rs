//! Ask pipeline.
//!
//! ```text
//!          submit (non-blank)          answer + saved / unsaved
//!   Idle ─────────────────────▶ Pending ──────────────────────▶ Fulfilled ─┐
//!    ▲                             │                                       │
//!    │                             └──── backend error / transport ──▶ Failed
//!    └──────────────────────────────── finish ─────────────────────────────┘
//! ```
//!
//! The pipeline sends the question with the role-labelled prior transcript,
//! and on an answer persists the exchange before returning. It never reloads
//! history itself: the reload must be checked against the current selection,
//! which only the session controller knows.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::{AskRequest, Backend, TranscriptLine};
use crate::error::{ClientError, ValidationError};
use crate::history::HistoryClient;
use crate::models::{Exchange, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AskPhase {
    #[default]
    Idle,
    Pending,
    Fulfilled,
    Failed,
}

impl AskPhase {
    /// `Idle -> Pending`. Any other starting phase means a request is still
    /// being processed.
    pub fn begin(&mut self) -> Result<(), ValidationError> {
        match self {
            AskPhase::Idle => {
                *self = AskPhase::Pending;
                Ok(())
            }
            _ => Err(ValidationError::RequestPending),
        }
    }

    /// `Pending -> Fulfilled | Failed`. Ignored outside `Pending`.
    pub fn settle(&mut self, outcome: &AskOutcome) {
        if *self == AskPhase::Pending {
            *self = if outcome.is_fulfilled() {
                AskPhase::Fulfilled
            } else {
                AskPhase::Failed
            };
        }
    }

    /// Back to `Idle`, from any phase.
    pub fn finish(&mut self) {
        *self = AskPhase::Idle;
    }

    pub fn is_pending(self) -> bool {
        self == AskPhase::Pending
    }
}

/// How an ask ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    /// Answered and persisted.
    Answered(Exchange),
    /// Answered, but persisting the exchange failed.
    Unsaved {
        exchange: Exchange,
        error: ClientError,
    },
    /// The backend returned an `error` body. Nothing was persisted.
    Rejected(String),
    /// The ask never produced an answer. Nothing was persisted.
    Failed(ClientError),
}

impl AskOutcome {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, AskOutcome::Answered(_) | AskOutcome::Unsaved { .. })
    }
}

/// Role-labelled transcript of `prior`, oldest first.
pub fn build_transcript(prior: &[Message]) -> Vec<TranscriptLine> {
    prior
        .iter()
        .map(|m| (m.role.transcript_role().to_string(), m.content.clone()))
        .collect()
}

/// Reject whitespace-only questions before anything else happens.
pub fn validate_question(question: &str) -> Result<(), ValidationError> {
    if question.trim().is_empty() {
        return Err(ValidationError::BlankQuestion);
    }
    Ok(())
}

#[derive(Clone)]
pub struct AskPipeline {
    backend: Arc<dyn Backend>,
    history: HistoryClient,
}

impl AskPipeline {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            history: HistoryClient::new(backend.clone()),
            backend,
        }
    }

    /// Ask `question` in `collection` with `prior` as context, then persist
    /// the exchange. The save is awaited before returning.
    pub async fn run(&self, question: &str, collection: &str, prior: &[Message]) -> AskOutcome {
        if let Err(e) = validate_question(question) {
            return AskOutcome::Failed(e.into());
        }

        let request = AskRequest {
            question: question.to_string(),
            keyword: collection.to_string(),
            history: build_transcript(prior),
        };

        let answer = match self.backend.ask(&request).await {
            Ok(answer) => answer,
            Err(ClientError::Backend(message)) => {
                info!(collection, error = %message, "ask rejected by backend");
                return AskOutcome::Rejected(message);
            }
            Err(e) => {
                warn!(collection, error = %e, "ask failed");
                return AskOutcome::Failed(e);
            }
        };

        let exchange = Exchange {
            question: question.to_string(),
            answer: answer.text,
            citations: answer.citations,
        };
        match self.history.save_exchange(collection, &exchange).await {
            Ok(()) => AskOutcome::Answered(exchange),
            Err(error) => {
                warn!(collection, error = %error, "failed to persist exchange");
                AskOutcome::Unsaved { exchange, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{BackendCall, Endpoint, MemoryBackend};
    use crate::models::{Answer, Citation};

    #[test]
    fn transcript_labels_roles_in_order() {
        let prior = vec![
            Message::user("hi"),
            Message::assistant("hello", vec![Citation::new("http://a", 1, "A")]),
            Message::user("more"),
        ];
        assert_eq!(
            build_transcript(&prior),
            vec![
                ("user".to_string(), "hi".to_string()),
                ("assistant".to_string(), "hello".to_string()),
                ("user".to_string(), "more".to_string()),
            ]
        );
    }

    #[test]
    fn phase_only_begins_from_idle() {
        let mut phase = AskPhase::default();
        assert!(phase.begin().is_ok());
        assert!(phase.is_pending());
        assert_eq!(phase.begin(), Err(ValidationError::RequestPending));

        phase.settle(&AskOutcome::Rejected("nope".to_string()));
        assert_eq!(phase, AskPhase::Failed);
        phase.finish();
        assert_eq!(phase, AskPhase::Idle);
    }

    #[test]
    fn settle_outside_pending_is_ignored() {
        let mut phase = AskPhase::Idle;
        phase.settle(&AskOutcome::Rejected("x".to_string()));
        assert_eq!(phase, AskPhase::Idle);
    }

    #[tokio::test]
    async fn answer_is_saved_with_the_literal_question() {
        let backend = Arc::new(MemoryBackend::with_collections(["beta"]));
        backend.script_answer(Ok(Answer {
            text: "X is Y".to_string(),
            citations: vec![Citation::new("http://a", 2, "Doc")],
        }));
        let pipeline = AskPipeline::new(backend.clone());

        let outcome = pipeline.run("What is X? ", "beta", &[]).await;
        let expected = Exchange {
            question: "What is X? ".to_string(),
            answer: "X is Y".to_string(),
            citations: vec![Citation::new("http://a", 2, "Doc")],
        };
        assert_eq!(outcome, AskOutcome::Answered(expected.clone()));
        assert_eq!(
            backend.calls().last(),
            Some(&BackendCall::SaveExchange {
                keyword: "beta".to_string(),
                exchange: expected,
            })
        );
    }

    #[tokio::test]
    async fn backend_error_skips_the_save() {
        let backend = Arc::new(MemoryBackend::with_collections(["beta"]));
        backend.script_answer(Err(ClientError::Backend("backend failure".to_string())));
        let pipeline = AskPipeline::new(backend.clone());

        let outcome = pipeline.run("q", "beta", &[]).await;
        assert_eq!(outcome, AskOutcome::Rejected("backend failure".to_string()));
        assert_eq!(backend.call_count(Endpoint::SaveExchange), 0);
    }

    #[tokio::test]
    async fn transport_failure_skips_the_save() {
        let backend = Arc::new(MemoryBackend::with_collections(["beta"]));
        backend.fail(Endpoint::Ask, ClientError::Network("reset".to_string()));
        let pipeline = AskPipeline::new(backend.clone());

        let outcome = pipeline.run("q", "beta", &[]).await;
        assert_eq!(
            outcome,
            AskOutcome::Failed(ClientError::Network("reset".to_string()))
        );
        assert_eq!(backend.call_count(Endpoint::SaveExchange), 0);
    }

    #[tokio::test]
    async fn failed_save_still_reports_the_answer() {
        let backend = Arc::new(MemoryBackend::with_collections(["beta"]));
        backend.fail(
            Endpoint::SaveExchange,
            ClientError::Network("gone".to_string()),
        );
        let pipeline = AskPipeline::new(backend.clone());

        let outcome = pipeline.run("q", "beta", &[]).await;
        assert!(outcome.is_fulfilled());
        assert!(matches!(outcome, AskOutcome::Unsaved { .. }));
    }

    #[tokio::test]
    async fn blank_question_makes_no_calls() {
        let backend = Arc::new(MemoryBackend::with_collections(["beta"]));
        let pipeline = AskPipeline::new(backend.clone());

        let outcome = pipeline.run(" \n ", "beta", &[]).await;
        assert!(matches!(
            outcome,
            AskOutcome::Failed(ClientError::Validation(ValidationError::BlankQuestion))
        ));
        assert!(backend.calls().is_empty());
    }
}
