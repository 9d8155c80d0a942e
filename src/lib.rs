//! # Collection Chat
//!
//! A client for a retrieval-augmented chat service: pick a collection of
//! scraped documents, ask questions about it, and read answers annotated
//! with numbered citations into the source documents.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!                 │        ChatSession           │
//!                 │ selection · conversation ·   │
//!                 │ pending · draft · scroll     │
//!                 └──┬─────────┬──────────┬──────┘
//!                    ▼         ▼          ▼
//!            ┌──────────┐ ┌─────────┐ ┌──────────┐
//!            │Directory │ │ History │ │   Ask    │
//!            │ client   │ │ client  │ │ pipeline │
//!            └────┬─────┘ └────┬────┘ └────┬─────┘
//!                 └────────────┼───────────┘
//!                              ▼
//!                      ┌──────────────┐
//!                      │ dyn Backend  │──▶ HTTP / in-memory
//!                      └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cchat serve stub                  # local stand-in for the service
//! cchat create rust "rust language" # start a collection
//! cchat ask rust "What is a crate?"
//! cchat chat rust                   # interactive session
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`session`] | Chat session controller |
//! | [`ask`] | Ask → save pipeline |
//! | [`history`] | History store client |
//! | [`directory`] | Collection directory client |
//! | [`citations`] | Citation rendering |
//! | [`render`] | Conversation view model |
//! | [`backend`] | Service abstraction, HTTP and in-memory backends |
//! | [`view_state`] | Durable scroll offsets |
//! | [`config`] | TOML configuration |
//! | [`server`] | Stub service over HTTP |

pub mod ask;
pub mod backend;
pub mod citations;
pub mod config;
pub mod directory;
pub mod error;
pub mod history;
pub mod models;
pub mod output;
pub mod render;
pub mod server;
pub mod session;
pub mod view_state;
