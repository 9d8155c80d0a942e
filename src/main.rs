//! # Collection Chat CLI (`cchat`)
//!
//! Terminal front-end for the chat session controller: list, create and
//! delete collections, ask questions, and hold an interactive conversation
//! with cited answers.
//!
//! ## Usage
//!
//! ```bash
//! cchat --config ./config/cchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cchat list` | List known collections |
//! | `cchat create <name> <subject>` | Scrape `subject` into a new collection |
//! | `cchat history <collection>` | Print a collection's conversation |
//! | `cchat ask <collection> "<question>"` | Ask once and print the answer |
//! | `cchat chat [collection]` | Interactive session |
//! | `cchat delete <collection>` | Delete a collection (asks first) |
//! | `cchat serve stub` | Run the in-memory stub service |

mod repl;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use collection_chat::ask::AskOutcome;
use collection_chat::backend::{Backend, HttpBackend, MemoryBackend};
use collection_chat::config::{self, Config};
use collection_chat::directory::{Confirm, DirectoryClient};
use collection_chat::error::ClientError;
use collection_chat::output;
use collection_chat::server;
use collection_chat::session::{ChatSession, DeleteOutcome};
use collection_chat::view_state::JsonFileViewState;

/// Collection Chat: ask questions about scraped document collections and
/// get answers with citations.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without one, the service is expected at `http://127.0.0.1:5000`
/// (or `$CCHAT_BACKEND_URL`).
#[derive(Parser)]
#[command(name = "cchat", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cchat.toml")]
    config: PathBuf,

    /// Log progress at info level (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List known collections.
    List,

    /// Create a collection by scraping documents about a subject.
    ///
    /// Prints the keyword of the collection, which may already have existed.
    Create {
        /// Collection name (becomes its keyword).
        name: String,
        /// Search term the service scrapes documents for.
        subject: String,
    },

    /// Print the conversation of a collection.
    History {
        collection: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ask a single question and print the new exchange.
    Ask {
        collection: String,
        question: String,

        /// Output the whole conversation as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive chat session.
    ///
    /// Lines are questions; `/help` lists the commands.
    Chat {
        /// Collection to open first.
        collection: Option<String>,
    },

    /// Delete a collection and its history.
    Delete {
        collection: String,

        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },

    /// Run a local server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// Serve the chat endpoints from memory on `[server].bind`.
    ///
    /// Nothing is persisted and answers are placeholders; intended for
    /// front-end development.
    Stub,
}

/// Confirmation read from the terminal. Anything but `y`/`yes` declines.
pub(crate) struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        let _ = std::io::stdout().flush();
        match repl::read_line() {
            Ok(Some(answer)) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_or_default(&cli.config)?;

    if let Commands::Serve {
        service: ServeService::Stub,
    } = cli.command
    {
        server::run_stub_server(&cfg, Arc::new(MemoryBackend::new())).await?;
        return Ok(());
    }

    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&cfg.backend)?);

    match cli.command {
        Commands::List => {
            let session = open_session(&cfg, backend);
            session.refresh_collections().await;
            println!("{}", output::format_collections(&session.collections(), ""));
        }
        Commands::Create { name, subject } => {
            let directory = DirectoryClient::new(backend);
            match directory.create_collection(&name, &subject).await {
                Ok(keyword) => println!("{}", keyword),
                Err(ClientError::Backend(message)) => {
                    bail!("Failed to scrape the collection: {}", message)
                }
                Err(e) => bail!("{}", e),
            }
        }
        Commands::History { collection, json } => {
            let session = open_session(&cfg, backend);
            session.mount(Some(&collection)).await;
            print_conversation(&session, json);
        }
        Commands::Ask {
            collection,
            question,
            json,
        } => {
            let session = open_session(&cfg, backend);
            session.mount(Some(&collection)).await;
            let before = session.messages().len();
            let outcome = session.ask(&question).await?;
            report_ask(&outcome);
            if json {
                print_conversation(&session, true);
            } else {
                repl::print_from(&session, before);
            }
        }
        Commands::Chat { collection } => {
            let session = open_session(&cfg, backend);
            repl::run(&session, collection.as_deref()).await?;
        }
        Commands::Delete { collection, yes } => {
            let session = open_session(&cfg, backend);
            let outcome = if yes {
                session.delete_collection(&collection, &true).await
            } else {
                session.delete_collection(&collection, &StdinConfirm).await
            };
            report_delete(&collection, &outcome);
            if let DeleteOutcome::Rejected(message) = outcome {
                bail!("Failed to delete '{}': {}", collection, message);
            }
        }
        Commands::Serve { .. } => unreachable!("handled before connecting"),
    }

    Ok(())
}

fn open_session(cfg: &Config, backend: Arc<dyn Backend>) -> ChatSession {
    let view_state = Arc::new(JsonFileViewState::open(cfg.state.resolved_path()));
    ChatSession::new(backend, view_state)
}

fn print_conversation(session: &ChatSession, json: bool) {
    let selected = session.selected();
    let rendered = session.render();
    if json {
        println!("{}", output::format_json(&selected, &rendered));
    } else {
        println!("{}", output::format_human(&selected, &rendered));
    }
}

/// Tell the user about asks that did not end in a saved answer.
pub(crate) fn report_ask(outcome: &AskOutcome) {
    match outcome {
        AskOutcome::Answered(_) => {}
        AskOutcome::Unsaved { exchange, error } => {
            eprintln!("Warning: the answer could not be saved ({}):", error);
            println!("{}", exchange.answer);
        }
        AskOutcome::Rejected(message) => eprintln!("No answer: {}", message),
        AskOutcome::Failed(error) => eprintln!("Request failed: {}", error),
    }
}

pub(crate) fn report_delete(collection: &str, outcome: &DeleteOutcome) {
    match outcome {
        DeleteOutcome::Deleted => println!("Deleted '{}'.", collection),
        DeleteOutcome::Cancelled => println!("Cancelled."),
        DeleteOutcome::AlreadyInProgress => println!("'{}' is already being deleted.", collection),
        DeleteOutcome::Rejected(message) => eprintln!("Error: {}", message),
        DeleteOutcome::Failed(_) => eprintln!("Could not reach the service; '{}' was not deleted.", collection),
    }
}
