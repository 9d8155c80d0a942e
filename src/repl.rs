//! Interactive chat loop for `cchat chat`.
//!
//! Plain lines are questions for the selected collection; lines starting
//! with `/` are commands. Opening a collection prints the messages after the
//! reading position recorded last time, and every printed tail moves that
//! position to the end.

use anyhow::Result;
use std::io::Write;

use collection_chat::output;
use collection_chat::session::ChatSession;

use crate::{report_ask, report_delete, StdinConfirm};

const HELP: &str = "\
Commands:
  /list           list collections
  /use <name>     open a collection
  /history        show the whole conversation
  /delete <name>  delete a collection
  /help           show this help
  /quit           leave
Any other line is asked in the open collection.";

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Quit,
    Help,
    List,
    History,
    Use(&'a str),
    Delete(&'a str),
    Unknown(&'a str),
    Question(&'a str),
}

fn parse(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Question(line);
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match (name, arg) {
        ("quit" | "exit" | "q", _) => Input::Quit,
        ("help" | "?", _) => Input::Help,
        ("list", _) => Input::List,
        ("history", _) => Input::History,
        ("use", arg) if !arg.is_empty() => Input::Use(arg),
        ("delete", arg) if !arg.is_empty() => Input::Delete(arg),
        _ => Input::Unknown(line),
    }
}

/// One line from stdin without its line ending, `None` at end of input.
pub(crate) fn read_line() -> std::io::Result<Option<String>> {
    let mut buf = String::new();
    if std::io::stdin().read_line(&mut buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(buf.trim_end_matches(['\r', '\n']).to_string()))
}

pub(crate) async fn run(session: &ChatSession, initial: Option<&str>) -> Result<()> {
    let offset = session.mount(initial).await;
    println!(
        "{}",
        output::format_collections(&session.collections(), &session.selected())
    );
    if !session.selected().is_empty() {
        show_unread(session, offset);
    }
    println!("Type /help for commands.");

    loop {
        let selected = session.selected();
        print!("{}> ", if selected.is_empty() { "-" } else { &selected });
        std::io::stdout().flush()?;

        let Some(line) = read_line()? else {
            println!();
            break;
        };

        match parse(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => println!("{}", HELP),
            Input::Unknown(line) => println!("Unknown command: {} (try /help)", line),
            Input::List => {
                session.refresh_collections().await;
                println!(
                    "{}",
                    output::format_collections(&session.collections(), &session.selected())
                );
            }
            Input::History => {
                let rendered = session.render();
                println!("{}", output::format_human(&session.selected(), &rendered));
                remember_end(session);
            }
            Input::Use(name) => {
                session.select_collection(name).await;
                let offset = session.restore_scroll();
                show_unread(session, offset);
            }
            Input::Delete(name) => {
                let outcome = session.delete_collection(name, &StdinConfirm).await;
                report_delete(name, &outcome);
            }
            Input::Question(question) => {
                let before = session.messages().len();
                match session.ask(question).await {
                    Ok(outcome) => {
                        report_ask(&outcome);
                        print_from(session, before);
                    }
                    Err(e) => println!("{}", e),
                }
            }
        }
    }
    Ok(())
}

/// Print the conversation after the recorded reading position.
fn show_unread(session: &ChatSession, offset: Option<u32>) {
    let rendered = session.render();
    let from = offset.map_or(0, |o| o as usize).min(rendered.len());
    if from > 0 {
        println!("({} earlier messages, /history shows them)", from);
    }
    if from == rendered.len() && from > 0 {
        println!("Nothing new.");
    } else {
        println!("{}", output::format_human(&session.selected(), &rendered[from..]));
    }
    remember_end(session);
}

/// Print the messages from index `from` on, e.g. the exchange an ask added.
pub(crate) fn print_from(session: &ChatSession, from: usize) {
    if !session.take_scroll_request() {
        return;
    }
    let rendered = session.render();
    for message in rendered.iter().skip(from) {
        println!("{}", output::format_message(message));
    }
    remember_end(session);
}

fn remember_end(session: &ChatSession) {
    session.take_scroll_request();
    if session.selected().is_empty() {
        return;
    }
    let end = u32::try_from(session.messages().len()).unwrap_or(u32::MAX);
    session.record_scroll(end);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_questions() {
        assert_eq!(parse("  What is X?  "), Input::Question("What is X?"));
        assert_eq!(parse("   "), Input::Empty);
    }

    #[test]
    fn commands_take_trimmed_arguments() {
        assert_eq!(parse("/use  alpha "), Input::Use("alpha"));
        assert_eq!(parse("/delete beta"), Input::Delete("beta"));
        assert_eq!(parse("/quit"), Input::Quit);
        assert_eq!(parse("/list"), Input::List);
    }

    #[test]
    fn commands_missing_arguments_are_unknown() {
        assert_eq!(parse("/use"), Input::Unknown("/use"));
        assert_eq!(parse("/frobnicate x"), Input::Unknown("/frobnicate x"));
    }
}
