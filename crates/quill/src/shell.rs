// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interactive REPL with streamed replies and readline history.
//!
//! Plain input is sent as a chat message; the assistant reply streams to
//! stdout as fragments arrive. Slash commands manage sessions, config, and
//! theme. Ctrl+C during a reply cancels the turn and keeps the partial
//! text.

use std::io::Write as _;
use std::str::FromStr;

use colored::Colorize;
use quill_chat::{ChatEvent, ChatStore};
use quill_core::{ConfigPatch, QuillError, Role, Session, SessionId, Theme};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;

/// Runs the interactive shell until the user quits.
pub async fn run_shell(store: &ChatStore) -> Result<(), QuillError> {
    let mut rl = DefaultEditor::new()
        .map_err(|e| QuillError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "quill".bold().green());
    println!("Type {} for commands, {} to exit.\n", "/help".yellow(), "/quit".yellow());
    if !store.config().has_credential() {
        println!("{}", "No API key configured. Set one with: /config set api-key <key>".yellow());
    }

    let prompt = format!("{}> ", "quill".green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if let Some(command) = trimmed.strip_prefix('/') {
                    handle_command(store, command).await;
                } else if let Err(e) = stream_reply(store, trimmed).await {
                    eprintln!("{}: {}", "error".red(), e.user_message());
                    debug!(error = %e, "send failed");
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    println!("{}", "goodbye".dimmed());
    Ok(())
}

/// Sends one message and prints the reply as it streams.
///
/// The store publishes the full accumulated text with every delta, so the
/// printer tracks how many bytes it has already written and emits only the
/// suffix. Ctrl+C cancels the turn; the partial reply stays in the session.
async fn stream_reply(store: &ChatStore, input: &str) -> Result<(), QuillError> {
    let mut events = store.subscribe();
    let send = store.send(input, &[]);
    tokio::pin!(send);

    let mut printed = 0usize;
    let result = loop {
        tokio::select! {
            result = &mut send => break result,
            _ = tokio::signal::ctrl_c() => {
                store.cancel_current();
            }
            event = events.recv() => {
                if let Ok(ChatEvent::AssistantDelta { content, .. }) = event {
                    // Fragments only append, so the offset stays valid.
                    print!("{}", &content[printed.min(content.len())..]);
                    let _ = std::io::stdout().flush();
                    printed = content.len();
                }
            }
        }
    };

    // Catch deltas that raced the send completing.
    while let Ok(event) = events.try_recv() {
        if let ChatEvent::AssistantDelta { content, .. } = event {
            print!("{}", &content[printed.min(content.len())..]);
            printed = content.len();
        }
    }
    println!();
    result
}

async fn handle_command(store: &ChatStore, command: &str) {
    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name {
        "help" => print_help(),
        "new" => {
            let session = store.create_session();
            println!("created {}", session.title.cyan());
        }
        "list" => list_sessions(store),
        "select" => match resolve_session(store, rest) {
            Some(id) => {
                store.select_session(&id);
                print_history(store);
            }
            None => eprintln!("{}: unknown session {rest:?}", "error".red()),
        },
        "delete" => match resolve_session(store, rest) {
            Some(id) => {
                store.delete_session(&id);
                println!("deleted");
            }
            None => eprintln!("{}: unknown session {rest:?}", "error".red()),
        },
        "rename" => match store.current_session_id() {
            Some(id) if !rest.is_empty() => {
                store.rename_session(&id, rest);
                println!("renamed to {}", rest.cyan());
            }
            Some(_) => eprintln!("{}: usage: /rename <title>", "error".red()),
            None => eprintln!("{}: no current session", "error".red()),
        },
        "theme" => match rest {
            "" => println!("theme: {}", store.theme()),
            raw => match Theme::from_str(raw) {
                Ok(theme) => {
                    store.set_theme(theme);
                    println!("theme set to {theme}");
                }
                Err(_) => eprintln!("{}: themes are light, dark", "error".red()),
            },
        },
        "config" => handle_config(store, rest),
        "test" => {
            if store.test_connection().await {
                println!("{}", "connection ok".green());
            } else {
                eprintln!("{}", "connection failed".red());
            }
        }
        "reset" => {
            store.reset();
            println!("all sessions and settings cleared");
        }
        _ => eprintln!("{}: unknown command /{name}, try /help", "error".red()),
    }
}

fn handle_config(store: &ChatStore, rest: &str) {
    if rest.is_empty() {
        // ChatConfig's Debug impl redacts the API key.
        println!("{:#?}", store.config());
        return;
    }
    let Some(("set", assignment)) = rest.split_once(char::is_whitespace).map(|(a, b)| (a, b.trim()))
    else {
        eprintln!("{}: usage: /config [set <key> <value>]", "error".red());
        return;
    };
    let Some((key, value)) = assignment.split_once(char::is_whitespace).map(|(k, v)| (k, v.trim()))
    else {
        eprintln!("{}: usage: /config set <key> <value>", "error".red());
        return;
    };

    let mut patch = ConfigPatch::default();
    match key {
        "api-url" => patch.api_url = Some(value.to_string()),
        "api-key" => patch.api_key = Some(value.to_string()),
        "model" => patch.model = Some(value.to_string()),
        "temperature" => match value.parse() {
            Ok(t) => patch.temperature = Some(t),
            Err(_) => {
                eprintln!("{}: temperature must be a number in [0, 1]", "error".red());
                return;
            }
        },
        "max-tokens" => match value.parse() {
            Ok(n) => patch.max_tokens = Some(n),
            Err(_) => {
                eprintln!("{}: max-tokens must be a positive integer", "error".red());
                return;
            }
        },
        _ => {
            eprintln!(
                "{}: keys are api-url, api-key, model, temperature, max-tokens",
                "error".red()
            );
            return;
        }
    }
    store.update_config(patch);
    println!("config updated");
}

fn list_sessions(store: &ChatStore) {
    let sessions = store.sessions();
    if sessions.is_empty() {
        println!("no sessions yet, just start typing");
        return;
    }
    let current = store.current_session_id();
    for (index, session) in sessions.iter().enumerate() {
        let marker = if current.as_ref() == Some(&session.id) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {} {} {}",
            format!("[{}]", index + 1).dimmed(),
            session.title,
            format!("({} messages)", session.messages.len()).dimmed()
        );
    }
}

/// Accepts a 1-based index from `/list` or a full session id.
fn resolve_session(store: &ChatStore, raw: &str) -> Option<SessionId> {
    let sessions = store.sessions();
    if let Ok(index) = raw.parse::<usize>() {
        return sessions.get(index.checked_sub(1)?).map(|s| s.id.clone());
    }
    sessions
        .iter()
        .find(|s| s.id.0 == raw)
        .map(|s| s.id.clone())
}

fn print_history(store: &ChatStore) {
    let Some(session) = store.current_session() else {
        return;
    };
    print_session_header(&session);
    for message in &session.messages {
        match message.role {
            Role::User => println!("{} {}", ">".green(), message.content),
            Role::Assistant => println!("{}", message.content),
        }
    }
}

fn print_session_header(session: &Session) {
    println!("{}", format!("-- {} --", session.title).bold());
}

fn print_help() {
    println!("  /new               start a new session");
    println!("  /list              list sessions");
    println!("  /select <n>        switch to a session and show its history");
    println!("  /delete <n>        delete a session");
    println!("  /rename <title>    rename the current session");
    println!("  /config            show configuration");
    println!("  /config set k v    set api-url, api-key, model, temperature, max-tokens");
    println!("  /theme [light|dark]");
    println!("  /test              check the API connection");
    println!("  /reset             delete all sessions and settings");
    println!("  /quit              exit");
    println!("  Ctrl+C while a reply streams cancels it.");
}
