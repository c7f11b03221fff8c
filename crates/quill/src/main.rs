// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quill - a multi-session streaming chat client.
//!
//! Binary entry point: resolves the data directory, restores persisted
//! state, and hands control to the interactive shell.

mod shell;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use quill_chat::ChatStore;
use quill_store::FileStore;
use tracing_subscriber::EnvFilter;

/// Quill - a multi-session streaming chat client.
#[derive(Parser, Debug)]
#[command(name = "quill", version, about, long_about = None)]
struct Cli {
    /// Directory for persisted sessions and configuration.
    /// Defaults to the platform data dir (e.g. ~/.local/share/quill).
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quill")
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so they never interleave with streamed replies.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);

    let file_store = match FileStore::open(&data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("quill: cannot open data dir {}: {e}", data_dir.display());
            std::process::exit(1);
        }
    };

    let store = ChatStore::open(file_store);
    let result = shell::run_shell(&store).await;
    store.shutdown();

    if let Err(e) = result {
        eprintln!("quill: {e}");
        std::process::exit(1);
    }
}
