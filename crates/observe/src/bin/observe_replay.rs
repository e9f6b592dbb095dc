//! `observe-replay` — replay a mutation script against an observed document.
//!
//! Usage:
//!   observe-replay < script.json
//!
//! Prints one JSON line per change notification, then the final state.
//! Operations that fail are reported on stderr. Set `RUST_LOG=debug` for
//! engine logs.

use std::io::{self, Read, Write};

use deep_observe::replay::run_str;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let outcome = match run_str(&buf) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    for failure in &outcome.failures {
        eprintln!("op {}: {}", failure.op, failure.error);
    }

    let mut out = String::new();
    for change in &outcome.changes {
        match serde_json::to_string(change) {
            Ok(line) => {
                out.push_str(&line);
                out.push('\n');
            }
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
    }
    match serde_json::to_string_pretty(&outcome.state) {
        Ok(state) => {
            out.push_str(&state);
            out.push('\n');
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
    if let Err(e) = io::stdout().write_all(out.as_bytes()) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
