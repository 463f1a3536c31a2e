//! Keel command-line host
//!
//! Loads a program and dispatches requests or runs its jobs without an
//! embedding application. Useful for trying programs out and for debugging.

use keel_core::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
