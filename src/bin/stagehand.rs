//! Stagehand command-line runner
//!
//! Runs, checks and compiles scripts, and saves or continues suspended processes.

use stagehand::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
