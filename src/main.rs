//! rubysfx - Ruby script packager.
//!
//! This binary turns a Ruby script into a self-extracting executable and
//! exits with status 1 and a single diagnostic on failure.

use rubysfx::cli::{self, OutputManager};
use std::process;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            let output = OutputManager::new(false, false);
            output.error(&e.to_string());
            for suggestion in e.recovery_suggestions() {
                eprintln!("  {}", suggestion);
            }
            1
        }
    };

    process::exit(exit_code);
}
