//! Application error types.
//!
//! Wraps library, CLI, I/O and report serialization errors so `main` can
//! print a single diagnostic.

use thiserror::Error;

/// Result type alias for application operations
pub type Result<T> = std::result::Result<T, PackerError>;

/// Main error type of the `rubysfx` binary
#[derive(Error, Debug)]
pub enum PackerError {
    /// CLI argument errors
    #[error("{0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Packaging errors
    #[error("{0}")]
    Packer(#[from] crate::packer::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl PackerError {
    /// Suggestions shown under the diagnostic, if any.
    pub fn recovery_suggestions(&self) -> Vec<String> {
        use crate::packer::Error;

        match self {
            PackerError::Packer(Error::MissingStubImage(_)) => vec![
                "Pass --stub/--stubw or set RUBYSFX_STUB to a prebuilt stub image".to_string(),
            ],
            PackerError::Packer(Error::Scan { .. }) => {
                vec!["Run the script with ruby directly to see why it fails to load".to_string()]
            }
            PackerError::Packer(Error::CommandFailed { .. }) => {
                vec!["Check that the external tool is installed and in PATH".to_string()]
            }
            _ => Vec::new(),
        }
    }
}
