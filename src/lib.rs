//! Ruby script packager library
//!
//! Packages a Ruby entry script, the interpreter and the files the script
//! loads into a single self-extracting executable, or into an Inno Setup
//! installer.
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod error;
pub mod packer;

// Re-export commonly used types
pub use error::{CliError, PackerError, Result};
