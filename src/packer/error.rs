//! Error types for packer operations.
//!
//! Provides contextual error chaining, filesystem-specific errors with path
//! context, and the distinct failure kinds of a build (scan failures, missing
//! stub images, external tool failures, artifact format errors).
//!
//! # Features
//!
//! - **Context trait**: Add context to errors similar to anyhow
//! - **ErrorExt trait**: Filesystem operations with automatic path context
//! - **bail! macro**: Early return with formatted error messages

use std::{
    fmt::Display,
    io, num,
    path::PathBuf,
};
use thiserror::Error as DeriveError;

/// Errors returned by the packer.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error with path context.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "reading stub image")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// An external program could not be launched.
    #[error("failed to run command {command}: {error}")]
    CommandFailed {
        /// Command that failed to execute
        command: String,
        /// The underlying error
        error: io::Error,
    },

    /// An external program (codec, icon tool) ran but reported failure.
    #[error("{tool} exited with {status}")]
    ToolFailed {
        /// Tool name or path
        tool: String,
        /// Exit status description
        status: String,
    },

    /// The entry script failed to load during dependency discovery.
    #[error("failed to load {script} while scanning dependencies: {reason}")]
    Scan {
        /// Entry script path
        script: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// The prebuilt stub executable is not available.
    #[error("stub image not available at {0}")]
    MissingStubImage(PathBuf),

    /// A loaded file or library could not be mapped to a source path.
    #[error("unresolved dependency: {0}")]
    UnresolvedDependency(String),

    /// A second file request for an already written target.
    #[error("duplicate target path: {0}")]
    DuplicateTarget(String),

    /// An opcode operation was attempted in the wrong stream phase.
    #[error("opcode stream is {actual}, expected {expected}")]
    InvalidPhase {
        /// Phase the operation requires
        expected: &'static str,
        /// Phase the stream is in
        actual: &'static str,
    },

    /// A string field contains a NUL byte and cannot be encoded.
    #[error("{field} contains an interior NUL byte")]
    InteriorNul {
        /// Name of the offending field
        field: &'static str,
    },

    /// The artifact does not end with the expected signature.
    #[error("invalid artifact signature: {0:02x?}")]
    InvalidSignature([u8; 4]),

    /// Unknown opcode tag while reading an artifact.
    #[error("invalid opcode tag {0}")]
    InvalidOpcode(u32),

    /// The artifact ended in the middle of a structure.
    #[error("artifact truncated while reading {0}")]
    Truncated(&'static str),

    /// The installer compiler rejected its command line (exit code 1).
    #[error("installer compiler reports invalid command line parameters")]
    InstallerInvalidArguments,

    /// The installer compiler failed to compile the script (exit code 2).
    #[error("installer compiler reports that compilation failed")]
    InstallerCompilationFailed,

    /// The installer compiler terminated abnormally.
    #[error("installer compiler failed to run ({0}); is it installed and in PATH?")]
    InstallerToolFailed(String),

    /// Generic I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Number conversion error (e.g., payload lengths beyond u32).
    #[error("{0}")]
    ConvertError(#[from] num::TryFromIntError),

    /// Handlebars template rendering error.
    #[error("{0}")]
    HandleBarsError(#[from] handlebars::RenderError),

    /// Handlebars template parsing error.
    #[error("{0}")]
    Template(#[from] handlebars::TemplateError),

    /// Invalid glob pattern.
    #[error("{0}")]
    GlobPattern(#[from] glob::PatternError),

    /// Glob execution error.
    #[error("{0}")]
    Glob(#[from] glob::GlobError),

    /// Regular expression error.
    #[error("{0}")]
    RegexError(#[from] regex::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),
}

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for adding context to errors.
///
/// Similar to `anyhow::Context` but integrated with the packer's Error type.
/// Works with both `Result<T, E>` and `Option<T>`.
pub trait Context<T> {
    /// Add context to an error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Add context to an error using a closure (lazy evaluation).
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Extension trait for filesystem operations with automatic path context.
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase describing the operation,
    /// e.g., "reading file", "creating directory", "copying stub image".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Macro for early return with error.
///
/// Converts the message into a [`Error::GenericError`] and returns immediately.
///
/// ```ignore
/// bail!("operation failed");
/// bail!("invalid value: {}", value);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::packer::error::Error::GenericError($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::packer::error::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::packer::error::Error::GenericError(format!($fmt, $($arg)*)))
    };
}
