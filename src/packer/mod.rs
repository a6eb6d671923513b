//! Ruby script packager.
//!
//! Turns a Ruby entry script into a single self-extracting executable that
//! carries the interpreter, its native libraries and every source file the
//! script loads. The packager runs the script once in a probe interpreter,
//! lays the dependency closure out as an install tree and appends it to a
//! prebuilt stub image as an opcode stream.
//!
//! # Module Organization
//!
//! - [`builder`] - [`Packager`] orchestration and the [`InstallBuilder`](builder::InstallBuilder) variants
//! - [`error`] - Library error type
//! - [`host`] - Interpreter installation facts
//! - [`installer`] - Inno Setup export
//! - [`layout`] - Install tree planning
//! - [`opcode`] - Wire format, stream and trailer
//! - [`path`] - Portable path model
//! - [`scanner`] - Dependency discovery
//! - [`settings`] - Immutable build configuration

pub mod builder;
pub mod error;
pub mod host;
pub mod installer;
pub mod layout;
pub mod opcode;
pub mod path;
pub mod scanner;
pub mod settings;

pub use builder::Packager;
pub use error::{Error, Result};
pub use path::PackPath;
pub use settings::{
    DuplicatePolicy, OutputMode, PostCommand, Settings, SettingsBuilder, UnresolvedPolicy,
};

use serde::Serialize;
use std::path::PathBuf;

/// Outcome of one packaging run, also written as the JSON build report.
#[derive(Debug, Clone, Serialize)]
pub struct PackagedArtifact {
    /// Output mode name (`executable`, `installer` or `dry-run`).
    pub mode: &'static str,
    /// Written artifact. `None` for dry runs and installer exports, whose
    /// setup program location is decided by the installer template.
    pub path: Option<PathBuf>,
    pub size: u64,
    /// SHA-256 of the written artifact.
    pub checksum: Option<String>,
    /// Opcodes appended, prelude included. For dry runs, requests issued.
    pub opcodes: usize,
    /// Install targets in request order.
    pub files: Vec<PackPath>,
    /// Native libraries detected in the probe.
    pub libraries: Vec<PackPath>,
}
