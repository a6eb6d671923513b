//! Build orchestration and the builder interface.
//!
//! The layout planner describes an install tree as a sequence of requests
//! against [`InstallBuilder`]. Three variants consume them, selected by
//! [`OutputMode`](crate::packer::OutputMode):
//!
//! - [`ExecutableAssembler`] - stub image plus opcode stream and trailer
//! - [`InstallerExporter`](crate::packer::installer::InstallerExporter) - Inno Setup script
//! - [`DryRun`] - logs every request, writes nothing
//!
//! # Example
//!
//! ```no_run
//! use rubysfx::packer::{Packager, SettingsBuilder};
//!
//! # async fn example() -> rubysfx::packer::Result<()> {
//! let settings = SettingsBuilder::new()
//!     .entry_script("app/main.rb")
//!     .build()?;
//!
//! let artifact = Packager::new(settings).package().await?;
//! if let Some(path) = &artifact.path {
//!     println!("Created: {} ({} bytes)", path.display(), artifact.size);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`assembler`] - Executable assembly
//! - [`checksum`] - SHA256 checksum calculation for artifacts
//! - [`codec`] - External compression pass
//! - [`dry_run`] - Logging builder
//! - [`icon`] - Icon resource injection
//! - [`orchestrator`] - Main [`Packager`] struct
//! - [`tool_detection`] - External tool discovery

pub mod assembler;
pub mod checksum;
pub mod codec;
pub mod dry_run;
pub mod icon;
mod orchestrator;
pub mod tool_detection;

pub use assembler::{AssembledExecutable, AssemblyOptions, ExecutableAssembler};
pub use codec::ExternalCodec;
pub use dry_run::DryRun;
pub use orchestrator::Packager;

use crate::packer::{Result, path::PackPath};

/// Sink for the requests that describe an install tree.
///
/// Target paths are relative to the install directory. Directory and file
/// requests are idempotent: repeating a directory is a no-op and a repeated
/// file target keeps the first source.
pub trait InstallBuilder {
    fn create_directory(&mut self, path: &PackPath) -> Result<()>;

    /// Install the host file `source` as `target`. Returns `false` when the
    /// target was already taken and the request was dropped.
    fn create_file(&mut self, source: &PackPath, target: &PackPath) -> Result<bool>;

    /// Program the stub runs once extraction is complete. `cmdline` may
    /// contain the install-directory marker byte.
    fn create_process(&mut self, image: &PackPath, cmdline: &[u8]) -> Result<()>;

    /// Program the stub runs after the main process exits.
    fn post_create_process(&mut self, image: &PackPath, cmdline: &[u8]) -> Result<()>;

    fn set_env(&mut self, name: &str, value: &str) -> Result<()>;
}
