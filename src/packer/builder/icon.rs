//! Icon resource injection into the copied stub.

use crate::packer::error::{Error, Result};
use std::path::Path;
use std::process::Command;

/// Run `<tool> <exe> <icon>`. A non-zero exit is fatal.
pub fn embed_icon(tool: &Path, exe: &Path, icon: &Path) -> Result<()> {
    log::info!("Embedding icon {} into {}", icon.display(), exe.display());

    let status = Command::new(tool)
        .arg(exe)
        .arg(icon)
        .status()
        .map_err(|error| Error::CommandFailed {
            command: tool.display().to_string(),
            error,
        })?;

    if !status.success() {
        return Err(Error::ToolFailed {
            tool: tool.display().to_string(),
            status: status.to_string(),
        });
    }
    Ok(())
}
