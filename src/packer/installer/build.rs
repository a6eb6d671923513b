//! Installer compiler execution.

use crate::packer::error::{Error, Result};
use std::path::Path;

/// Run the Inno Setup compiler on `script`.
///
/// `/Q` is passed unless `verbose` so the compiler only reports errors.
pub async fn run_compiler(compiler: &Path, script: &Path, verbose: bool) -> Result<()> {
    log::info!("Running {}", compiler.display());

    let mut command = tokio::process::Command::new(compiler);
    if !verbose {
        command.arg("/Q");
    }
    command.arg(script);

    let status = command
        .status()
        .await
        .map_err(|e| Error::CommandFailed {
            command: compiler.display().to_string(),
            error: e,
        })?;

    check_exit_code(status.code())
}

/// Map the compiler's exit code to an error. `None` means the process was
/// terminated by a signal.
pub fn check_exit_code(code: Option<i32>) -> Result<()> {
    match code {
        Some(0) => Ok(()),
        Some(1) => Err(Error::InstallerInvalidArguments),
        Some(2) => Err(Error::InstallerCompilationFailed),
        Some(code) => Err(Error::InstallerToolFailed(format!("exit code {code}"))),
        None => Err(Error::InstallerToolFailed("terminated by signal".to_string())),
    }
}
