//! External LZMA codec.
//!
//! The codec is invoked as `codec e <in> <out>` on two fixed-name files in
//! the working directory. Both files are removed once the codec has run,
//! whether it succeeded or not.

use crate::packer::error::{Error, ErrorExt, Result};
use std::path::PathBuf;
use std::process::Command;

/// Interchange file handed to the codec.
pub const CODEC_INPUT: &str = "rubysfx-codec.in";
/// File the codec writes its output to.
pub const CODEC_OUTPUT: &str = "rubysfx-codec.out";

/// Compresses one buffer at a time through an external program.
#[derive(Debug, Clone)]
pub struct ExternalCodec {
    program: PathBuf,
    work_dir: PathBuf,
}

impl ExternalCodec {
    pub fn new(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Compress `data` as one unit.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let input = self.work_dir.join(CODEC_INPUT);
        let output = self.work_dir.join(CODEC_OUTPUT);
        let _cleanup = InterchangeFiles([input.clone(), output.clone()]);

        std::fs::write(&input, data).fs_context("writing codec input", &input)?;

        log::debug!(
            "Running {} e {} {}",
            self.program.display(),
            input.display(),
            output.display()
        );
        let result = Command::new(&self.program)
            .arg("e")
            .arg(&input)
            .arg(&output)
            .output()
            .map_err(|error| Error::CommandFailed {
                command: self.program.display().to_string(),
                error,
            })?;

        if !result.status.success() {
            log::debug!(
                "codec stderr: {}",
                String::from_utf8_lossy(&result.stderr).trim()
            );
            return Err(Error::ToolFailed {
                tool: self.program.display().to_string(),
                status: result.status.to_string(),
            });
        }

        let compressed = std::fs::read(&output).fs_context("reading codec output", &output)?;
        log::info!(
            "Compressed {} bytes to {} bytes",
            data.len(),
            compressed.len()
        );
        Ok(compressed)
    }
}

/// Removes the interchange files when dropped.
struct InterchangeFiles([PathBuf; 2]);

impl Drop for InterchangeFiles {
    fn drop(&mut self) {
        for path in &self.0 {
            if let Err(e) = std::fs::remove_file(path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                log::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_identity_codec_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "codec", "cp \"$2\" \"$3\"");
        let codec = ExternalCodec::new(program, dir.path());

        assert_eq!(codec.compress(b"opcodes").unwrap(), b"opcodes");
        assert!(!dir.path().join(CODEC_INPUT).exists());
        assert!(!dir.path().join(CODEC_OUTPUT).exists());
    }

    #[test]
    fn test_failing_codec_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "codec", "exit 3");
        let codec = ExternalCodec::new(program, dir.path());

        assert!(matches!(
            codec.compress(b"opcodes"),
            Err(Error::ToolFailed { .. })
        ));
        assert!(!dir.path().join(CODEC_INPUT).exists());
    }

    #[test]
    fn test_missing_codec_is_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let codec = ExternalCodec::new(dir.path().join("no-such-codec"), dir.path());
        assert!(matches!(
            codec.compress(b""),
            Err(Error::CommandFailed { .. })
        ));
    }
}
