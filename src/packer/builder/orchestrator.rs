//! Main packaging orchestration.
//!
//! This module provides the [`Packager`] orchestrator that scans the entry
//! script and drives the builder selected by the output mode.

use crate::{
    bail,
    packer::{
        Error, OutputMode, PackagedArtifact, Result, Settings,
        error::ErrorExt,
        installer::{InstallerExporter, InstallerOptions},
        layout,
        opcode::Trailer,
        scanner::{DependencyScanner, ScanResult},
    },
};

use super::{
    AssemblyOptions, DryRun, ExecutableAssembler, checksum::calculate_sha256,
};

/// Main packaging orchestrator.
///
/// Owns the immutable [`Settings`] of one build. A build is a dependency scan
/// followed by one layout pass against the builder that matches
/// [`Settings::mode()`]:
///
/// - **Executable**: stub image with appended opcodes and trailer
/// - **Installer**: Inno Setup script compiled by the installer compiler
/// - **DryRun**: requests are logged and nothing is written
///
/// # Examples
///
/// ```no_run
/// use rubysfx::packer::{Packager, Settings};
///
/// # async fn example(settings: Settings) -> rubysfx::packer::Result<()> {
/// let artifact = Packager::new(settings).package().await?;
/// println!("{} targets", artifact.files.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Packager {
    settings: Settings,
}

impl Packager {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Scan the entry script and produce the configured output.
    ///
    /// The stub image is checked first so that a misconfigured build fails
    /// before the probe interpreter runs. Any error leaves the destination
    /// without a valid trailer.
    pub async fn package(&self) -> Result<PackagedArtifact> {
        let settings = &self.settings;

        if !matches!(settings.mode(), OutputMode::DryRun) && !settings.stub_image().is_file() {
            return Err(Error::MissingStubImage(settings.stub_image().to_path_buf()));
        }

        let scanner = DependencyScanner::from_settings(settings)?;
        let scan = scanner
            .scan(settings.entry_script(), settings.script_args())
            .await?;

        let artifact = match settings.mode() {
            OutputMode::Executable => self.assemble(&scan).await?,
            OutputMode::Installer { .. } => self.export_installer(&scan).await?,
            OutputMode::DryRun => self.dry_run(&scan)?,
        };

        Ok(artifact)
    }

    async fn assemble(&self, scan: &ScanResult) -> Result<PackagedArtifact> {
        let settings = &self.settings;
        let mut assembler = ExecutableAssembler::create(AssemblyOptions::from_settings(settings)?)?;
        let summary = layout::apply(settings, scan, &mut assembler)?;
        let executable = assembler.finish()?;

        let mut file = std::fs::File::open(&executable.path)
            .fs_context("verifying executable", &executable.path)?;
        let trailer = Trailer::read_from(&mut file)?;
        if trailer.opcode_offset != executable.opcode_offset {
            bail!(
                "trailer of {} points at {}, expected {}",
                executable.path.display(),
                trailer.opcode_offset,
                executable.opcode_offset
            );
        }

        let checksum = calculate_sha256(&executable.path).await?;
        log::info!(
            "Created {} ({} bytes, sha256 {})",
            executable.path.display(),
            executable.size,
            checksum
        );

        Ok(PackagedArtifact {
            mode: settings.mode().name(),
            path: Some(executable.path),
            size: executable.size,
            checksum: Some(checksum),
            opcodes: executable.opcodes,
            files: summary.files,
            libraries: scan.libraries.clone(),
        })
    }

    async fn export_installer(&self, scan: &ScanResult) -> Result<PackagedArtifact> {
        let settings = &self.settings;
        let mut exporter = InstallerExporter::create(InstallerOptions::from_settings(settings)?)?;
        let summary = layout::apply(settings, scan, &mut exporter)?;
        let output = exporter.finish().await?;
        log::info!(
            "Compiled installer with {} directories and {} files",
            output.directories,
            output.files
        );

        Ok(PackagedArtifact {
            mode: settings.mode().name(),
            path: None,
            size: 0,
            checksum: None,
            opcodes: 0,
            files: summary.files,
            libraries: scan.libraries.clone(),
        })
    }

    fn dry_run(&self, scan: &ScanResult) -> Result<PackagedArtifact> {
        let settings = &self.settings;
        let mut dry_run = DryRun::new();
        let summary = layout::apply(settings, scan, &mut dry_run)?;

        Ok(PackagedArtifact {
            mode: settings.mode().name(),
            path: None,
            size: 0,
            checksum: None,
            opcodes: dry_run.requests().len(),
            files: summary.files,
            libraries: scan.libraries.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::SettingsBuilder;

    #[tokio::test]
    async fn test_missing_stub_fails_before_scan() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hello.rb");
        std::fs::write(&script, "puts 1\n").unwrap();

        let settings = SettingsBuilder::new()
            .entry_script(&script)
            .stub_image(dir.path().join("missing-stub.exe"))
            .compression(false)
            .ruby(dir.path().join("no-such-ruby"))
            .build()
            .unwrap();

        let err = Packager::new(settings).package().await.unwrap_err();
        assert!(matches!(err, Error::MissingStubImage(_)));
        assert!(!dir.path().join("hello.exe").exists());
    }
}
