//! Command line interface for rubysfx.
//!
//! Parses arguments, initializes logging, runs the packager and reports the
//! outcome to the user.

mod args;
mod output;

pub use args::{Args, RuntimeConfig};
pub use output::OutputManager;

use crate::error::{CliError, Result};
use crate::packer::{PackagedArtifact, Packager};
use clap::{Parser, error::ErrorKind};

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            return Ok(0);
        }
        Err(e) => {
            return Err(CliError::InvalidArguments {
                reason: e.to_string().trim_end().to_string(),
            }
            .into());
        }
    };

    init_logging(&args);
    run_with(args).await
}

/// Run the packager for already parsed arguments
pub async fn run_with(args: Args) -> Result<i32> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let config = RuntimeConfig::from(&args);
    let settings = args.to_settings()?;

    config.progress(&format!(
        "Packaging {} ({})",
        settings.entry_script().display(),
        settings.mode().name()
    ))?;

    let report_path = settings.report().map(|p| p.to_path_buf());
    let artifact = Packager::new(settings).package().await?;

    print_summary(&config, &artifact)?;

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&artifact)?;
        tokio::fs::write(&path, json).await?;
        config.verbose_println(&format!("Wrote build report {}", path.display()))?;
    }

    Ok(0)
}

fn print_summary(config: &RuntimeConfig, artifact: &PackagedArtifact) -> std::io::Result<()> {
    match &artifact.path {
        Some(path) => config.success(&format!(
            "Created {} ({} bytes)",
            path.display(),
            artifact.size
        ))?,
        None => config.success(&format!(
            "Finished {} with {} files",
            artifact.mode,
            artifact.files.len()
        ))?,
    }
    if let Some(checksum) = &artifact.checksum {
        config.indent(&format!("sha256 {checksum}"))?;
    }
    for file in &artifact.files {
        config.verbose_println(&file.to_string())?;
    }
    Ok(())
}

/// Initialize `env_logger`. `RUST_LOG` wins over the verbosity flags.
pub fn init_logging(args: &Args) {
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .try_init();
}
