//! Dependency discovery.
//!
//! The entry script is loaded once in a probe interpreter. Every feature it
//! loads is resolved against the interpreter's load path and then the
//! script's own directory. While the probe is parked, the native libraries
//! mapped into it are enumerated through the host's [`LibraryDetector`].
//! Nothing on disk is modified.
//!
//! # Module Organization
//!
//! - [`probe`] - Probe program and output parsing
//! - [`library`] - Detector trait and host selection
//! - [`proc_maps`] - `/proc/<pid>/maps` detector
//! - `modules` - Module enumeration detector (Windows only)

pub mod library;
#[cfg(windows)]
mod modules;
pub mod probe;
pub mod proc_maps;

pub use library::{LibraryDetector, host_detector};
pub use probe::{PROBE_SCRIPT, ProbeReport};

use crate::packer::{
    error::{Context, Error, Result},
    host::HostRuntime,
    path::PackPath,
    settings::{Settings, UnresolvedPolicy},
};
use path_absolutize::Absolutize;
use serde::Serialize;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Where a scanned file was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// An entry of the interpreter's load path.
    LoadPath,
    /// The entry script's directory.
    Application,
}

/// One loaded source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedFile {
    /// Name relative to the source root it was found in.
    pub logical: PackPath,
    /// Absolute path on the build host.
    pub path: PackPath,
    pub origin: Origin,
}

/// Everything a build needs to embed.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub entry_script: PathBuf,
    /// Source files, first loaded first, unique by logical name.
    pub files: Vec<ScannedFile>,
    /// Native libraries of the runtime resident in the probe.
    pub libraries: Vec<PackPath>,
    pub host: HostRuntime,
}

/// A source root in search order.
#[derive(Debug, Clone)]
struct SourceRoot {
    path: PackPath,
    origin: Origin,
}

/// Runs the probe and turns its report into a [`ScanResult`].
pub struct DependencyScanner {
    ruby: PathBuf,
    detector: Box<dyn LibraryDetector>,
    unresolved: UnresolvedPolicy,
}

impl DependencyScanner {
    pub fn new(
        ruby: impl Into<PathBuf>,
        detector: Box<dyn LibraryDetector>,
        unresolved: UnresolvedPolicy,
    ) -> Self {
        Self {
            ruby: ruby.into(),
            detector,
            unresolved,
        }
    }

    /// Scanner for `settings`, using the host's library detector.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            settings.ruby(),
            host_detector()?,
            settings.unresolved_policy(),
        ))
    }

    /// Load `script` with `args` in the probe and collect its dependencies.
    pub async fn scan(&self, script: &Path, args: &[String]) -> Result<ScanResult> {
        log::info!("Loading {} to check dependencies", script.display());

        let mut child = tokio::process::Command::new(&self.ruby)
            .arg("-e")
            .arg(PROBE_SCRIPT)
            .arg(script)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| Error::CommandFailed {
                command: self.ruby.display().to_string(),
                error,
            })?;

        let stdout = child.stdout.take().context("probe stdout was not captured")?;
        let mut reader = BufReader::new(stdout);
        let mut report = ProbeReport::default();
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            if report.accept(&String::from_utf8_lossy(&line))? {
                break;
            }
        }
        drop(reader);

        if !report.is_ready() {
            let status = child.wait().await?;
            return Err(Error::Scan {
                script: script.to_path_buf(),
                reason: format!("interpreter exited with {} before reporting", status),
            });
        }

        let host = HostRuntime::from_config(&report.config)?;
        log::debug!("Runtime exec prefix: {}", host.exec_prefix);

        let libraries = match child.id() {
            Some(pid) => self.detector.detect_dlls(pid, &host)?,
            None => {
                log::warn!("probe exited early, native libraries will not be detected");
                Vec::new()
            }
        };
        for lib in &libraries {
            log::debug!("native library {}", lib);
        }

        child.kill().await?;

        let script_dir = script.parent().unwrap_or_else(|| Path::new("."));
        let files = resolve_features(&report, script_dir, self.unresolved)?;
        log::info!(
            "Found {} source files and {} native libraries",
            files.len(),
            libraries.len()
        );

        Ok(ScanResult {
            entry_script: script.to_path_buf(),
            files,
            libraries,
            host,
        })
    }
}

fn source_roots(report: &ProbeReport, script_dir: &Path) -> Result<Vec<SourceRoot>> {
    let mut roots = Vec::new();
    for dir in &report.load_path {
        roots.push(SourceRoot {
            path: PackPath::from(Path::new(dir).absolutize()?.as_ref()),
            origin: Origin::LoadPath,
        });
    }
    roots.push(SourceRoot {
        path: PackPath::from(script_dir.absolutize()?.as_ref()),
        origin: Origin::Application,
    });
    Ok(roots)
}

/// Map each loaded feature to a (logical name, absolute path) pair.
///
/// Absolute features are named relative to the most specific root that
/// contains them; relative ones are searched root by root. Features that
/// match nothing go through `policy`.
pub fn resolve_features(
    report: &ProbeReport,
    script_dir: &Path,
    policy: UnresolvedPolicy,
) -> Result<Vec<ScannedFile>> {
    let roots = source_roots(report, script_dir)?;
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for feature in &report.features {
        let feature_path = PackPath::new(feature.as_str());
        let resolved = if feature_path.is_absolute() {
            if feature_path.is_file() {
                roots
                    .iter()
                    .filter(|root| feature_path.is_subpath_of(&root.path))
                    .max_by_key(|root| root.path.normalized().len())
                    .map(|root| ScannedFile {
                        logical: feature_path.relative_path_from(&root.path),
                        path: feature_path.clone(),
                        origin: root.origin,
                    })
            } else {
                None
            }
        } else {
            roots.iter().find_map(|root| {
                let candidate = root.path.join(&feature_path);
                candidate.is_file().then(|| ScannedFile {
                    logical: feature_path.clone(),
                    path: candidate,
                    origin: root.origin,
                })
            })
        };

        match resolved {
            Some(file) => {
                if seen.insert(file.logical.clone()) {
                    log::trace!("{} -> {}", file.logical, file.path);
                    files.push(file);
                }
            }
            None => policy.on_unresolved(feature)?,
        }
    }
    Ok(files)
}
