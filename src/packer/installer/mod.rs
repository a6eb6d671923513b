//! Inno Setup installer export.
//!
//! In installer mode directory and file requests are not embedded. They are
//! collected into `[Dirs]` and `[Files]` sections appended to a user
//! template, and the installer compiler turns the script into a setup
//! program. Process and environment requests still go into a small stub
//! artifact that the installer ships next to the application files.
//!
//! # Module Organization
//!
//! - [`build`] - Compiler execution and exit code mapping
//! - [`script`] - Script rendering
//! - [`utils`] - Quoting and BOM-prefixed writing

pub mod build;
pub mod script;
pub mod utils;

pub use script::InstallerFile;

use crate::packer::{
    Result,
    builder::{AssemblyOptions, ExecutableAssembler, InstallBuilder},
    error::{Context, ErrorExt},
    path::PackPath,
    settings::{DuplicatePolicy, OutputMode, Settings},
};
use path_absolutize::Absolutize;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

/// Staging directory for the temporary artifact, inside the work dir.
pub const STAGING_DIR: &str = ".rubysfx-installer";
/// Generated script, inside the work dir.
pub const SCRIPT_NAME: &str = "rubysfx-installer.iss";

/// Inputs of one installer export.
#[derive(Debug, Clone)]
pub struct InstallerOptions {
    pub template: PathBuf,
    pub compiler: PathBuf,
    pub work_dir: PathBuf,
    /// File name of the stub artifact inside the installer.
    pub artifact_name: String,
    pub stub_image: PathBuf,
    pub debug: bool,
    pub verbose: bool,
    pub duplicate_policy: DuplicatePolicy,
}

impl InstallerOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let OutputMode::Installer { template, compiler } = settings.mode() else {
            crate::bail!("installer export requires installer mode");
        };
        let artifact_name = settings
            .output()
            .file_name()
            .context("output path has no file name")?
            .to_string_lossy()
            .into_owned();

        Ok(Self {
            template: template.clone(),
            compiler: compiler.clone(),
            work_dir: settings.work_dir().to_path_buf(),
            artifact_name,
            stub_image: settings.stub_image().to_path_buf(),
            debug: settings.debug(),
            verbose: settings.verbose(),
            duplicate_policy: settings.duplicate_policy(),
        })
    }
}

/// Summary of a compiled installer.
#[derive(Debug, Clone)]
pub struct InstallerOutput {
    pub script: PathBuf,
    pub directories: usize,
    pub files: usize,
}

/// Collects install requests into an Inno Setup script.
#[derive(Debug)]
pub struct InstallerExporter {
    assembler: ExecutableAssembler,
    options: InstallerOptions,
    staging_dir: PathBuf,
    directories: Vec<PackPath>,
    seen_directories: HashSet<PackPath>,
    files: Vec<InstallerFile>,
    seen_files: HashSet<PackPath>,
}

impl InstallerExporter {
    /// Start the temporary artifact in the staging directory.
    pub fn create(options: InstallerOptions) -> Result<Self> {
        let staging_dir = options.work_dir.join(STAGING_DIR);
        let artifact = staging_dir.join(&options.artifact_name);

        let mut assembly = AssemblyOptions::new(artifact, &options.stub_image);
        assembly.debug = options.debug;
        assembly.duplicate_policy = options.duplicate_policy;
        let assembler = ExecutableAssembler::create(assembly)?;

        Ok(Self {
            assembler,
            options,
            staging_dir,
            directories: Vec::new(),
            seen_directories: HashSet::new(),
            files: Vec::new(),
            seen_files: HashSet::new(),
        })
    }

    /// Unique directories in request order.
    pub fn directories(&self) -> &[PackPath] {
        &self.directories
    }

    /// File declarations in request order.
    pub fn files(&self) -> &[InstallerFile] {
        &self.files
    }

    fn script_path(&self) -> PathBuf {
        self.options.work_dir.join(SCRIPT_NAME)
    }

    /// Finish the artifact, write the script and run the compiler. The
    /// artifact and script are removed afterwards whatever the outcome.
    pub async fn finish(self) -> Result<InstallerOutput> {
        let script_path = self.script_path();
        let staging_dir = self.staging_dir.clone();

        let result = self.compile(&script_path).await;

        remove_quietly(&script_path).await;
        if let Err(e) = tokio::fs::remove_dir_all(&staging_dir).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            log::warn!("Failed to remove {}: {}", staging_dir.display(), e);
        }

        result
    }

    async fn compile(self, script_path: &Path) -> Result<InstallerOutput> {
        let Self {
            assembler,
            options,
            directories,
            files,
            ..
        } = self;

        let artifact = assembler.finish()?;
        let template = tokio::fs::read_to_string(&options.template)
            .await
            .fs_context("reading installer template", &options.template)?;
        let script = script::render(&template, &artifact.path, &directories, &files)?;
        utils::write_utf8_bom(script_path, &script).await?;
        log::debug!("Wrote installer script {}", script_path.display());

        build::run_compiler(&options.compiler, script_path, options.verbose).await?;

        Ok(InstallerOutput {
            script: script_path.to_path_buf(),
            directories: directories.len(),
            files: files.len(),
        })
    }

    fn record_directory(&mut self, path: &PackPath) {
        for dir in path.parent_chain() {
            if self.seen_directories.insert(dir.clone()) {
                log::debug!("m {}", dir);
                self.directories.push(dir);
            }
        }
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        log::warn!("Failed to remove {}: {}", path.display(), e);
    }
}

impl InstallBuilder for InstallerExporter {
    fn create_directory(&mut self, path: &PackPath) -> Result<()> {
        self.record_directory(path);
        Ok(())
    }

    fn create_file(&mut self, source: &PackPath, target: &PackPath) -> Result<bool> {
        if self.seen_files.contains(target) {
            self.options.duplicate_policy.on_duplicate(target)?;
            return Ok(false);
        }
        self.record_directory(&target.dirname());
        let source = PackPath::from(Path::new(source.as_str()).absolutize()?.as_ref());
        log::debug!("a {} -> {}", source, target);
        self.seen_files.insert(target.clone());
        self.files.push(InstallerFile {
            source,
            target: target.clone(),
        });
        Ok(true)
    }

    fn create_process(&mut self, image: &PackPath, cmdline: &[u8]) -> Result<()> {
        self.assembler.create_process(image, cmdline)
    }

    fn post_create_process(&mut self, image: &PackPath, cmdline: &[u8]) -> Result<()> {
        self.assembler.post_create_process(image, cmdline)
    }

    fn set_env(&mut self, name: &str, value: &str) -> Result<()> {
        self.assembler.set_env(name, value)
    }
}
