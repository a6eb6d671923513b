//! Builder for constructing Settings.

use super::{DuplicatePolicy, OutputMode, PostCommand, Settings, UnresolvedPolicy};
use crate::packer::{builder::tool_detection, path::PackPath};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Builder for constructing [`Settings`].
///
/// Everything except the entry script has a default. Tool locations that
/// are not set explicitly are discovered next to the running executable
/// (`../share/rubysfx`) and then on `PATH`.
///
/// # Examples
///
/// ```no_run
/// use rubysfx::packer::SettingsBuilder;
///
/// # fn example() -> rubysfx::packer::Result<()> {
/// let settings = SettingsBuilder::new()
///     .entry_script("app/main.rb")
///     .output("dist/main.exe")
///     .compression(false)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
    entry_script: Option<PathBuf>,
    script_args: Vec<String>,
    output: Option<PathBuf>,
    stub_image: Option<PathBuf>,
    windowed_stub_image: Option<PathBuf>,
    windowed: bool,
    no_compression: bool,
    codec: Option<PathBuf>,
    icon: Option<PathBuf>,
    icon_tool: Option<PathBuf>,
    debug: bool,
    debug_extract: bool,
    chdir_first: bool,
    extra_dlls: Vec<String>,
    extra_files: Vec<String>,
    ruby: Option<PathBuf>,
    rubyopt: String,
    post_commands: Vec<PostCommand>,
    mode: Option<OutputMode>,
    duplicate_policy: DuplicatePolicy,
    unresolved_policy: UnresolvedPolicy,
    work_dir: Option<PathBuf>,
    report: Option<PathBuf>,
    verbose: bool,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the entry script.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn entry_script<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.entry_script = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn script_args(mut self, args: Vec<String>) -> Self {
        self.script_args = args;
        self
    }

    /// Sets the artifact path.
    ///
    /// Default: the entry script with its extension replaced by `.exe`
    pub fn output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn stub_image<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.stub_image = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn windowed_stub_image<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.windowed_stub_image = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn windowed(mut self, windowed: bool) -> Self {
        self.windowed = windowed;
        self
    }

    /// Enables or disables compression of the opcode stream.
    ///
    /// Default: enabled
    pub fn compression(mut self, enabled: bool) -> Self {
        self.no_compression = !enabled;
        self
    }

    pub fn codec<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.codec = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn icon<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.icon = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn icon_tool<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.icon_tool = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn debug_extract(mut self, debug_extract: bool) -> Self {
        self.debug_extract = debug_extract;
        self
    }

    pub fn chdir_first(mut self, chdir_first: bool) -> Self {
        self.chdir_first = chdir_first;
        self
    }

    pub fn extra_dlls(mut self, dlls: Vec<String>) -> Self {
        self.extra_dlls = dlls;
        self
    }

    pub fn extra_files(mut self, patterns: Vec<String>) -> Self {
        self.extra_files = patterns;
        self
    }

    /// Sets the interpreter used for dependency scanning.
    ///
    /// Default: `ruby` found on `PATH`
    pub fn ruby<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.ruby = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn rubyopt(mut self, rubyopt: impl Into<String>) -> Self {
        self.rubyopt = rubyopt.into();
        self
    }

    pub fn post_commands(mut self, commands: Vec<PostCommand>) -> Self {
        self.post_commands = commands;
        self
    }

    /// Sets the output mode.
    ///
    /// Default: [`OutputMode::Executable`]
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn unresolved_policy(mut self, policy: UnresolvedPolicy) -> Self {
        self.unresolved_policy = policy;
        self
    }

    /// Sets the directory used for temporary files.
    ///
    /// Default: the current directory
    pub fn work_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.work_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn report<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.report = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry script is missing or does not exist.
    pub fn build(self) -> crate::packer::Result<Settings> {
        use crate::packer::error::Context;

        let entry_script = self.entry_script.context("entry_script is required")?;
        let entry_script = entry_script.absolutize()?.into_owned();
        if !entry_script.is_file() {
            crate::bail!("entry script {} does not exist", entry_script.display());
        }

        let output = match self.output {
            Some(output) => output.absolutize()?.into_owned(),
            None => PackPath::from(entry_script.as_path())
                .with_ext("exe")
                .to_path_buf(),
        };

        let stub_image = self
            .stub_image
            .unwrap_or_else(|| tool_detection::shared_file("stub.exe"));
        let windowed_stub_image = self
            .windowed_stub_image
            .unwrap_or_else(|| tool_detection::shared_file("stubw.exe"));

        let compression = !self.no_compression;
        let codec = match self.codec {
            Some(codec) => Some(codec),
            None if compression => tool_detection::find_codec(),
            None => None,
        };
        let icon_tool = self.icon_tool.or_else(|| {
            self.icon
                .as_ref()
                .and_then(|_| tool_detection::find_icon_tool())
        });

        let work_dir = match self.work_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };

        Ok(Settings {
            entry_script,
            script_args: self.script_args,
            output,
            stub_image,
            windowed_stub_image,
            windowed: self.windowed,
            compression,
            codec,
            icon: self.icon,
            icon_tool,
            debug: self.debug,
            debug_extract: self.debug_extract,
            chdir_first: self.chdir_first,
            extra_dlls: self.extra_dlls,
            extra_files: self.extra_files,
            ruby: self.ruby.unwrap_or_else(tool_detection::find_ruby),
            rubyopt: self.rubyopt,
            post_commands: self.post_commands,
            mode: self.mode.unwrap_or(OutputMode::Executable),
            duplicate_policy: self.duplicate_policy,
            unresolved_policy: self.unresolved_policy,
            work_dir,
            report: self.report,
            verbose: self.verbose,
        })
    }
}
