//! Core Settings struct and implementations.

use super::{DuplicatePolicy, UnresolvedPolicy};
use crate::packer::path::PackPath;
use std::path::{Path, PathBuf};

/// Which builder receives the layout requests of a build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// Stub image plus opcode stream, written to the output path.
    Executable,
    /// Inno Setup script compiled by an external installer compiler.
    Installer {
        /// User template prepended to the generated sections.
        template: PathBuf,
        /// Installer compiler executable.
        compiler: PathBuf,
    },
    /// Log every request, write nothing.
    DryRun,
}

impl OutputMode {
    pub fn name(&self) -> &'static str {
        match self {
            OutputMode::Executable => "executable",
            OutputMode::Installer { .. } => "installer",
            OutputMode::DryRun => "dry-run",
        }
    }
}

/// A program the stub runs after the main process exits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostCommand {
    /// Image path relative to the install directory.
    pub image: PackPath,
    /// Arguments appended after the image name.
    pub arguments: String,
}

impl PostCommand {
    /// Split `"image arg1 arg2"` at the first space.
    pub fn parse(command: &str) -> Self {
        let command = command.trim();
        match command.split_once(' ') {
            Some((image, arguments)) => Self {
                image: PackPath::new(image),
                arguments: arguments.trim_start().to_string(),
            },
            None => Self {
                image: PackPath::new(command),
                arguments: String::new(),
            },
        }
    }
}

/// Flags of the CREATE_INST_DIRECTORY opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstDirFlags {
    pub next_to_exe: bool,
    pub delete_after: bool,
    pub chdir_before: bool,
}

/// Immutable configuration of one build.
///
/// Constructed once via [`SettingsBuilder`](super::SettingsBuilder) and
/// passed by reference to every component.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Absolute path of the entry script.
    pub(super) entry_script: PathBuf,
    /// Arguments baked into the command line after the script name.
    pub(super) script_args: Vec<String>,
    /// Destination of the artifact.
    pub(super) output: PathBuf,
    /// Console stub image.
    pub(super) stub_image: PathBuf,
    /// Windowed stub image.
    pub(super) windowed_stub_image: PathBuf,
    /// Use the windowed stub and `rubyw`.
    pub(super) windowed: bool,
    /// Compress the opcode stream through the codec.
    pub(super) compression: bool,
    pub(super) codec: Option<PathBuf>,
    pub(super) icon: Option<PathBuf>,
    pub(super) icon_tool: Option<PathBuf>,
    pub(super) debug: bool,
    pub(super) debug_extract: bool,
    pub(super) chdir_first: bool,
    /// Extra libraries from the interpreter's bindir.
    pub(super) extra_dlls: Vec<String>,
    /// Glob patterns of extra application files.
    pub(super) extra_files: Vec<String>,
    /// Interpreter used to run the dependency probe.
    pub(super) ruby: PathBuf,
    pub(super) rubyopt: String,
    pub(super) post_commands: Vec<PostCommand>,
    pub(super) mode: OutputMode,
    pub(super) duplicate_policy: DuplicatePolicy,
    pub(super) unresolved_policy: UnresolvedPolicy,
    /// Directory for codec interchange files and installer staging.
    pub(super) work_dir: PathBuf,
    pub(super) report: Option<PathBuf>,
    pub(super) verbose: bool,
}

impl Settings {
    pub fn entry_script(&self) -> &Path {
        &self.entry_script
    }

    /// Directory containing the entry script.
    pub fn script_dir(&self) -> &Path {
        self.entry_script.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn script_args(&self) -> &[String] {
        &self.script_args
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Stub image for this build, console or windowed.
    pub fn stub_image(&self) -> &Path {
        if self.windowed {
            &self.windowed_stub_image
        } else {
            &self.stub_image
        }
    }

    pub fn windowed(&self) -> bool {
        self.windowed
    }

    pub fn compression(&self) -> bool {
        self.compression
    }

    pub fn codec(&self) -> Option<&Path> {
        self.codec.as_deref()
    }

    pub fn icon(&self) -> Option<&Path> {
        self.icon.as_deref()
    }

    pub fn icon_tool(&self) -> Option<&Path> {
        self.icon_tool.as_deref()
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Install directory flags. Debug extraction unpacks next to the
    /// executable and keeps the files.
    pub fn inst_dir_flags(&self) -> InstDirFlags {
        InstDirFlags {
            next_to_exe: self.debug_extract,
            delete_after: !self.debug_extract,
            chdir_before: self.chdir_first,
        }
    }

    pub fn extra_dlls(&self) -> &[String] {
        &self.extra_dlls
    }

    pub fn extra_files(&self) -> &[String] {
        &self.extra_files
    }

    pub fn ruby(&self) -> &Path {
        &self.ruby
    }

    pub fn rubyopt(&self) -> &str {
        &self.rubyopt
    }

    pub fn post_commands(&self) -> &[PostCommand] {
        &self.post_commands
    }

    pub fn mode(&self) -> &OutputMode {
        &self.mode
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicate_policy
    }

    pub fn unresolved_policy(&self) -> UnresolvedPolicy {
        self.unresolved_policy
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn report(&self) -> Option<&Path> {
        self.report.as_deref()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_command_parse() {
        let cmd = PostCommand::parse("bin\\cleanup.exe  --all now");
        assert_eq!(cmd.image, PackPath::new("bin/cleanup.exe"));
        assert_eq!(cmd.arguments, "--all now");

        let bare = PostCommand::parse("notify.exe");
        assert_eq!(bare.arguments, "");
    }
}
