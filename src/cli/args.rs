//! Command line argument parsing and validation.
//!
//! This module provides CLI argument parsing using clap and the conversion of
//! parsed arguments into immutable packager [`Settings`].

use crate::packer::{
    DuplicatePolicy, OutputMode, PackPath, PostCommand, Settings, SettingsBuilder,
    UnresolvedPolicy, builder::tool_detection,
};
use clap::Parser;
use std::path::PathBuf;

/// Ruby script packager
#[derive(Parser, Debug)]
#[command(
    name = "rubysfx",
    version,
    about = "Packages a Ruby script into a self-extracting executable",
    long_about = "Packages a Ruby script, the interpreter and every file the script loads into a single self-extracting executable.

The script is run once to discover its dependencies. Arguments after -- are passed to the script both while scanning and when the packaged program runs.

Usage:
  rubysfx app/main.rb
  rubysfx app/main.rb -o dist/app.exe --add 'app/assets/**/*' -- --port 8080
  rubysfx app/main.rb --innosetup setup.iss

Exit code 0 = artifact written (or installer compiled)."
)]
pub struct Args {
    /// Entry script
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Arguments passed to the script
    #[arg(last = true, value_name = "SCRIPT_ARGS")]
    pub script_args: Vec<String>,

    /// Destination of the executable (default: script path with .exe)
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Extra native library from the interpreter's bin directory
    #[arg(long = "dll", value_name = "NAME")]
    pub dlls: Vec<String>,

    /// Extra files to embed under src/ (glob pattern)
    #[arg(long = "add", value_name = "GLOB")]
    pub add: Vec<String>,

    /// Embed the opcode stream uncompressed
    #[arg(long)]
    pub no_lzma: bool,

    /// Icon resource to embed in the stub
    #[arg(long, value_name = "PATH")]
    pub icon: Option<PathBuf>,

    /// Tool that injects the icon resource
    #[arg(long, value_name = "PATH", env = "RUBYSFX_ICON_TOOL")]
    pub icon_tool: Option<PathBuf>,

    /// Use the windowed stub and interpreter
    #[arg(long, conflicts_with = "console")]
    pub windows: bool,

    /// Use the console stub and interpreter (default unless the script is .rbw)
    #[arg(long)]
    pub console: bool,

    /// Make the stub report what it does at run time
    #[arg(long)]
    pub debug: bool,

    /// Extract next to the executable and keep the files afterwards
    #[arg(long)]
    pub debug_extract: bool,

    /// Change to the install directory before running the script
    #[arg(long)]
    pub chdir_first: bool,

    /// Build an installer from this Inno Setup template instead
    #[arg(long, value_name = "TEMPLATE", conflicts_with = "dry_run")]
    pub innosetup: Option<PathBuf>,

    /// Inno Setup compiler
    #[arg(long, value_name = "PATH", env = "RUBYSFX_ISCC")]
    pub iscc: Option<PathBuf>,

    /// Scan and log every request without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Console stub image
    #[arg(long, value_name = "PATH", env = "RUBYSFX_STUB")]
    pub stub: Option<PathBuf>,

    /// Windowed stub image
    #[arg(long, value_name = "PATH", env = "RUBYSFX_STUBW")]
    pub stubw: Option<PathBuf>,

    /// Compression tool, run as `<codec> e <in> <out>`
    #[arg(long, value_name = "PATH", env = "RUBYSFX_CODEC")]
    pub codec: Option<PathBuf>,

    /// Interpreter used to scan the script
    #[arg(long, value_name = "PATH", env = "RUBYSFX_RUBY")]
    pub ruby: Option<PathBuf>,

    /// Value of RUBYOPT in the packaged program
    #[arg(long, value_name = "VALUE", default_value = "")]
    pub rubyopt: String,

    /// Command run after the script exits, relative to the install directory
    #[arg(long = "post", value_name = "COMMAND")]
    pub post: Vec<String>,

    /// What to do when two files map to the same target: ignore, warn, fail
    #[arg(long, value_name = "POLICY", default_value = "ignore")]
    pub on_duplicate: DuplicatePolicy,

    /// What to do with loaded files that cannot be located: skip, warn, fail
    #[arg(long, value_name = "POLICY", default_value = "skip")]
    pub on_unresolved: UnresolvedPolicy,

    /// Write a JSON build report
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.script.as_os_str().is_empty() {
            return Err("Script cannot be empty".to_string());
        }

        if let Some(template) = &self.innosetup
            && !template.is_file()
        {
            return Err(format!(
                "Installer template not found: {}",
                template.display()
            ));
        }

        if let Some(icon) = &self.icon
            && !icon.is_file()
        {
            return Err(format!("Icon not found: {}", icon.display()));
        }

        if let Some(post) = self.post.iter().find(|p| p.trim().is_empty()) {
            return Err(format!("Invalid post command: {:?}", post));
        }

        Ok(())
    }

    /// Whether the windowed stub and interpreter are used
    pub fn windowed(&self) -> bool {
        self.windows || (!self.console && PackPath::from(self.script.as_path()).has_ext("rbw"))
    }

    /// Selected output mode
    pub fn mode(&self) -> OutputMode {
        if self.dry_run {
            OutputMode::DryRun
        } else if let Some(template) = &self.innosetup {
            OutputMode::Installer {
                template: template.clone(),
                compiler: self
                    .iscc
                    .clone()
                    .unwrap_or_else(tool_detection::find_installer_compiler),
            }
        } else {
            OutputMode::Executable
        }
    }

    /// Build the packager settings
    pub fn to_settings(&self) -> crate::packer::Result<Settings> {
        let mut builder = SettingsBuilder::new()
            .entry_script(&self.script)
            .script_args(self.script_args.clone())
            .windowed(self.windowed())
            .compression(!self.no_lzma)
            .debug(self.debug)
            .debug_extract(self.debug_extract)
            .chdir_first(self.chdir_first)
            .extra_dlls(self.dlls.clone())
            .extra_files(self.add.clone())
            .rubyopt(self.rubyopt.clone())
            .post_commands(self.post.iter().map(|p| PostCommand::parse(p)).collect())
            .mode(self.mode())
            .duplicate_policy(self.on_duplicate)
            .unresolved_policy(self.on_unresolved)
            .verbose(self.verbose);

        if let Some(output) = &self.output {
            builder = builder.output(output);
        }
        if let Some(stub) = &self.stub {
            builder = builder.stub_image(stub);
        }
        if let Some(stubw) = &self.stubw {
            builder = builder.windowed_stub_image(stubw);
        }
        if let Some(codec) = &self.codec {
            builder = builder.codec(codec);
        }
        if let Some(icon) = &self.icon {
            builder = builder.icon(icon);
        }
        if let Some(icon_tool) = &self.icon_tool {
            builder = builder.icon_tool(icon_tool);
        }
        if let Some(ruby) = &self.ruby {
            builder = builder.ruby(ruby);
        }
        if let Some(report) = &self.report {
            builder = builder.report(report);
        }

        builder.build()
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}

impl RuntimeConfig {
    /// Print verbose message if in verbose mode
    pub fn verbose_println(&self, message: &str) -> std::io::Result<()> {
        self.output.verbose(message)
    }

    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.output.success(message)
    }

    /// Print progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.output.progress(message)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.output.indent(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_args_after_separator() {
        let args = Args::try_parse_from([
            "rubysfx", "app.rb", "--no-lzma", "--dll", "a.dll", "--dll", "b.dll", "--", "--port",
            "80",
        ])
        .unwrap();
        assert_eq!(args.script, PathBuf::from("app.rb"));
        assert_eq!(args.script_args, ["--port", "80"]);
        assert_eq!(args.dlls, ["a.dll", "b.dll"]);
        assert!(args.no_lzma);
        assert_eq!(args.on_duplicate, DuplicatePolicy::Ignore);
        assert_eq!(args.on_unresolved, UnresolvedPolicy::Skip);
    }

    #[test]
    fn test_policies_and_modes() {
        let args = Args::try_parse_from([
            "rubysfx",
            "app.rb",
            "--on-duplicate",
            "fail",
            "--on-unresolved",
            "warn",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(args.on_duplicate, DuplicatePolicy::Fail);
        assert_eq!(args.on_unresolved, UnresolvedPolicy::Warn);
        assert_eq!(args.mode(), OutputMode::DryRun);

        assert!(Args::try_parse_from(["rubysfx", "app.rb", "--on-duplicate", "maybe"]).is_err());
        assert!(Args::try_parse_from(["rubysfx", "app.rb", "--windows", "--console"]).is_err());
        assert!(Args::try_parse_from(["rubysfx", "app.rb", "--verbose", "--quiet"]).is_err());
    }

    #[test]
    fn test_rbw_script_defaults_to_windowed() {
        let parse = |args: &[&str]| Args::try_parse_from(args).unwrap().windowed();
        assert!(!parse(&["rubysfx", "app.rb"]));
        assert!(parse(&["rubysfx", "app.rb", "--windows"]));
        assert!(parse(&["rubysfx", "gui.RBW"]));
        assert!(!parse(&["rubysfx", "gui.rbw", "--console"]));
    }

    #[test]
    fn test_validate_missing_template() {
        let args =
            Args::try_parse_from(["rubysfx", "app.rb", "--innosetup", "/no/such/setup.iss"])
                .unwrap();
        assert!(args.validate().unwrap_err().contains("setup.iss"));
    }
}
