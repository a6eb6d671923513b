//! Install tree layout.
//!
//! Turns a [`ScanResult`] and the build [`Settings`] into requests against an
//! [`InstallBuilder`]. The install directory looks like:
//!
//! ```text
//! bin/   interpreter, core library, native libraries outside the prefix
//! lib/   sources found outside the exec prefix
//! src/   the application
//! ...    everything else under the exec prefix keeps its relative path
//! ```

use crate::packer::{
    Result,
    builder::InstallBuilder,
    error::ErrorExt,
    opcode::INST_DIR_MARKER,
    path::{NATIVE_SEPARATOR, PackPath},
    scanner::{Origin, ScanResult, ScannedFile},
    settings::Settings,
};
use path_absolutize::Absolutize;
use std::path::Path;

/// Directory of the application inside the install tree.
pub const SRC_DIR: &str = "src";
/// Directory of runtime executables and libraries.
pub const BIN_DIR: &str = "bin";
/// Directory of sources found outside the exec prefix.
pub const LIB_DIR: &str = "lib";

/// Targets accepted by the builder during [`apply`], in request order.
#[derive(Debug, Default, Clone)]
pub struct LayoutSummary {
    pub files: Vec<PackPath>,
}

/// Issue every request of the build to `builder`.
pub fn apply(
    settings: &Settings,
    scan: &ScanResult,
    builder: &mut dyn InstallBuilder,
) -> Result<LayoutSummary> {
    let host = &scan.host;
    let mut summary = LayoutSummary::default();
    let mut add = |builder: &mut dyn InstallBuilder, source: &PackPath, target: PackPath| {
        if builder.create_file(source, &target)? {
            summary.files.push(target);
        }
        Result::Ok(())
    };

    let script = PackPath::from(settings.entry_script());
    let script_target = PackPath::new(SRC_DIR).join(script.basename());
    add(builder, &script, script_target.clone())?;

    let interpreter = host.interpreter_path(settings.windowed());
    let interpreter_target = host.runtime_target(&interpreter);
    add(builder, &interpreter, interpreter_target.clone())?;

    match host.libruby_path() {
        Some(libruby) => add(builder, &libruby, host.libruby_target())?,
        None => log::debug!("no core shared library to embed"),
    }

    for lib in &scan.libraries {
        add(builder, lib, host.runtime_target(lib))?;
    }

    for name in settings.extra_dlls() {
        let source = host.bindir.join(name.as_str());
        add(builder, &source, PackPath::new(BIN_DIR).join(name.as_str()))?;
    }

    for file in &scan.files {
        add(builder, &file.path, source_target(file, &scan.host.exec_prefix))?;
    }

    let script_dir = PackPath::from(settings.script_dir());
    for pattern in settings.extra_files() {
        for source in expand_pattern(pattern)? {
            let target = if source.is_subpath_of(&script_dir) {
                source.relative_path_from(&script_dir)
            } else {
                source.basename()
            };
            add(builder, &source, PackPath::new(SRC_DIR).join(target))?;
        }
    }

    builder.set_env("RUBYOPT", settings.rubyopt())?;

    let cmdline = command_line(
        &host.interpreter_exe(settings.windowed()),
        &script_target,
        settings.script_args(),
    );
    builder.create_process(&interpreter_target, &cmdline)?;

    for post in settings.post_commands() {
        let mut cmdline = post.image.file_name().as_bytes().to_vec();
        if !post.arguments.is_empty() {
            cmdline.push(b' ');
            cmdline.extend_from_slice(post.arguments.as_bytes());
        }
        builder.post_create_process(&post.image, &cmdline)?;
    }

    log::debug!("Layout accepted {} files", summary.files.len());
    Ok(summary)
}

/// Target of a scanned source file.
pub fn source_target(file: &ScannedFile, exec_prefix: &PackPath) -> PackPath {
    if file.path.is_subpath_of(exec_prefix) {
        return file.path.relative_path_from(exec_prefix);
    }
    match file.origin {
        Origin::Application => PackPath::new(SRC_DIR).join(&file.logical),
        Origin::LoadPath => PackPath::new(LIB_DIR).join(&file.logical),
    }
}

/// Command line of the main process. The stub replaces the marker byte with
/// the install directory.
pub fn command_line(exe: &str, script_target: &PackPath, args: &[String]) -> Vec<u8> {
    let mut cmdline = Vec::new();
    cmdline.extend_from_slice(quote_arg(exe).as_bytes());
    cmdline.push(b' ');
    cmdline.push(b'"');
    cmdline.push(INST_DIR_MARKER);
    cmdline.extend_from_slice(
        format!("{}{}", NATIVE_SEPARATOR, script_target.to_native()).as_bytes(),
    );
    cmdline.push(b'"');
    for arg in args {
        cmdline.push(b' ');
        cmdline.extend_from_slice(quote_arg(arg).as_bytes());
    }
    cmdline
}

fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
        return arg.to_string();
    }
    format!("\"{}\"", arg.replace('"', "\\\""))
}

/// Files matched by a glob pattern, as absolute paths. Directories are
/// expanded to the files beneath them.
fn expand_pattern(pattern: &str) -> Result<Vec<PackPath>> {
    let mut files = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = entry?;
        collect_files(&path, &mut files)?;
    }
    if files.is_empty() {
        log::warn!("{} matched no files", pattern);
    }
    Ok(files)
}

fn collect_files(path: &Path, files: &mut Vec<PackPath>) -> Result<()> {
    if path.is_dir() {
        let mut entries = std::fs::read_dir(path)
            .fs_context("reading directory", path)?
            .collect::<std::io::Result<Vec<_>>>()
            .fs_context("reading directory", path)?;
        entries.sort_by_key(|entry| entry.file_name());
        for entry in entries {
            collect_files(&entry.path(), files)?;
        }
    } else {
        files.push(PackPath::from(path.absolutize()?.as_ref()));
    }
    Ok(())
}
