//! Library detection through `/proc/<pid>/maps`.

use super::library::LibraryDetector;
use crate::packer::{
    error::{Error, Result},
    path::PackPath,
};
use regex::Regex;
use std::{collections::HashSet, io, path::PathBuf};

/// Shared object file names: `foo.so` or `foo.so.1.2`.
pub const SHARED_OBJECT_PATTERN: &str = r"\.so(\.|$)";

#[derive(Debug)]
pub struct ProcMapsDetector {
    pattern: Regex,
    proc_root: PathBuf,
}

impl ProcMapsDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(SHARED_OBJECT_PATTERN)?,
            proc_root: PathBuf::from("/proc"),
        })
    }
}

impl LibraryDetector for ProcMapsDetector {
    fn strategy(&self) -> &'static str {
        "/proc maps"
    }

    fn loaded_libraries(&self, pid: u32) -> Result<Vec<PackPath>> {
        let maps = self.proc_root.join(pid.to_string()).join("maps");
        match std::fs::read_to_string(&maps) {
            Ok(text) => Ok(parse_maps(&text, &self.pattern)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "{} not available, native libraries will not be detected",
                    maps.display()
                );
                Ok(Vec::new())
            }
            Err(error) => Err(Error::Fs {
                context: "reading process memory map",
                path: maps,
                error,
            }),
        }
    }
}

/// Extract mapped file paths matching `pattern` from a maps listing.
///
/// Each line is `address perms offset dev inode [pathname]`. Anonymous and
/// pseudo mappings (`[heap]`, `[vdso]`) have no absolute path and are
/// skipped. The result is deduplicated, first mapping first.
pub fn parse_maps(text: &str, pattern: &Regex) -> Vec<PackPath> {
    let mut seen = HashSet::new();
    let mut libraries = Vec::new();

    for line in text.lines() {
        let pathname = pathname_field(line).trim_end_matches(" (deleted)");
        if !pathname.starts_with('/') {
            continue;
        }
        let path = PackPath::new(pathname);
        if !pattern.is_match(path.file_name()) {
            continue;
        }
        if seen.insert(path.clone()) {
            libraries.push(path);
        }
    }
    libraries
}

/// Everything after the fifth field, as written. Pathnames may contain runs
/// of spaces.
fn pathname_field(line: &str) -> &str {
    let mut rest = line;
    for _ in 0..5 {
        rest = rest.trim_start();
        rest = match rest.find(char::is_whitespace) {
            Some(end) => &rest[end..],
            None => "",
        };
    }
    rest.trim_start()
}
