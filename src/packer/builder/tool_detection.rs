//! External tool detection.
//!
//! Stub images and helper tools ship in `<exe dir>/../share/rubysfx`. Tools
//! not found there are looked up on `PATH`.

use std::path::PathBuf;
use std::sync::LazyLock;

/// Shared data directory of this installation.
///
/// Cached result to avoid repeated `current_exe` lookups during a build.
pub static SHARE_DIR: LazyLock<Option<PathBuf>> = LazyLock::new(|| {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            log::debug!("Cannot determine current executable: {}", e);
            return None;
        }
    };
    let dir = exe.parent()?.parent()?.join("share").join("rubysfx");
    log::debug!("Shared data directory: {}", dir.display());
    Some(dir)
});

/// Path of `name` inside the shared data directory, or `name` itself when the
/// directory cannot be determined.
pub fn shared_file(name: &str) -> PathBuf {
    match SHARE_DIR.as_ref() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Find the first of `names` in the shared data directory, then on `PATH`.
pub fn locate(names: &[&str]) -> Option<PathBuf> {
    for name in names {
        let candidate = shared_file(name);
        if candidate.is_file() {
            log::debug!("Found {} at: {}", name, candidate.display());
            return Some(candidate);
        }
    }
    for name in names {
        match which::which(name) {
            Ok(path) => {
                log::debug!("Found {} at: {}", name, path.display());
                return Some(path);
            }
            Err(e) => log::debug!("{} not found in PATH: {}", name, e),
        }
    }
    None
}

/// LZMA codec used to compress the opcode stream.
pub fn find_codec() -> Option<PathBuf> {
    locate(&["lzma.exe", "lzma"])
}

/// Tool that injects an icon resource into the stub.
pub fn find_icon_tool() -> Option<PathBuf> {
    locate(&["edicon.exe", "edicon"])
}

/// Interpreter used for dependency scanning; falls back to the bare name so
/// the launch error names it.
pub fn find_ruby() -> PathBuf {
    which::which("ruby").unwrap_or_else(|e| {
        log::debug!("ruby not found in PATH: {}", e);
        PathBuf::from("ruby")
    })
}

/// Inno Setup command-line compiler.
pub fn find_installer_compiler() -> PathBuf {
    locate(&["iscc.exe", "iscc", "ISCC.exe"]).unwrap_or_else(|| PathBuf::from("iscc"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_missing_tool() {
        assert!(locate(&["rubysfx-definitely-not-a-tool"]).is_none());
    }

    #[test]
    fn test_shared_file_keeps_name() {
        assert!(shared_file("stub.exe").ends_with("stub.exe"));
    }
}
