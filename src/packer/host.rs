//! The interpreter installation being packaged.

use crate::packer::{error::Context, path::PackPath, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Installation layout reported by the probe interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRuntime {
    /// Installation root; embedded files under it keep their relative layout.
    pub exec_prefix: PackPath,
    pub bindir: PackPath,
    pub libdir: PackPath,
    pub sitelibdir: PackPath,
    /// File name of the core shared library (`LIBRUBY_SO`).
    pub libruby_so: String,
    pub ruby_install_name: String,
    pub rubyw_install_name: String,
    /// Executable suffix, `.exe` on Windows and empty elsewhere.
    pub exeext: String,
}

impl HostRuntime {
    /// Build from `RbConfig::CONFIG` entries. `exec_prefix` and `bindir` are
    /// required; the rest fall back to conventional values.
    pub fn from_config(config: &BTreeMap<String, String>) -> Result<Self> {
        let get = |key: &str| config.get(key).filter(|v| !v.is_empty()).cloned();

        let exec_prefix = get("exec_prefix").context("interpreter did not report exec_prefix")?;
        let bindir = get("bindir").context("interpreter did not report bindir")?;
        let exec_prefix = PackPath::new(exec_prefix);
        let libdir = get("libdir")
            .map(PackPath::new)
            .unwrap_or_else(|| exec_prefix.join("lib"));

        Ok(Self {
            bindir: PackPath::new(bindir),
            sitelibdir: get("sitelibdir")
                .map(PackPath::new)
                .unwrap_or_else(|| libdir.join("ruby/site_ruby")),
            libdir,
            exec_prefix,
            libruby_so: get("LIBRUBY_SO").unwrap_or_default(),
            ruby_install_name: get("ruby_install_name").unwrap_or_else(|| "ruby".to_string()),
            rubyw_install_name: get("rubyw_install_name").unwrap_or_else(|| "rubyw".to_string()),
            exeext: config
                .get("EXEEXT")
                .cloned()
                .unwrap_or_else(|| ".exe".to_string()),
        })
    }

    /// Interpreter executable name, console or windowed.
    pub fn interpreter_exe(&self, windowed: bool) -> String {
        let name = if windowed {
            &self.rubyw_install_name
        } else {
            &self.ruby_install_name
        };
        format!("{}{}", name, self.exeext)
    }

    /// Interpreter executable on the build host.
    pub fn interpreter_path(&self, windowed: bool) -> PackPath {
        self.bindir.join(self.interpreter_exe(windowed))
    }

    /// Core shared library on the build host, looked up in bindir then libdir.
    pub fn libruby_path(&self) -> Option<PackPath> {
        if self.libruby_so.is_empty() {
            return None;
        }
        [&self.bindir, &self.libdir]
            .into_iter()
            .map(|dir| dir.join(self.libruby_so.as_str()))
            .find(PackPath::is_file)
    }

    /// Target of the core shared library, next to the interpreter.
    pub fn libruby_target(&self) -> PackPath {
        PackPath::new("bin").join(self.libruby_so.as_str())
    }

    /// Target of a runtime file: its exec-prefix-relative path, or
    /// `bin/<name>` for files outside the prefix.
    pub fn runtime_target(&self, path: &PackPath) -> PackPath {
        if path.is_subpath_of(&self.exec_prefix) {
            path.relative_path_from(&self.exec_prefix)
        } else {
            PackPath::new("bin").join(path.basename())
        }
    }

    /// Whether `path` names the core shared library.
    pub fn is_libruby(&self, path: &PackPath) -> bool {
        !self.libruby_so.is_empty() && path.basename() == PackPath::new(self.libruby_so.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn windows_host() -> HostRuntime {
        HostRuntime::from_config(&config(&[
            ("exec_prefix", "C:/Ruby32"),
            ("bindir", "C:/Ruby32/bin"),
            ("LIBRUBY_SO", "x64-ucrt-ruby320.dll"),
            ("ruby_install_name", "ruby"),
            ("rubyw_install_name", "rubyw"),
            ("EXEEXT", ".exe"),
        ]))
        .unwrap()
    }

    #[test]
    fn test_interpreter_names() {
        let host = windows_host();
        assert_eq!(host.interpreter_exe(false), "ruby.exe");
        assert_eq!(host.interpreter_exe(true), "rubyw.exe");
        assert_eq!(
            host.interpreter_path(false),
            PackPath::new("c:\\ruby32\\bin\\ruby.exe")
        );
    }

    #[test]
    fn test_linux_has_empty_exeext() {
        let host = HostRuntime::from_config(&config(&[
            ("exec_prefix", "/usr"),
            ("bindir", "/usr/bin"),
            ("EXEEXT", ""),
        ]))
        .unwrap();
        assert_eq!(host.interpreter_exe(false), "ruby");
        assert_eq!(host.libdir, PackPath::new("/usr/lib"));
    }

    #[test]
    fn test_requires_exec_prefix() {
        assert!(HostRuntime::from_config(&config(&[("bindir", "/usr/bin")])).is_err());
    }

    #[test]
    fn test_runtime_target() {
        let host = windows_host();
        assert_eq!(
            host.runtime_target(&PackPath::new("C:/Ruby32/bin/ruby_builtin_dlls/libssl-3.dll"))
                .to_posix(),
            "bin/ruby_builtin_dlls/libssl-3.dll"
        );
        assert_eq!(
            host.runtime_target(&PackPath::new("D:/other/zlib1.dll")).to_posix(),
            "bin/zlib1.dll"
        );
        assert!(host.is_libruby(&PackPath::new("C:\\Ruby32\\bin\\X64-UCRT-RUBY320.DLL")));
    }

    #[test]
    fn test_libruby_from_libdir_lands_in_bin() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("ruby");
        std::fs::create_dir_all(prefix.join("lib")).unwrap();
        std::fs::write(prefix.join("lib/libruby.so.3.2"), "").unwrap();

        let exec_prefix = prefix.display().to_string();
        let bindir = prefix.join("bin").display().to_string();
        let host = HostRuntime::from_config(&config(&[
            ("exec_prefix", exec_prefix.as_str()),
            ("bindir", bindir.as_str()),
            ("LIBRUBY_SO", "libruby.so.3.2"),
            ("EXEEXT", ""),
        ]))
        .unwrap();

        let libruby = host.libruby_path().unwrap();
        assert_eq!(libruby, PackPath::from(prefix.join("lib/libruby.so.3.2")));
        assert_eq!(host.libruby_target().to_posix(), "bin/libruby.so.3.2");
    }
}
