//! Native libraries resident in the probe process.
//!
//! Exactly one [`LibraryDetector`] is active per host, chosen once by
//! [`host_detector`]: module enumeration on Windows, `/proc/<pid>/maps`
//! everywhere else.

use crate::packer::{Result, host::HostRuntime, path::PackPath};

#[cfg(windows)]
pub use super::modules::ModuleEnumDetector;
pub use super::proc_maps::ProcMapsDetector;

/// Enumerates the shared libraries mapped into a running process.
pub trait LibraryDetector {
    /// Short description for log output.
    fn strategy(&self) -> &'static str;

    /// Every library file mapped into process `pid`, deduplicated, in the
    /// order the host reports them.
    fn loaded_libraries(&self, pid: u32) -> Result<Vec<PackPath>>;

    /// Libraries of process `pid` that belong to the packaged runtime.
    fn detect_dlls(&self, pid: u32, host: &HostRuntime) -> Result<Vec<PackPath>> {
        let loaded = self.loaded_libraries(pid)?;
        log::debug!(
            "{} reports {} loaded libraries",
            self.strategy(),
            loaded.len()
        );
        Ok(restrict_to_runtime(loaded, host))
    }
}

/// Keep libraries under the exec prefix, minus the core shared library which
/// is embedded separately.
pub fn restrict_to_runtime(loaded: Vec<PackPath>, host: &HostRuntime) -> Vec<PackPath> {
    loaded
        .into_iter()
        .filter(|lib| {
            let keep = lib.is_subpath_of(&host.exec_prefix) && !host.is_libruby(lib);
            if !keep {
                log::trace!("ignoring library {}", lib);
            }
            keep
        })
        .collect()
}

/// The detector for this host.
#[cfg(windows)]
pub fn host_detector() -> Result<Box<dyn LibraryDetector>> {
    Ok(Box::new(ModuleEnumDetector))
}

/// The detector for this host.
#[cfg(not(windows))]
pub fn host_detector() -> Result<Box<dyn LibraryDetector>> {
    Ok(Box::new(ProcMapsDetector::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_restrict_to_runtime() {
        let config: BTreeMap<String, String> = [
            ("exec_prefix", "/opt/ruby"),
            ("bindir", "/opt/ruby/bin"),
            ("LIBRUBY_SO", "libruby.so.3.2"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let host = HostRuntime::from_config(&config).unwrap();

        let loaded = vec![
            PackPath::new("/lib/x86_64-linux-gnu/libc.so.6"),
            PackPath::new("/opt/ruby/lib/libruby.so.3.2"),
            PackPath::new("/opt/ruby/lib/ruby/3.2.0/x86_64-linux/etc.so"),
            PackPath::new("/opt/rubyx/lib/other.so"),
        ];
        assert_eq!(
            restrict_to_runtime(loaded, &host),
            vec![PackPath::new("/opt/ruby/lib/ruby/3.2.0/x86_64-linux/etc.so")]
        );
    }
}
