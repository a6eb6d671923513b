//! Builder that writes nothing.

use super::InstallBuilder;
use crate::packer::{Result, path::PackPath};
use std::collections::HashSet;

/// Logs every request and records it as a line of text.
#[derive(Debug, Default)]
pub struct DryRun {
    requests: Vec<String>,
    targets: HashSet<PackPath>,
}

impl DryRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    fn record(&mut self, line: String) {
        log::info!("{}", line);
        self.requests.push(line);
    }
}

impl InstallBuilder for DryRun {
    fn create_directory(&mut self, path: &PackPath) -> Result<()> {
        self.record(format!("m {}", path));
        Ok(())
    }

    fn create_file(&mut self, source: &PackPath, target: &PackPath) -> Result<bool> {
        self.record(format!("a {} -> {}", source, target));
        Ok(self.targets.insert(target.clone()))
    }

    fn create_process(&mut self, image: &PackPath, cmdline: &[u8]) -> Result<()> {
        self.record(format!("l {} {}", image, String::from_utf8_lossy(cmdline)));
        Ok(())
    }

    fn post_create_process(&mut self, image: &PackPath, cmdline: &[u8]) -> Result<()> {
        self.record(format!("p {} {}", image, String::from_utf8_lossy(cmdline)));
        Ok(())
    }

    fn set_env(&mut self, name: &str, value: &str) -> Result<()> {
        self.record(format!("e {} {}", name, value));
        Ok(())
    }
}
