//! The probe program and its line protocol.
//!
//! The probe loads the entry script inside an otherwise unmodified
//! interpreter, snapshots `$LOADED_FEATURES` and `$LOAD_PATH` before
//! requiring anything of its own, prints tagged lines and then sleeps until
//! it is killed, so the native libraries it has mapped can be inspected.

use crate::{bail, packer::Result};
use std::collections::BTreeMap;

/// Prefix of every protocol line. Anything else is script output.
pub const TAG: &str = "@@rubysfx:";

/// Ruby source passed with `-e`. `ARGV[0]` is the entry script, the rest are
/// its arguments.
pub const PROBE_SCRIPT: &str = r##"$stdout.sync = true
__rubysfx_script = ARGV.shift
$0 = __rubysfx_script
begin
  load __rubysfx_script
rescue SystemExit
end
__rubysfx_features = $LOADED_FEATURES.dup
__rubysfx_load_path = $LOAD_PATH.map(&:to_s)
require 'rbconfig'
$stdout.write "\n"
__rubysfx_features.each { |f| $stdout.write "@@rubysfx:feature\t#{f}\n" }
__rubysfx_load_path.each { |d| $stdout.write "@@rubysfx:loadpath\t#{d}\n" }
%w[exec_prefix bindir libdir sitelibdir LIBRUBY_SO ruby_install_name rubyw_install_name EXEEXT].each do |k|
  $stdout.write "@@rubysfx:config\t#{k}\t#{RbConfig::CONFIG[k]}\n"
end
$stdout.write "@@rubysfx:ready\n"
sleep
"##;

/// What the probe reported about one run of the entry script.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// `$LOADED_FEATURES` in load order.
    pub features: Vec<String>,
    /// `$LOAD_PATH` in search order.
    pub load_path: Vec<String>,
    /// Selected `RbConfig::CONFIG` entries.
    pub config: BTreeMap<String, String>,
    ready: bool,
}

impl ProbeReport {
    /// Whether the probe reached the point where it parks.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Consume one output line. Lines without the protocol tag are ignored.
    /// Returns `true` once the `ready` line has been seen.
    pub fn accept(&mut self, line: &str) -> Result<bool> {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(body) = line.strip_prefix(TAG) else {
            log::trace!("script output: {}", line);
            return Ok(self.ready);
        };

        let (kind, rest) = body.split_once('\t').unwrap_or((body, ""));
        match kind {
            "feature" => self.features.push(rest.to_string()),
            "loadpath" => self.load_path.push(rest.to_string()),
            "config" => {
                let (key, value) = rest.split_once('\t').unwrap_or((rest, ""));
                self.config.insert(key.to_string(), value.to_string());
            }
            "ready" => self.ready = true,
            other => bail!("unexpected probe record '{}'", other),
        }
        Ok(self.ready)
    }

    /// Parse a complete transcript.
    pub fn parse(output: &str) -> Result<Self> {
        let mut report = Self::default();
        for line in output.lines() {
            if report.accept(line)? {
                break;
            }
        }
        Ok(report)
    }
}
