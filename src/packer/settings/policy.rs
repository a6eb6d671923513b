//! How a build reacts to duplicate targets and unresolved dependencies.

use crate::packer::{
    error::{Error, Result},
    path::PackPath,
};
use std::{fmt, str::FromStr};

/// Reaction to a second file request for an already written target.
///
/// The first request always wins; the policy only decides how loudly the
/// later one is dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Drop silently.
    #[default]
    Ignore,
    /// Drop with a warning.
    Warn,
    /// Abort the build.
    Fail,
}

impl DuplicatePolicy {
    pub fn on_duplicate(self, target: &PackPath) -> Result<()> {
        match self {
            DuplicatePolicy::Ignore => {
                log::debug!("skipping duplicate target {}", target);
                Ok(())
            }
            DuplicatePolicy::Warn => {
                log::warn!("duplicate target {} dropped, first request kept", target);
                Ok(())
            }
            DuplicatePolicy::Fail => Err(Error::DuplicateTarget(target.to_string())),
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(DuplicatePolicy::Ignore),
            "warn" => Ok(DuplicatePolicy::Warn),
            "fail" => Ok(DuplicatePolicy::Fail),
            other => Err(format!(
                "unknown duplicate policy '{other}' (expected ignore, warn or fail)"
            )),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DuplicatePolicy::Ignore => "ignore",
            DuplicatePolicy::Warn => "warn",
            DuplicatePolicy::Fail => "fail",
        })
    }
}

/// Reaction to a loaded feature that cannot be mapped to a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnresolvedPolicy {
    /// Skip, logged at debug level.
    #[default]
    Skip,
    /// Skip with a warning.
    Warn,
    /// Abort the build.
    Fail,
}

impl UnresolvedPolicy {
    pub fn on_unresolved(self, name: &str) -> Result<()> {
        match self {
            UnresolvedPolicy::Skip => {
                log::debug!("could not resolve {}, skipping", name);
                Ok(())
            }
            UnresolvedPolicy::Warn => {
                log::warn!("could not resolve {}, skipping", name);
                Ok(())
            }
            UnresolvedPolicy::Fail => Err(Error::UnresolvedDependency(name.to_string())),
        }
    }
}

impl FromStr for UnresolvedPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(UnresolvedPolicy::Skip),
            "warn" => Ok(UnresolvedPolicy::Warn),
            "fail" => Ok(UnresolvedPolicy::Fail),
            other => Err(format!(
                "unknown unresolved policy '{other}' (expected skip, warn or fail)"
            )),
        }
    }
}

impl fmt::Display for UnresolvedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnresolvedPolicy::Skip => "skip",
            UnresolvedPolicy::Warn => "warn",
            UnresolvedPolicy::Fail => "fail",
        })
    }
}
