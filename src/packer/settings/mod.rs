//! Build configuration.
//!
//! [`Settings`] is an immutable value built once by [`SettingsBuilder`] and
//! passed by reference through scanning, layout and assembly.

mod builder;
mod core;
mod policy;

pub use builder::SettingsBuilder;
pub use core::{InstDirFlags, OutputMode, PostCommand, Settings};
pub use policy::{DuplicatePolicy, UnresolvedPolicy};
