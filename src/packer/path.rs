//! Platform-aware path values.
//!
//! [`PackPath`] is used for every source and target path that flows through a
//! build. Both `/` and `\` are recognized as separators on every host, drive
//! prefixes (`C:`) are understood, and all comparisons go through one canonical
//! rule: the path is lowercased and its separators are normalized to `/`.
//! Target paths inside the install root are Windows-flavoured even when the
//! build host is not.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Separator used by [`PackPath::to_native`] on this host.
pub const NATIVE_SEPARATOR: char = if cfg!(windows) { '\\' } else { '/' };

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn segment_eq(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Immutable path value with case-insensitive comparison.
#[derive(Clone, Debug, Default)]
pub struct PackPath {
    path: String,
}

impl PackPath {
    /// Wrap a path string as-is.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The path exactly as it was constructed.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// The path with every separator turned into `/`.
    pub fn to_posix(&self) -> String {
        self.path.replace('\\', "/")
    }

    /// The path with every separator turned into [`NATIVE_SEPARATOR`].
    pub fn to_native(&self) -> String {
        if cfg!(windows) {
            self.path.replace('/', "\\")
        } else {
            self.to_posix()
        }
    }

    /// Host filesystem path for I/O.
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    /// Canonical comparison key: posix separators, lowercase.
    pub fn normalized(&self) -> String {
        self.to_posix().to_lowercase()
    }

    /// True if the path starts with a separator, optionally after a drive letter.
    pub fn is_absolute(&self) -> bool {
        let bytes = self.path.as_bytes();
        let rest = if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            &bytes[2..]
        } else {
            bytes
        };
        matches!(rest.first(), Some(b'/') | Some(b'\\'))
    }

    /// True for `.` and the empty path.
    pub fn is_current_dir(&self) -> bool {
        self.path.is_empty() || self.path == "."
    }

    /// True for `/`, `\` and `C:\`.
    pub fn is_root(&self) -> bool {
        self.is_absolute() && self.segments().iter().skip(1).all(|s| s.is_empty())
    }

    /// Path segments split on either separator. An absolute path yields a
    /// leading root anchor (`""` or the drive), trailing separators are ignored.
    fn segments(&self) -> Vec<&str> {
        let mut segments: Vec<&str> = self.path.split(is_separator).collect();
        while segments.len() > 1 && segments.last().is_some_and(|s| s.is_empty()) {
            segments.pop();
        }
        segments
    }

    fn trimmed(&self) -> &str {
        self.path.trim_end_matches(is_separator)
    }

    /// Join `other` onto this path.
    ///
    /// Returns `other` unchanged when it is absolute. Otherwise the two are
    /// concatenated with exactly one `/` between them.
    pub fn join(&self, other: impl Into<PackPath>) -> PackPath {
        let other = other.into();
        if other.is_absolute() || self.path.is_empty() {
            return other;
        }
        let base = self.trimmed();
        if base.is_empty() {
            // Joining onto the bare root keeps its separator.
            return PackPath::new(format!("{}{}", &self.path[..1], other.path));
        }
        PackPath::new(format!("{}/{}", base, other.path))
    }

    /// Path of `self` relative to the directory `base`.
    ///
    /// The longest common leading run of segments is stripped from both sides
    /// (case-insensitively), then one `..` is prepended per remaining base
    /// segment. When the two paths share nothing beyond their root anchor and
    /// `self` is absolute, `self` is returned unchanged.
    pub fn relative_path_from(&self, base: &PackPath) -> PackPath {
        let target = self.segments();
        let base_segments = base.segments();

        let common = target
            .iter()
            .zip(base_segments.iter())
            .take_while(|(a, b)| segment_eq(a, b))
            .count();

        let anchor = usize::from(self.is_absolute());
        if common <= anchor && self.is_absolute() {
            return self.clone();
        }

        let mut parts: Vec<&str> = vec![".."; base_segments.len() - common];
        parts.extend(&target[common..]);
        if parts.is_empty() {
            return PackPath::new(".");
        }
        PackPath::new(parts.join("/"))
    }

    /// True iff this path lies strictly inside `other`.
    ///
    /// The normalized form of `self` must start with the normalized form of
    /// `other` immediately followed by a separator, so `/usrx` is not inside `/usr`.
    pub fn is_subpath_of(&self, other: &PackPath) -> bool {
        let src = self.normalized();
        let tgt = other.normalized();
        let tgt = tgt.trim_end_matches('/');
        src.strip_prefix(tgt).is_some_and(|rest| rest.starts_with('/'))
    }

    /// Final path segment as a string slice.
    pub fn file_name(&self) -> &str {
        let trimmed = self.trimmed();
        match trimmed.rfind(is_separator) {
            Some(i) => &trimmed[i + 1..],
            None => trimmed,
        }
    }

    /// Final path segment.
    pub fn basename(&self) -> PackPath {
        if self.is_root() {
            return self.clone();
        }
        PackPath::new(self.file_name())
    }

    /// Everything but the final segment; `.` when there is no directory part.
    pub fn dirname(&self) -> PackPath {
        let trimmed = self.trimmed();
        if trimmed.is_empty() {
            return if self.path.is_empty() {
                PackPath::new(".")
            } else {
                self.clone()
            };
        }
        match trimmed.rfind(is_separator) {
            None => PackPath::new("."),
            Some(i) => {
                let parent = trimmed[..i].trim_end_matches(is_separator);
                if parent.is_empty() {
                    PackPath::new(&trimmed[..1])
                } else if is_drive(parent) {
                    PackPath::new(&trimmed[..parent.len() + 1])
                } else {
                    PackPath::new(parent)
                }
            }
        }
    }

    /// Extension of the final segment including the dot, or `""`.
    ///
    /// A leading dot (`.profile`) does not start an extension.
    pub fn ext(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(i) if i > 0 => &name[i..],
            _ => "",
        }
    }

    /// Case-insensitive extension test; `ext` may be given with or without the dot.
    pub fn has_ext(&self, ext: &str) -> bool {
        let wanted = ext.trim_start_matches('.');
        let actual = self.ext().trim_start_matches('.');
        !actual.is_empty() && actual.eq_ignore_ascii_case(wanted)
    }

    /// Copy of this path with its extension replaced, or appended when absent.
    pub fn with_ext(&self, ext: &str) -> PackPath {
        let ext = if ext.is_empty() || ext.starts_with('.') {
            ext.to_string()
        } else {
            format!(".{ext}")
        };
        let trimmed = self.trimmed();
        let stem = &trimmed[..trimmed.len() - self.ext().len()];
        PackPath::new(format!("{stem}{ext}"))
    }

    /// This directory and each of its ancestors, outermost first.
    ///
    /// Stops at `.` and at the root, neither of which is included.
    pub fn parent_chain(&self) -> Vec<PackPath> {
        let mut chain = Vec::new();
        let mut current = self.clone();
        while !current.is_current_dir() && !current.is_root() {
            let parent = current.dirname();
            chain.push(current);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// True if the path exists on the build host.
    pub fn exists(&self) -> bool {
        Path::new(&self.path).exists()
    }

    /// True if the path names a regular file on the build host.
    pub fn is_file(&self) -> bool {
        Path::new(&self.path).is_file()
    }
}

impl PartialEq for PackPath {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for PackPath {}

impl Hash for PackPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl PartialOrd for PackPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized().cmp(&other.normalized())
    }
}

impl fmt::Display for PackPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_posix())
    }
}

impl AsRef<Path> for PackPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.path)
    }
}

impl From<&str> for PackPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for PackPath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&String> for PackPath {
    fn from(path: &String) -> Self {
        Self::new(path.as_str())
    }
}

impl From<&Path> for PackPath {
    fn from(path: &Path) -> Self {
        Self::new(path.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for PackPath {
    fn from(path: PathBuf) -> Self {
        Self::from(path.as_path())
    }
}

impl From<&PackPath> for PackPath {
    fn from(path: &PackPath) -> Self {
        path.clone()
    }
}

impl Serialize for PackPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_posix())
    }
}
