//! Append-only opcode stream with its phase state machine.
//!
//! The stream owns the idempotence rules of an artifact: directories are
//! memoized by normalized path, file targets are written once, and a file
//! request creates its parent chain first. Everything it accepts is encoded
//! straight into the sink; the sink decides whether bytes land in the
//! destination file or in a buffer awaiting compression.

use super::Opcode;
use crate::packer::{
    error::{Error, ErrorExt, Result},
    path::PackPath,
    settings::DuplicatePolicy,
};
use std::{collections::HashSet, io::Write, path::Path};

/// Lifecycle of an [`OpcodeStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting opcodes.
    Open,
    /// No more appends; post-processing (compression) may run.
    Finalizing,
    /// Trailer written, output released.
    Closed,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Open => "open",
            Phase::Finalizing => "finalizing",
            Phase::Closed => "closed",
        }
    }
}

/// Ordered sequence of install-time directives written to `W`.
#[derive(Debug)]
pub struct OpcodeStream<W: Write> {
    sink: W,
    phase: Phase,
    directories: HashSet<PackPath>,
    files: HashSet<PackPath>,
    duplicates: DuplicatePolicy,
    opcodes: usize,
    bytes: u64,
}

impl<W: Write> OpcodeStream<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            phase: Phase::Open,
            directories: HashSet::new(),
            files: HashSet::new(),
            duplicates: DuplicatePolicy::default(),
            opcodes: 0,
            bytes: 0,
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of opcodes appended so far.
    pub fn opcode_count(&self) -> usize {
        self.opcodes
    }

    /// Number of encoded bytes handed to the sink so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    fn expect_phase(&self, expected: Phase) -> Result<()> {
        if self.phase != expected {
            return Err(Error::InvalidPhase {
                expected: expected.name(),
                actual: self.phase.name(),
            });
        }
        Ok(())
    }

    /// Encode one opcode into the sink. Only valid while the stream is open.
    pub fn push(&mut self, op: &Opcode) -> Result<()> {
        self.expect_phase(Phase::Open)?;
        self.bytes += op.encode(&mut self.sink)?;
        self.opcodes += 1;
        log::trace!("opcode #{} {}", self.opcodes, op.name());
        Ok(())
    }

    /// Create `path` unless it was already created. Returns whether an opcode
    /// was appended.
    pub fn create_directory(&mut self, path: &PackPath) -> Result<bool> {
        self.expect_phase(Phase::Open)?;
        if self.directories.contains(path) {
            return Ok(false);
        }
        self.push(&Opcode::CreateDirectory {
            path: path.to_native(),
        })?;
        self.directories.insert(path.clone());
        log::debug!("m {}", path);
        Ok(true)
    }

    /// Create every directory leading up to and including `path`, outermost
    /// first.
    pub fn ensure_directory(&mut self, path: &PackPath) -> Result<()> {
        for dir in path.parent_chain() {
            self.create_directory(&dir)?;
        }
        Ok(())
    }

    /// Whether `target` has already been written.
    pub fn contains_file(&self, target: &PackPath) -> bool {
        self.files.contains(target)
    }

    /// Embed the file at `source` as `target`. A target that was already
    /// written is handled by the duplicate policy and the source is not read.
    pub fn create_file(&mut self, target: &PackPath, source: &Path) -> Result<bool> {
        self.expect_phase(Phase::Open)?;
        if self.contains_file(target) {
            self.duplicates.on_duplicate(target)?;
            return Ok(false);
        }
        let data = std::fs::read(source).fs_context("reading file to embed", source)?;
        self.create_file_from_bytes(target, data)
    }

    /// Embed `data` as `target`, creating its parent chain first.
    pub fn create_file_from_bytes(&mut self, target: &PackPath, data: Vec<u8>) -> Result<bool> {
        self.expect_phase(Phase::Open)?;
        if self.contains_file(target) {
            self.duplicates.on_duplicate(target)?;
            return Ok(false);
        }
        self.ensure_directory(&target.dirname())?;
        let size = data.len();
        self.push(&Opcode::CreateFile {
            path: target.to_native(),
            data,
        })?;
        self.files.insert(target.clone());
        log::debug!("a {} ({} bytes)", target, size);
        Ok(true)
    }

    pub fn create_process(&mut self, image: &PackPath, cmdline: &[u8]) -> Result<()> {
        self.push(&Opcode::CreateProcess {
            image: image.to_native(),
            cmdline: cmdline.to_vec(),
        })?;
        log::debug!("l {} {}", image, String::from_utf8_lossy(cmdline));
        Ok(())
    }

    pub fn post_create_process(&mut self, image: &PackPath, cmdline: &[u8]) -> Result<()> {
        self.push(&Opcode::PostCreateProcess {
            image: image.to_native(),
            cmdline: cmdline.to_vec(),
        })?;
        log::debug!("p {} {}", image, String::from_utf8_lossy(cmdline));
        Ok(())
    }

    pub fn set_env(&mut self, name: &str, value: &str) -> Result<()> {
        self.push(&Opcode::SetEnv {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        log::debug!("e {} {}", name, value);
        Ok(())
    }

    /// Stop accepting opcodes. Returns the sink for post-processing.
    pub fn finalize(&mut self) -> Result<&mut W> {
        self.expect_phase(Phase::Open)?;
        self.phase = Phase::Finalizing;
        Ok(&mut self.sink)
    }

    /// Leave the finalizing phase. Returns the sink so the caller can write
    /// the trailer and release the output.
    pub fn close(&mut self) -> Result<&mut W> {
        self.expect_phase(Phase::Finalizing)?;
        self.phase = Phase::Closed;
        Ok(&mut self.sink)
    }
}
