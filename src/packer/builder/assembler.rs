//! Executable assembly.
//!
//! An artifact is the stub image, an optional icon resource injected by an
//! external tool, the opcode region, `END` and the trailer:
//!
//! ```text
//! [stub image][icon]?[ENABLE_DEBUG_MODE]?[CREATE_INST_DIRECTORY]?
//! [opcodes | DECOMPRESS_LZMA(opcodes)][END][offset u32][41 B6 BA 4E]
//! ```
//!
//! Uncompressed builds stream opcodes into the destination through a
//! buffered writer. Compressed builds keep them in memory until
//! [`ExecutableAssembler::finish`] hands the whole buffer to the codec.

use super::{InstallBuilder, codec::ExternalCodec, icon};
use crate::packer::{
    error::{Context, Error, ErrorExt, Result},
    opcode::{Opcode, OpcodeStream, Trailer},
    path::PackPath,
    settings::{DuplicatePolicy, InstDirFlags, Settings},
};
use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Inputs of one assembly.
#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    pub destination: PathBuf,
    pub stub_image: PathBuf,
    pub icon: Option<PathBuf>,
    pub icon_tool: Option<PathBuf>,
    /// Prefix the opcodes with ENABLE_DEBUG_MODE.
    pub debug: bool,
    /// Emit CREATE_INST_DIRECTORY; `None` for installer artifacts.
    pub inst_dir: Option<InstDirFlags>,
    /// Compress the opcode region through this codec.
    pub codec: Option<ExternalCodec>,
    pub duplicate_policy: DuplicatePolicy,
}

impl AssemblyOptions {
    /// Uncompressed assembly of `stub_image` into `destination` with no
    /// install directory opcode.
    pub fn new(destination: impl Into<PathBuf>, stub_image: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            stub_image: stub_image.into(),
            icon: None,
            icon_tool: None,
            debug: false,
            inst_dir: None,
            codec: None,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }

    /// Options for the self-extracting executable described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let codec = if settings.compression() {
            let program = settings
                .codec()
                .context("compression requested but no LZMA codec was found (use --codec or --no-lzma)")?;
            Some(ExternalCodec::new(program, settings.work_dir()))
        } else {
            None
        };
        if settings.icon().is_some() && settings.icon_tool().is_none() {
            crate::bail!("an icon was given but no icon tool was found (use --icon-tool)");
        }

        Ok(Self {
            destination: settings.output().to_path_buf(),
            stub_image: settings.stub_image().to_path_buf(),
            icon: settings.icon().map(Path::to_path_buf),
            icon_tool: settings.icon_tool().map(Path::to_path_buf),
            debug: settings.debug(),
            inst_dir: Some(settings.inst_dir_flags()),
            codec,
            duplicate_policy: settings.duplicate_policy(),
        })
    }
}

/// Where encoded opcodes go: the destination file, or a memory buffer once
/// buffering has started.
#[derive(Debug)]
pub struct OutputSink {
    file: BufWriter<File>,
    buffer: Option<Vec<u8>>,
}

impl OutputSink {
    fn begin_buffering(&mut self) {
        self.buffer = Some(Vec::new());
    }

    fn take_buffer(&mut self) -> Option<Vec<u8>> {
        self.buffer.take()
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.buffer {
            Some(buffer) => buffer.write(buf),
            None => self.file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Result of a completed assembly.
#[derive(Debug, Clone)]
pub struct AssembledExecutable {
    pub path: PathBuf,
    pub opcode_offset: u32,
    /// Opcodes appended before finalization, prelude included.
    pub opcodes: usize,
    pub size: u64,
}

/// Writes a self-extracting executable.
#[derive(Debug)]
pub struct ExecutableAssembler {
    destination: PathBuf,
    opcode_offset: u32,
    stream: OpcodeStream<OutputSink>,
    codec: Option<ExternalCodec>,
}

impl ExecutableAssembler {
    /// Copy the stub to the destination, inject the icon and write the
    /// uncompressed prelude. The destination is truncated if it exists.
    pub fn create(options: AssemblyOptions) -> Result<Self> {
        let AssemblyOptions {
            destination,
            stub_image,
            icon,
            icon_tool,
            debug,
            inst_dir,
            codec,
            duplicate_policy,
        } = options;

        let stub = std::fs::read(&stub_image).map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                Error::MissingStubImage(stub_image.clone())
            } else {
                Error::Fs {
                    context: "reading stub image",
                    path: stub_image.clone(),
                    error,
                }
            }
        })?;

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).fs_context("creating output directory", parent)?;
        }
        std::fs::write(&destination, &stub).fs_context("copying stub image", &destination)?;
        log::debug!(
            "Copied stub {} ({} bytes) to {}",
            stub_image.display(),
            stub.len(),
            destination.display()
        );

        if let Some(icon) = &icon {
            let tool = icon_tool
                .as_deref()
                .context("an icon was given but no icon tool is configured")?;
            icon::embed_icon(tool, &destination, icon)?;
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&destination)
            .fs_context("opening executable for append", &destination)?;
        let opcode_offset = u32::try_from(
            file.metadata()
                .fs_context("reading executable size", &destination)?
                .len(),
        )?;

        let sink = OutputSink {
            file: BufWriter::new(file),
            buffer: None,
        };
        let mut stream = OpcodeStream::new(sink).with_duplicate_policy(duplicate_policy);

        if debug {
            stream.push(&Opcode::EnableDebugMode)?;
        }
        if let Some(flags) = inst_dir {
            stream.push(&Opcode::CreateInstDirectory {
                next_to_exe: flags.next_to_exe,
                delete_after: flags.delete_after,
                chdir_before: flags.chdir_before,
            })?;
        }
        if codec.is_some() {
            stream.get_mut().begin_buffering();
        }

        Ok(Self {
            destination,
            opcode_offset,
            stream,
            codec,
        })
    }

    /// Offset of the first opcode, as recorded in the trailer.
    pub fn opcode_offset(&self) -> u32 {
        self.opcode_offset
    }

    /// Compress if configured, then write `END` and the trailer.
    ///
    /// A codec failure aborts here, before the trailer exists, so the
    /// partial destination never carries a valid signature.
    pub fn finish(mut self) -> Result<AssembledExecutable> {
        let opcodes = self.stream.opcode_count();
        let region = self.stream.bytes_written();

        let sink = self.stream.finalize()?;
        if let Some(buffer) = sink.take_buffer() {
            let codec = self
                .codec
                .as_ref()
                .context("opcode buffer present without a codec")?;
            log::info!("Compressing {} bytes of opcodes", buffer.len());
            let data = codec.compress(&buffer)?;
            Opcode::DecompressLzma { data }.encode(sink)?;
        }

        let sink = self.stream.close()?;
        Opcode::End.encode(sink)?;
        sink.write_all(
            &Trailer {
                opcode_offset: self.opcode_offset,
            }
            .to_bytes(),
        )?;
        sink.flush()
            .fs_context("writing executable", &self.destination)?;
        drop(self.stream);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&self.destination)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&self.destination, perms)?;
        }

        let size = std::fs::metadata(&self.destination)
            .fs_context("reading executable size", &self.destination)?
            .len();
        log::debug!(
            "Wrote {} opcodes ({} bytes before compression) at offset {}, {} bytes total",
            opcodes,
            region,
            self.opcode_offset,
            size
        );

        Ok(AssembledExecutable {
            path: self.destination,
            opcode_offset: self.opcode_offset,
            opcodes,
            size,
        })
    }
}

impl InstallBuilder for ExecutableAssembler {
    fn create_directory(&mut self, path: &PackPath) -> Result<()> {
        self.stream.create_directory(path).map(|_| ())
    }

    fn create_file(&mut self, source: &PackPath, target: &PackPath) -> Result<bool> {
        self.stream.create_file(target, source.as_ref())
    }

    fn create_process(&mut self, image: &PackPath, cmdline: &[u8]) -> Result<()> {
        self.stream.create_process(image, cmdline)
    }

    fn post_create_process(&mut self, image: &PackPath, cmdline: &[u8]) -> Result<()> {
        self.stream.post_create_process(image, cmdline)
    }

    fn set_env(&mut self, name: &str, value: &str) -> Result<()> {
        self.stream.set_env(name, value)
    }
}
