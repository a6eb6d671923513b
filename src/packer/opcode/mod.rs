//! Binary opcode protocol appended after the stub image.
//!
//! Every opcode is a little-endian `u32` tag followed by its payload. Strings
//! are NUL-terminated, byte blobs carry a `u32` length prefix.
//!
//! ```text
//! Tag  Opcode                 Payload
//! 0    END                    -
//! 1    CREATE_DIRECTORY       cstr path
//! 2    CREATE_FILE            cstr path, u32 len, bytes
//! 3    CREATE_PROCESS         cstr image, cstr cmdline
//! 4    DECOMPRESS_LZMA        u32 len, bytes
//! 5    SET_ENV                cstr name, cstr value
//! 6    POST_CREATE_PROCESS    cstr image, cstr cmdline
//! 7    ENABLE_DEBUG_MODE      -
//! 8    CREATE_INST_DIRECTORY  u32 next_to_exe, u32 delete_after, u32 chdir_before
//! ```
//!
//! # Module Organization
//!
//! - [`stream`] - Phase state machine and idempotent directory/file requests
//! - [`trailer`] - Fixed 8-byte footer locating the opcode region
//! - [`reader`] - Reading an assembled artifact back into opcodes

pub mod reader;
pub mod stream;
pub mod trailer;

pub use reader::{OpcodeReader, read_artifact};
pub use stream::{OpcodeStream, Phase};
pub use trailer::{SIGNATURE, TRAILER_SIZE, Trailer};

use crate::packer::error::{Error, Result};
use std::io::{Read, Write};

pub const OP_END: u32 = 0;
pub const OP_CREATE_DIRECTORY: u32 = 1;
pub const OP_CREATE_FILE: u32 = 2;
pub const OP_CREATE_PROCESS: u32 = 3;
pub const OP_DECOMPRESS_LZMA: u32 = 4;
pub const OP_SET_ENV: u32 = 5;
pub const OP_POST_CREATE_PROCESS: u32 = 6;
pub const OP_ENABLE_DEBUG_MODE: u32 = 7;
pub const OP_CREATE_INST_DIRECTORY: u32 = 8;

/// Byte the stub replaces with the install directory inside command lines.
pub const INST_DIR_MARKER: u8 = 0xFF;

/// One install-time directive.
///
/// Paths are stored already converted to the native form they are written in.
/// Command lines are raw bytes because they may carry [`INST_DIR_MARKER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    End,
    CreateDirectory { path: String },
    CreateFile { path: String, data: Vec<u8> },
    CreateProcess { image: String, cmdline: Vec<u8> },
    DecompressLzma { data: Vec<u8> },
    SetEnv { name: String, value: String },
    PostCreateProcess { image: String, cmdline: Vec<u8> },
    EnableDebugMode,
    CreateInstDirectory { next_to_exe: bool, delete_after: bool, chdir_before: bool },
}

impl Opcode {
    /// Wire tag of this opcode.
    pub fn tag(&self) -> u32 {
        match self {
            Opcode::End => OP_END,
            Opcode::CreateDirectory { .. } => OP_CREATE_DIRECTORY,
            Opcode::CreateFile { .. } => OP_CREATE_FILE,
            Opcode::CreateProcess { .. } => OP_CREATE_PROCESS,
            Opcode::DecompressLzma { .. } => OP_DECOMPRESS_LZMA,
            Opcode::SetEnv { .. } => OP_SET_ENV,
            Opcode::PostCreateProcess { .. } => OP_POST_CREATE_PROCESS,
            Opcode::EnableDebugMode => OP_ENABLE_DEBUG_MODE,
            Opcode::CreateInstDirectory { .. } => OP_CREATE_INST_DIRECTORY,
        }
    }

    /// Short mnemonic used in log output.
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::End => "END",
            Opcode::CreateDirectory { .. } => "CREATE_DIRECTORY",
            Opcode::CreateFile { .. } => "CREATE_FILE",
            Opcode::CreateProcess { .. } => "CREATE_PROCESS",
            Opcode::DecompressLzma { .. } => "DECOMPRESS_LZMA",
            Opcode::SetEnv { .. } => "SET_ENV",
            Opcode::PostCreateProcess { .. } => "POST_CREATE_PROCESS",
            Opcode::EnableDebugMode => "ENABLE_DEBUG_MODE",
            Opcode::CreateInstDirectory { .. } => "CREATE_INST_DIRECTORY",
        }
    }

    /// Serialize this opcode onto `out`, returning the number of bytes written.
    pub fn encode<W: Write + ?Sized>(&self, out: &mut W) -> Result<u64> {
        let mut buf = Vec::new();
        put_u32(&mut buf, self.tag());
        match self {
            Opcode::End | Opcode::EnableDebugMode => {}
            Opcode::CreateDirectory { path } => {
                put_cstr(&mut buf, path.as_bytes(), "directory path")?;
            }
            Opcode::CreateFile { path, data } => {
                put_cstr(&mut buf, path.as_bytes(), "file path")?;
                put_blob(&mut buf, data)?;
            }
            Opcode::CreateProcess { image, cmdline }
            | Opcode::PostCreateProcess { image, cmdline } => {
                put_cstr(&mut buf, image.as_bytes(), "process image")?;
                put_cstr(&mut buf, cmdline, "command line")?;
            }
            Opcode::DecompressLzma { data } => {
                put_blob(&mut buf, data)?;
            }
            Opcode::SetEnv { name, value } => {
                put_cstr(&mut buf, name.as_bytes(), "environment name")?;
                put_cstr(&mut buf, value.as_bytes(), "environment value")?;
            }
            Opcode::CreateInstDirectory {
                next_to_exe,
                delete_after,
                chdir_before,
            } => {
                put_u32(&mut buf, u32::from(*next_to_exe));
                put_u32(&mut buf, u32::from(*delete_after));
                put_u32(&mut buf, u32::from(*chdir_before));
            }
        }
        out.write_all(&buf)?;
        Ok(buf.len() as u64)
    }

    /// Serialize this opcode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Read one opcode from `input`.
    pub fn decode<R: Read + ?Sized>(input: &mut R) -> Result<Opcode> {
        let tag = get_u32(input, "opcode tag")?;
        let op = match tag {
            OP_END => Opcode::End,
            OP_CREATE_DIRECTORY => Opcode::CreateDirectory {
                path: get_string(input, "directory path")?,
            },
            OP_CREATE_FILE => Opcode::CreateFile {
                path: get_string(input, "file path")?,
                data: get_blob(input, "file data")?,
            },
            OP_CREATE_PROCESS => Opcode::CreateProcess {
                image: get_string(input, "process image")?,
                cmdline: get_cstr(input, "command line")?,
            },
            OP_DECOMPRESS_LZMA => Opcode::DecompressLzma {
                data: get_blob(input, "compressed data")?,
            },
            OP_SET_ENV => Opcode::SetEnv {
                name: get_string(input, "environment name")?,
                value: get_string(input, "environment value")?,
            },
            OP_POST_CREATE_PROCESS => Opcode::PostCreateProcess {
                image: get_string(input, "process image")?,
                cmdline: get_cstr(input, "command line")?,
            },
            OP_ENABLE_DEBUG_MODE => Opcode::EnableDebugMode,
            OP_CREATE_INST_DIRECTORY => Opcode::CreateInstDirectory {
                next_to_exe: get_u32(input, "instdir flags")? != 0,
                delete_after: get_u32(input, "instdir flags")? != 0,
                chdir_before: get_u32(input, "instdir flags")? != 0,
            },
            other => return Err(Error::InvalidOpcode(other)),
        };
        Ok(op)
    }
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_cstr(buf: &mut Vec<u8>, bytes: &[u8], field: &'static str) -> Result<()> {
    if bytes.contains(&0) {
        return Err(Error::InteriorNul { field });
    }
    buf.extend_from_slice(bytes);
    buf.push(0);
    Ok(())
}

fn put_blob(buf: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    put_u32(buf, u32::try_from(data.len())?);
    buf.extend_from_slice(data);
    Ok(())
}

fn get_u32<R: Read + ?Sized>(input: &mut R, what: &'static str) -> Result<u32> {
    let mut bytes = [0u8; 4];
    input
        .read_exact(&mut bytes)
        .map_err(|_| Error::Truncated(what))?;
    Ok(u32::from_le_bytes(bytes))
}

fn get_cstr<R: Read + ?Sized>(input: &mut R, what: &'static str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        input
            .read_exact(&mut byte)
            .map_err(|_| Error::Truncated(what))?;
        if byte[0] == 0 {
            return Ok(out);
        }
        out.push(byte[0]);
    }
}

fn get_string<R: Read + ?Sized>(input: &mut R, what: &'static str) -> Result<String> {
    Ok(String::from_utf8_lossy(&get_cstr(input, what)?).into_owned())
}

fn get_blob<R: Read + ?Sized>(input: &mut R, what: &'static str) -> Result<Vec<u8>> {
    let len = get_u32(input, what)?;
    let mut data = Vec::new();
    input
        .take(u64::from(len))
        .read_to_end(&mut data)
        .map_err(|_| Error::Truncated(what))?;
    if data.len() as u64 != u64::from(len) {
        return Err(Error::Truncated(what));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_file_wire_layout() {
        let op = Opcode::CreateFile {
            path: "src\\a.rb".into(),
            data: b"puts 1".to_vec(),
        };
        let bytes = op.to_bytes().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(b"src\\a.rb\0");
        expected.extend_from_slice(&6u32.to_le_bytes());
        expected.extend_from_slice(b"puts 1");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_inst_directory_flags_layout() {
        let op = Opcode::CreateInstDirectory {
            next_to_exe: true,
            delete_after: false,
            chdir_before: true,
        };
        let bytes = op.to_bytes().unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &8u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &0u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &1u32.to_le_bytes());
    }

    #[test]
    fn test_payloadless_opcodes_are_four_bytes() {
        assert_eq!(Opcode::End.to_bytes().unwrap(), 0u32.to_le_bytes());
        assert_eq!(Opcode::EnableDebugMode.to_bytes().unwrap(), 7u32.to_le_bytes());
    }

    #[test]
    fn test_command_line_keeps_marker_byte() {
        let mut cmdline = b"ruby.exe ".to_vec();
        cmdline.push(INST_DIR_MARKER);
        cmdline.extend_from_slice(b"\\src\\app.rb");
        let op = Opcode::CreateProcess {
            image: "bin\\ruby.exe".into(),
            cmdline: cmdline.clone(),
        };
        let bytes = op.to_bytes().unwrap();
        let decoded = Opcode::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, op);
    }

    #[test]
    fn test_interior_nul_rejected() {
        let op = Opcode::SetEnv {
            name: "A\0B".into(),
            value: String::new(),
        };
        assert!(matches!(
            op.to_bytes(),
            Err(Error::InteriorNul { field: "environment name" })
        ));
    }

    #[test]
    fn test_decode_unknown_tag() {
        let bytes = 42u32.to_le_bytes();
        assert!(matches!(
            Opcode::decode(&mut bytes.as_slice()),
            Err(Error::InvalidOpcode(42))
        ));
    }

    #[test]
    fn test_decode_truncated_blob() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(b"short");
        assert!(matches!(
            Opcode::decode(&mut bytes.as_slice()),
            Err(Error::Truncated("compressed data"))
        ));
    }

    #[test]
    fn test_oversized_blob_length_is_truncation() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(matches!(
            Opcode::decode(&mut bytes.as_slice()),
            Err(Error::Truncated("compressed data"))
        ));
    }
}
