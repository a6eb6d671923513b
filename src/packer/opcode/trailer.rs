//! Fixed footer at the very end of an assembled executable.
//!
//! Layout (8 bytes total):
//! ```text
//! Offset  Size  Field
//! 0       4     opcode_offset (u32 LE) - first byte of the opcode region
//! 4       4     signature 41 B6 BA 4E
//! ```
//!
//! A reader seeks to `EOF - 8`, validates the signature and jumps to
//! `opcode_offset`. The offset is measured after the stub image and any icon
//! resource have been written, so neither needs a size agreed in advance.

use crate::packer::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom};

/// Magic bytes identifying an assembled executable.
pub const SIGNATURE: [u8; 4] = [0x41, 0xB6, 0xBA, 0x4E];

/// Trailer size in bytes (fixed).
pub const TRAILER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Offset of the first opcode, counted from the start of the file.
    pub opcode_offset: u32,
}

impl Trailer {
    pub fn to_bytes(&self) -> [u8; TRAILER_SIZE] {
        let mut buf = [0u8; TRAILER_SIZE];
        buf[0..4].copy_from_slice(&self.opcode_offset.to_le_bytes());
        buf[4..8].copy_from_slice(&SIGNATURE);
        buf
    }

    pub fn from_bytes(buf: &[u8; TRAILER_SIZE]) -> Result<Self> {
        let mut signature = [0u8; 4];
        signature.copy_from_slice(&buf[4..8]);
        if signature != SIGNATURE {
            return Err(Error::InvalidSignature(signature));
        }
        let mut offset = [0u8; 4];
        offset.copy_from_slice(&buf[0..4]);
        Ok(Self {
            opcode_offset: u32::from_le_bytes(offset),
        })
    }

    /// Read and validate the trailer from the end of `input`.
    pub fn read_from<R: Read + Seek>(input: &mut R) -> Result<Self> {
        let len = input.seek(SeekFrom::End(0))?;
        if len < TRAILER_SIZE as u64 {
            return Err(Error::Truncated("trailer"));
        }
        input.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))?;
        let mut buf = [0u8; TRAILER_SIZE];
        input.read_exact(&mut buf)?;
        let trailer = Self::from_bytes(&buf)?;
        if u64::from(trailer.opcode_offset) > len - TRAILER_SIZE as u64 {
            return Err(Error::Truncated("opcode region"));
        }
        Ok(trailer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_trailer_layout() {
        let bytes = Trailer { opcode_offset: 0x1234 }.to_bytes();
        assert_eq!(bytes, [0x34, 0x12, 0, 0, 0x41, 0xB6, 0xBA, 0x4E]);
    }

    #[test]
    fn test_trailer_invalid_signature() {
        let bytes = [0u8; TRAILER_SIZE];
        assert!(matches!(
            Trailer::from_bytes(&bytes),
            Err(Error::InvalidSignature([0, 0, 0, 0]))
        ));
    }

    #[test]
    fn test_read_from_end_of_file() {
        let mut data = b"STUBSTUB".to_vec();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&Trailer { opcode_offset: 8 }.to_bytes());
        let trailer = Trailer::read_from(&mut Cursor::new(data)).unwrap();
        assert_eq!(trailer.opcode_offset, 8);
    }

    #[test]
    fn test_read_rejects_offset_past_end() {
        let data = Trailer { opcode_offset: 500 }.to_bytes().to_vec();
        assert!(matches!(
            Trailer::read_from(&mut Cursor::new(data)),
            Err(Error::Truncated("opcode region"))
        ));
    }

    #[test]
    fn test_read_short_file() {
        assert!(matches!(
            Trailer::read_from(&mut Cursor::new(vec![1, 2, 3])),
            Err(Error::Truncated("trailer"))
        ));
    }
}
