//! Reading an assembled executable back into its opcode sequence.

use super::{Opcode, Trailer};
use crate::packer::error::{ErrorExt, Result};
use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

/// Iterator over the opcodes of a region, stopping at `END`.
///
/// `END` itself is not yielded. After the first error the iterator is
/// exhausted.
pub struct OpcodeReader<R> {
    input: R,
    done: bool,
}

impl<R: Read> OpcodeReader<R> {
    pub fn new(input: R) -> Self {
        Self { input, done: false }
    }
}

impl<R: Read> Iterator for OpcodeReader<R> {
    type Item = Result<Opcode>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match Opcode::decode(&mut self.input) {
            Ok(Opcode::End) => {
                self.done = true;
                None
            }
            Ok(op) => Some(Ok(op)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Locate the opcode region of the artifact at `path` via its trailer and
/// decode every opcode up to `END`.
pub fn read_artifact(path: &Path) -> Result<(Trailer, Vec<Opcode>)> {
    let file = File::open(path).fs_context("opening artifact", path)?;
    let mut input = BufReader::new(file);
    let trailer = Trailer::read_from(&mut input)?;
    input.seek(SeekFrom::Start(u64::from(trailer.opcode_offset)))?;
    let opcodes = OpcodeReader::new(input).collect::<Result<Vec<_>>>()?;
    Ok((trailer, opcodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::error::Error;
    use std::io::Cursor;

    #[test]
    fn test_reader_stops_at_end() {
        let mut bytes = Opcode::EnableDebugMode.to_bytes().unwrap();
        bytes.extend(
            Opcode::SetEnv {
                name: "RUBYOPT".into(),
                value: String::new(),
            }
            .to_bytes()
            .unwrap(),
        );
        bytes.extend(Opcode::End.to_bytes().unwrap());
        bytes.extend(b"trailing garbage");

        let ops: Vec<Opcode> = OpcodeReader::new(Cursor::new(bytes))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], Opcode::EnableDebugMode);
    }

    #[test]
    fn test_reader_reports_missing_end() {
        let bytes = Opcode::EnableDebugMode.to_bytes().unwrap();
        let mut reader = OpcodeReader::new(Cursor::new(bytes));
        assert!(matches!(reader.next(), Some(Ok(Opcode::EnableDebugMode))));
        assert!(matches!(reader.next(), Some(Err(Error::Truncated(_)))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_read_artifact_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.exe");
        let mut bytes = b"MZ-stub".to_vec();
        let offset = bytes.len() as u32;
        bytes.extend(
            Opcode::CreateDirectory {
                path: "lib".into(),
            }
            .to_bytes()
            .unwrap(),
        );
        bytes.extend(Opcode::End.to_bytes().unwrap());
        bytes.extend(
            Trailer {
                opcode_offset: offset,
            }
            .to_bytes(),
        );
        std::fs::write(&path, bytes).unwrap();

        let (trailer, ops) = read_artifact(&path).unwrap();
        assert_eq!(trailer.opcode_offset, offset);
        assert_eq!(
            ops,
            vec![Opcode::CreateDirectory {
                path: "lib".into()
            }]
        );
    }
}
