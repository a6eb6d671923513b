//! Assembled executable layout: stub prefix, opcode region and trailer.

use rubysfx::packer::{
    PackPath,
    builder::{AssemblyOptions, ExecutableAssembler, ExternalCodec, InstallBuilder},
    opcode::{Opcode, Trailer, read_artifact},
    settings::InstDirFlags,
};
use std::path::{Path, PathBuf};

const STUB: &[u8] = b"MZ\x90\x00 test stub image";

fn write_stub(dir: &Path) -> PathBuf {
    let stub = dir.join("stub.exe");
    std::fs::write(&stub, STUB).unwrap();
    stub
}

fn options(dir: &Path, name: &str) -> AssemblyOptions {
    let mut options = AssemblyOptions::new(dir.join(name), write_stub(dir));
    options.inst_dir = Some(InstDirFlags {
        next_to_exe: false,
        delete_after: true,
        chdir_before: false,
    });
    options
}

/// Issue the same requests against any builder.
fn populate(builder: &mut dyn InstallBuilder, sources: &Path) {
    std::fs::create_dir_all(sources.join("lib")).unwrap();
    std::fs::write(sources.join("main.rb"), "require 'helper'\n").unwrap();
    std::fs::write(sources.join("lib/helper.rb"), "puts :hi\n").unwrap();

    builder
        .create_file(
            &PackPath::from(sources.join("main.rb")),
            &PackPath::new("src/main.rb"),
        )
        .unwrap();
    builder
        .create_file(
            &PackPath::from(sources.join("lib/helper.rb")),
            &PackPath::new("src/lib/helper.rb"),
        )
        .unwrap();
    builder.set_env("RUBYOPT", "").unwrap();
    builder
        .create_process(&PackPath::new("bin/ruby"), b"ruby \"\xFF/src/main.rb\"")
        .unwrap();
}

#[test]
fn test_uncompressed_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut assembler = ExecutableAssembler::create(options(dir.path(), "app.exe")).unwrap();
    populate(&mut assembler, &dir.path().join("app"));
    let exe = assembler.finish().unwrap();

    let bytes = std::fs::read(&exe.path).unwrap();
    assert!(bytes.starts_with(STUB));
    assert_eq!(exe.opcode_offset as usize, STUB.len());
    assert_eq!(exe.size as usize, bytes.len());

    let (trailer, ops) = read_artifact(&exe.path).unwrap();
    assert_eq!(trailer.opcode_offset as usize, STUB.len());

    let tags: Vec<&str> = ops.iter().map(Opcode::name).collect();
    assert_eq!(
        tags,
        [
            "CREATE_INST_DIRECTORY",
            "CREATE_DIRECTORY",
            "CREATE_FILE",
            "CREATE_DIRECTORY",
            "CREATE_FILE",
            "SET_ENV",
            "CREATE_PROCESS",
        ]
    );
    assert_eq!(
        ops[2],
        Opcode::CreateFile {
            path: PackPath::new("src/main.rb").to_native(),
            data: b"require 'helper'\n".to_vec(),
        }
    );
}

#[test]
fn test_nested_file_creates_parent_chain() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("deep.rb");
    std::fs::write(&source, "").unwrap();

    let mut assembler = ExecutableAssembler::create(AssemblyOptions::new(
        dir.path().join("deep.exe"),
        write_stub(dir.path()),
    ))
    .unwrap();
    let target = PackPath::new("a/b/c/deep.rb");
    assembler
        .create_file(&PackPath::from(source.as_path()), &target)
        .unwrap();
    assembler
        .create_file(&PackPath::from(source.as_path()), &target)
        .unwrap();
    assembler.create_directory(&PackPath::new("a/b")).unwrap();
    let exe = assembler.finish().unwrap();

    let (_, ops) = read_artifact(&exe.path).unwrap();
    let dirs: Vec<String> = ops
        .iter()
        .filter_map(|op| match op {
            Opcode::CreateDirectory { path } => Some(PackPath::new(path.as_str()).to_posix()),
            _ => None,
        })
        .collect();
    assert_eq!(dirs, ["a", "a/b", "a/b/c"]);
    assert_eq!(ops.len(), 4);
    assert!(matches!(ops[3], Opcode::CreateFile { .. }));
}

#[cfg(unix)]
mod compressed {
    use super::*;
    use rubysfx::packer::Error;
    use std::os::unix::fs::PermissionsExt;

    fn codec_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("codec.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_identity_codec_matches_uncompressed_region() {
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join("app");

        let mut plain = ExecutableAssembler::create(options(dir.path(), "plain.exe")).unwrap();
        populate(&mut plain, &sources);
        let plain = plain.finish().unwrap();

        let mut packed_options = options(dir.path(), "packed.exe");
        packed_options.codec = Some(ExternalCodec::new(
            codec_script(dir.path(), "cp \"$2\" \"$3\""),
            dir.path(),
        ));
        let mut packed = ExecutableAssembler::create(packed_options).unwrap();
        populate(&mut packed, &sources);
        let packed = packed.finish().unwrap();

        let (_, ops) = read_artifact(&packed.path).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].name(), "CREATE_INST_DIRECTORY");
        let Opcode::DecompressLzma { data } = &ops[1] else {
            panic!("expected DECOMPRESS_LZMA, got {:?}", ops[1]);
        };

        // Region of the plain build between the prelude and END.
        let plain_bytes = std::fs::read(&plain.path).unwrap();
        let prelude = Opcode::CreateInstDirectory {
            next_to_exe: false,
            delete_after: true,
            chdir_before: false,
        }
        .to_bytes()
        .unwrap()
        .len();
        let start = plain.opcode_offset as usize + prelude;
        let end = plain_bytes.len() - 8 - 4;
        assert_eq!(data.as_slice(), &plain_bytes[start..end]);
    }

    #[test]
    fn test_failing_codec_leaves_no_signature() {
        let dir = tempfile::tempdir().unwrap();
        let mut failing = options(dir.path(), "broken.exe");
        failing.codec = Some(ExternalCodec::new(
            codec_script(dir.path(), "exit 1"),
            dir.path(),
        ));
        let mut assembler = ExecutableAssembler::create(failing).unwrap();
        populate(&mut assembler, &dir.path().join("app"));

        assert!(matches!(assembler.finish(), Err(Error::ToolFailed { .. })));

        let mut file = std::fs::File::open(dir.path().join("broken.exe")).unwrap();
        assert!(Trailer::read_from(&mut file).is_err());
    }
}
