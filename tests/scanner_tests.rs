//! Dependency scanning against a fake interpreter that speaks the probe
//! protocol.

#![cfg(unix)]

use rubysfx::packer::{
    Error, PackPath, Result, UnresolvedPolicy,
    scanner::{DependencyScanner, LibraryDetector, Origin},
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Interpreter install, application and fake interpreter in one temp tree.
struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        let stdlib = fixture.stdlib();
        std::fs::create_dir_all(&stdlib).unwrap();
        std::fs::write(stdlib.join("set.rb"), "").unwrap();
        std::fs::create_dir_all(fixture.app().join("lib")).unwrap();
        std::fs::write(fixture.script(), "require_relative 'lib/helper'\n").unwrap();
        std::fs::write(fixture.app().join("lib/helper.rb"), "").unwrap();
        fixture
    }

    fn prefix(&self) -> PathBuf {
        self.dir.path().join("ruby")
    }

    fn stdlib(&self) -> PathBuf {
        self.prefix().join("lib/ruby/3.2.0")
    }

    fn app(&self) -> PathBuf {
        self.dir.path().join("app")
    }

    fn script(&self) -> PathBuf {
        self.app().join("main.rb")
    }

    /// A `ruby` that records its arguments, runs `before`, reports `features`
    /// and then parks like the real probe.
    fn interpreter(&self, before: &str, features: &[String]) -> PathBuf {
        let mut body = format!(
            "#!/bin/sh\necho \"$3\" > \"{argv}.script\"\nshift 3\necho \"$@\" > \"{argv}.args\"\n{before}\necho 'output of the script'\n",
            argv = self.dir.path().join("argv").display(),
        );
        for feature in features {
            body.push_str(&format!("printf '@@rubysfx:feature\\t%s\\n' '{feature}'\n"));
        }
        body.push_str(&format!(
            "printf '@@rubysfx:loadpath\\t%s\\n' '{stdlib}'\n\
             printf '@@rubysfx:config\\texec_prefix\\t%s\\n' '{prefix}'\n\
             printf '@@rubysfx:config\\tbindir\\t%s\\n' '{prefix}/bin'\n\
             printf '@@rubysfx:config\\tLIBRUBY_SO\\tlibruby.so.3.2\\n'\n\
             printf '@@rubysfx:config\\tEXEEXT\\t\\n'\n\
             echo '@@rubysfx:ready'\n\
             exec sleep 30\n",
            stdlib = self.stdlib().display(),
            prefix = self.prefix().display(),
        ));

        let path = self.dir.path().join("ruby-fake");
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn default_features(&self) -> Vec<String> {
        vec![
            "enumerator.so".to_string(),
            self.stdlib().join("set.rb").display().to_string(),
            self.app().join("lib/helper.rb").display().to_string(),
        ]
    }
}

fn is_running(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Reports fixed libraries and remembers the process it was asked about.
struct RecordingDetector {
    libraries: Vec<PackPath>,
    probed: Arc<Mutex<Option<(u32, bool)>>>,
}

impl LibraryDetector for RecordingDetector {
    fn strategy(&self) -> &'static str {
        "recording"
    }

    fn loaded_libraries(&self, pid: u32) -> Result<Vec<PackPath>> {
        *self.probed.lock().unwrap() = Some((pid, is_running(pid)));
        Ok(self.libraries.clone())
    }
}

fn scanner(
    fixture: &Fixture,
    ruby: PathBuf,
    policy: UnresolvedPolicy,
) -> (DependencyScanner, Arc<Mutex<Option<(u32, bool)>>>) {
    let probed = Arc::new(Mutex::new(None));
    let prefix = fixture.prefix();
    let detector = RecordingDetector {
        libraries: vec![
            PackPath::from(prefix.join("lib/ruby/3.2.0/x86_64-linux/etc.so")),
            PackPath::new("/lib/x86_64-linux-gnu/libc.so.6"),
            PackPath::from(prefix.join("lib/libruby.so.3.2")),
        ],
        probed: Arc::clone(&probed),
    };
    (
        DependencyScanner::new(ruby, Box::new(detector), policy),
        probed,
    )
}

fn read_argv(dir: &Path, suffix: &str) -> String {
    std::fs::read_to_string(dir.join(format!("argv.{suffix}")))
        .unwrap()
        .trim_end()
        .to_string()
}

#[tokio::test]
async fn test_scan_reports_files_and_runtime_libraries() {
    let fixture = Fixture::new();
    let ruby = fixture.interpreter("", &fixture.default_features());
    let (scanner, probed) = scanner(&fixture, ruby, UnresolvedPolicy::Skip);

    let args = vec!["--port".to_string(), "80".to_string()];
    let scan = scanner.scan(&fixture.script(), &args).await.unwrap();

    assert_eq!(
        read_argv(fixture.dir.path(), "script"),
        fixture.script().display().to_string()
    );
    assert_eq!(read_argv(fixture.dir.path(), "args"), "--port 80");

    let logical: Vec<String> = scan.files.iter().map(|f| f.logical.to_posix()).collect();
    assert_eq!(logical, ["set.rb", "lib/helper.rb"]);
    assert_eq!(scan.files[0].origin, Origin::LoadPath);
    assert_eq!(scan.files[1].origin, Origin::Application);

    assert_eq!(scan.host.exec_prefix, PackPath::from(fixture.prefix()));
    assert_eq!(scan.host.libruby_so, "libruby.so.3.2");
    assert_eq!(
        scan.libraries,
        [PackPath::from(
            fixture.prefix().join("lib/ruby/3.2.0/x86_64-linux/etc.so")
        )]
    );

    let (pid, running) = probed.lock().unwrap().take().unwrap();
    assert!(running, "libraries must be read from the parked probe");
    assert!(!is_running(pid), "probe must be stopped after the scan");
}

#[tokio::test]
async fn test_script_reading_stdin_does_not_block() {
    let fixture = Fixture::new();
    let ruby = fixture.interpreter("read line", &fixture.default_features());
    let (scanner, _) = scanner(&fixture, ruby, UnresolvedPolicy::Skip);

    let scan = tokio::time::timeout(
        Duration::from_secs(10),
        scanner.scan(&fixture.script(), &[]),
    )
    .await
    .expect("scan waited on stdin")
    .unwrap();
    assert_eq!(scan.files.len(), 2);
}

#[tokio::test]
async fn test_exit_before_ready_is_scan_error() {
    let fixture = Fixture::new();
    let ruby = fixture.interpreter("echo '@@rubysfx:feature\tset.rb'\nexit 3", &[]);
    let (scanner, probed) = scanner(&fixture, ruby, UnresolvedPolicy::Skip);

    let err = scanner.scan(&fixture.script(), &[]).await.unwrap_err();
    match err {
        Error::Scan { script, .. } => assert_eq!(script, fixture.script()),
        other => panic!("expected a scan error, got {other:?}"),
    }
    assert!(probed.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_missing_interpreter_fails_to_launch() {
    let fixture = Fixture::new();
    let (scanner, _) = scanner(
        &fixture,
        fixture.dir.path().join("no-such-ruby"),
        UnresolvedPolicy::Skip,
    );
    assert!(matches!(
        scanner.scan(&fixture.script(), &[]).await,
        Err(Error::CommandFailed { .. })
    ));
}

#[tokio::test]
async fn test_unresolved_feature_policies() {
    let fixture = Fixture::new();
    let mut features = fixture.default_features();
    features.push("vendor/missing.rb".to_string());
    let ruby = fixture.interpreter("", &features);

    for policy in [UnresolvedPolicy::Skip, UnresolvedPolicy::Warn] {
        let (scanner, _) = scanner(&fixture, ruby.clone(), policy);
        let scan = scanner.scan(&fixture.script(), &[]).await.unwrap();
        assert_eq!(scan.files.len(), 2, "{policy} keeps the resolved files");
    }

    let (scanner, _) = scanner(&fixture, ruby, UnresolvedPolicy::Fail);
    assert!(matches!(
        scanner.scan(&fixture.script(), &[]).await,
        Err(Error::UnresolvedDependency(name)) if name == "vendor/missing.rb"
    ));
}
