use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use ioccc_check::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Write an executable shell script named `name` with the provided body.
fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perm = std::fs::metadata(&path).unwrap().permissions();
    perm.set_mode(0o755);
    std::fs::set_permissions(&path, perm).unwrap();
    path
}

/// Body of a fake tar that runs `commands` inside the `-C` directory.
fn fake_tar(commands: &str) -> String {
    format!(
        "while [ $# -gt 0 ]; do\n  if [ \"$1\" = \"-C\" ]; then dest=\"$2\"; fi\n  shift\ndone\ncd \"$dest\" || exit 2\n{}",
        commands
    )
}

fn checker(dir: &Path, txzchk: &str, tar: &str, chkentry: &str) -> ExternalChecker {
    ExternalChecker::new(CheckerTools {
        txzchk: script(dir, "txzchk", txzchk),
        chkentry: script(dir, "chkentry", chkentry),
        tar: script(dir, "tar", tar),
    })
}

#[test]
fn test_all_good() {
    let tmp = TempDir::new().unwrap();
    let args = tmp.path().join("args");
    let checker = checker(
        tmp.path(),
        &format!("echo \"$@\" > {}", args.display()),
        &fake_tar("mkdir entry && echo 'main;' > entry/prog.c"),
        "exit 0",
    );
    let tarball = tmp.path().join("submit.user-1.1735689600.txz");
    std::fs::write(&tarball, "xz").unwrap();

    let report = checker.check_tarball(&tarball).unwrap();
    assert!(report.ok());
    assert_eq!(
        std::fs::read_to_string(&args).unwrap(),
        format!("-q {}\n", tarball.display())
    );

    let dest = tmp.path().join("unpacked");
    let dir = match checker.unpack(&tarball, &dest).unwrap() {
        Unpacked::Dir(dir) => dir,
        Unpacked::Rejected(report) => panic!("Unexpected rejection: {}", report),
    };
    assert_eq!(dir, dest.join("entry"));
    assert!(dir.join("prog.c").exists());

    assert!(checker.check_entry(&dir).unwrap().ok());
}

#[test]
fn test_txzchk_fails() {
    let tmp = TempDir::new().unwrap();
    let checker = checker(
        tmp.path(),
        "echo 'txzchk: found 2 errors' >&2; exit 3",
        "exit 0",
        "exit 0",
    );
    let report = checker.check_tarball(Path::new("whatever.txz")).unwrap();
    assert!(!report.ok());
    let error = report.first_error().unwrap();
    assert_eq!(error.message(), "txzchk failed with exit code 3");
    assert!(report.to_plain_text().contains("txzchk: found 2 errors"));
}

#[test]
fn test_tar_fails() {
    let tmp = TempDir::new().unwrap();
    let checker = checker(tmp.path(), "exit 0", "echo corrupted >&2; exit 2", "exit 0");
    let result = checker
        .unpack(Path::new("whatever.txz"), &tmp.path().join("dest"))
        .unwrap();
    match result {
        Unpacked::Rejected(report) => {
            assert_eq!(
                report.first_error().unwrap().message(),
                "tar failed with exit code 2"
            );
        }
        Unpacked::Dir(dir) => panic!("Unexpected success: {}", dir.display()),
    }
}

#[test]
fn test_unpack_two_directories() {
    let tmp = TempDir::new().unwrap();
    let checker = checker(tmp.path(), "exit 0", &fake_tar("mkdir a b"), "exit 0");
    let result = checker
        .unpack(Path::new("whatever.txz"), &tmp.path().join("dest"))
        .unwrap();
    assert!(matches!(result, Unpacked::Rejected(_)));
}

#[test]
fn test_unpack_symlink() {
    let tmp = TempDir::new().unwrap();
    let checker = checker(
        tmp.path(),
        "exit 0",
        &fake_tar("mkdir entry && ln -s /etc/passwd entry/passwd"),
        "exit 0",
    );
    let result = checker
        .unpack(Path::new("whatever.txz"), &tmp.path().join("dest"))
        .unwrap();
    assert!(matches!(result, Unpacked::Rejected(_)));
}

#[test]
fn test_unpack_not_empty_dest() {
    let tmp = TempDir::new().unwrap();
    let checker = checker(tmp.path(), "exit 0", &fake_tar("mkdir entry"), "exit 0");
    let dest = tmp.path().join("dest");
    std::fs::create_dir(&dest).unwrap();
    std::fs::write(dest.join("leftover"), "").unwrap();
    assert!(checker.unpack(Path::new("whatever.txz"), &dest).is_err());
}

#[test]
fn test_chkentry_fails() {
    let tmp = TempDir::new().unwrap();
    let checker = checker(
        tmp.path(),
        "exit 0",
        "exit 0",
        "echo 'chkentry: .info.json is invalid'; exit 1",
    );
    let report = checker.check_entry(tmp.path()).unwrap();
    assert!(!report.ok());
    assert!(report
        .to_plain_text()
        .contains("chkentry: .info.json is invalid"));
}

#[test]
fn test_missing_tool() {
    let checker = ExternalChecker::new(CheckerTools {
        txzchk: "/nonexistent/txzchk".into(),
        ..Default::default()
    });
    assert!(checker.check_tarball(Path::new("whatever.txz")).is_err());
}
