//! RAM edit session tests against a real mounted filesystem.

use fernetfs::{Error, Filesystem, FsConfig, SessionState};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const ITERATIONS: u32 = 100;

struct Env {
    _temp: TempDir,
    ram: TempDir,
    fs: Filesystem,
}

fn setup() -> Env {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let ram = TempDir::new().expect("Failed to create RAM dir");
    let mut fs = Filesystem::create(
        b"pw",
        &temp.path().join("vault"),
        FsConfig::new(ITERATIONS, 16, ITERATIONS),
    )
    .expect("Failed to create filesystem");
    fs.set_ram_dir(ram.path());
    Env {
        _temp: temp,
        ram,
        fs,
    }
}

fn ram_entries(env: &Env) -> Vec<PathBuf> {
    fs::read_dir(env.ram.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

#[test]
fn test_substitution_command() {
    let env = setup();
    env.fs.write("/doc.txt", b"read").unwrap();

    let mut session = env.fs.open_as_ram_edit("/doc.txt").unwrap();
    session
        .run("sed -i s/read/test/")
        .expect("Edit command failed");

    assert_eq!(session.state(), SessionState::Done);
    assert_eq!(env.fs.read("/doc.txt").unwrap(), b"test");
    assert!(ram_entries(&env).is_empty());
}

#[test]
fn test_intermediate_save_is_written_back() {
    let env = setup();
    env.fs.write("/doc.txt", b"v1").unwrap();

    let mut session = env.fs.open_as_ram_edit("/doc.txt").unwrap();
    let path = session.start().unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"v1");
    assert!(path.starts_with(env.ram.path().canonicalize().unwrap()));

    fs::write(&path, b"v2").unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Ok(data) = env.fs.read("/doc.txt") {
            if data == b"v2" {
                break;
            }
        }
        assert!(Instant::now() < deadline, "write-back did not happen");
        thread::sleep(Duration::from_millis(50));
    }

    session.stop().unwrap();
    assert!(!path.exists());
    assert_eq!(env.fs.read("/doc.txt").unwrap(), b"v2");
}

#[test]
fn test_failing_command_still_cleans_up() {
    let env = setup();
    env.fs.write("/doc.txt", b"keep").unwrap();

    let mut session = env.fs.open_as_ram_edit("/doc.txt").unwrap();
    let err = session.run("false").unwrap_err();

    assert!(matches!(err, Error::CommandFailed { .. }));
    assert!(ram_entries(&env).is_empty());
    assert_eq!(env.fs.read("/doc.txt").unwrap(), b"keep");
}

#[test]
fn test_failing_command_keeps_last_write() {
    let env = setup();
    env.fs.write("/doc.txt", b"before").unwrap();

    let mut session = env.fs.open_as_ram_edit("/doc.txt").unwrap();
    let err = session
        .run("printf after > \"$1\"; false")
        .unwrap_err();

    assert!(matches!(err, Error::CommandFailed { .. }));
    assert!(ram_entries(&env).is_empty());
    assert_eq!(env.fs.read("/doc.txt").unwrap(), b"after");
}

#[test]
fn test_stop_without_changes_returns_promptly() {
    let env = setup();
    env.fs.write("/doc.txt", b"same").unwrap();

    let mut session = env.fs.open_as_ram_edit("/doc.txt").unwrap();
    session.start().unwrap();

    let started = Instant::now();
    session.stop().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(env.fs.read("/doc.txt").unwrap(), b"same");
}

#[test]
fn test_edit_creates_missing_file() {
    let env = setup();

    let mut session = env.fs.open_as_ram_edit("/new.txt").unwrap();
    session.run("printf created >").unwrap();

    assert_eq!(env.fs.read("/new.txt").unwrap(), b"created");
}

#[test]
fn test_missing_parent_is_not_found() {
    let env = setup();
    assert!(matches!(
        env.fs.open_as_ram_edit("/nope/doc.txt"),
        Err(Error::NotFound(_))
    ));
}
