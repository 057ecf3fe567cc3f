//! Error-policy tests
//!
//! The fatal policy exits the process, so it is checked by re-running this
//! test binary as a child with an environment flag set.

use fskit::{
    CopyOptions, FileType, Filesystem, FilesystemExt, InMemoryFs, LineInfo, Propagate, RealFs,
    line_info,
};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::process::Command;

const FATAL_CHILD_ENV: &str = "FSKIT_FATAL_POLICY_CHILD";

fn fatal_site() -> LineInfo {
    line_info!()
}

#[test]
fn fatal_policy_exits_with_location_and_message() {
    if std::env::var_os(FATAL_CHILD_ENV).is_some() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("fatal-target.txt");
        RealFs::new().fatal(fatal_site()).read_contents(&missing);
        unreachable!("fatal policy returned on error");
    }

    let output = Command::new(std::env::current_exe().unwrap())
        .args(["fatal_policy_exits_with_location_and_message", "--exact", "--nocapture"])
        .env(FATAL_CHILD_ENV, "1")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let site = fatal_site();
    assert!(
        stderr.contains(&format!("{}:{}:{}: error: read_contents: ", site.file, site.line, site.column)),
        "unexpected stderr: {stderr}"
    );
    assert!(stderr.contains("fatal-target.txt"), "unexpected stderr: {stderr}");
}

#[test]
fn fatal_policy_is_transparent_on_success() {
    let fs = InMemoryFs::new();
    fs.fatal(line_info!()).write_contents(Path::new("/tmp/f"), "ok");
    assert_eq!(fs.fatal(LineInfo::caller()).read_contents(Path::new("/tmp/f")), "ok");
    assert!(fs.fatal(line_info!()).exists(Path::new("/tmp/f")));
}

#[test]
fn ignore_policy_returns_defaults_for_every_kind() {
    let fs = InMemoryFs::new();
    let view = fs.ignoring();
    let missing = Path::new("/no/such/path");

    assert_eq!(view.read_contents(missing), "");
    assert!(view.read_lines(missing).is_empty());
    view.write_contents(missing, "dropped");
    assert!(view.get_files_recursive(missing).is_empty());
    assert!(!view.is_empty(missing));
    assert!(!view.create_directory(missing));
    assert_eq!(view.canonical(missing), PathBuf::new());
    assert_eq!(view.find_file_recursively_up(missing, Path::new("x")), None);
    assert!(!view.copy_file(missing, Path::new("/tmp/x"), CopyOptions::empty()));
    view.copy(missing, Path::new("/tmp/x"), CopyOptions::RECURSIVE);
    assert!(!fs.exists(Path::new("/tmp/x")).unwrap());
}

#[test]
fn ignore_policy_passes_successes_through() {
    let fs = InMemoryFs::new();
    let view = fs.ignoring();
    assert!(view.create_directory(Path::new("/tmp/d")));
    assert_eq!(view.status(Path::new("/tmp/d")).file_type, FileType::Directory);
    assert_eq!(view.status(Path::new("/tmp/none")).file_type, FileType::NotFound);
}

#[test]
fn propagate_matches_direct_call() {
    let fs = InMemoryFs::new();
    let direct = fs.read_contents(Path::new("/missing")).unwrap_err();
    let viewed = fs
        .with_policy(Propagate)
        .read_contents(Path::new("/missing"))
        .unwrap_err();
    assert_eq!(direct.to_string(), viewed.to_string());
}

#[test]
fn views_work_through_trait_objects() {
    let fs: Box<dyn Filesystem> = Box::new(InMemoryFs::new());
    fs.ignoring().write_contents(Path::new("/tmp/obj"), "dyn");
    assert_eq!(fs.ignoring().read_contents(Path::new("/tmp/obj")), "dyn");
}
