//! In-memory filesystem tests
//!
//! `InMemoryFs` can model situations a scratch directory cannot reliably
//! produce: entries that refuse removal, junctions and device boundaries.

use fskit::{CopyOptions, FileType, Filesystem, FsConfig, InMemoryFs, Perms};
use pretty_assertions::assert_eq;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn p(s: &str) -> &Path {
    Path::new(s)
}

mod removal {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn remove_all_reports_first_failure_and_removes_the_rest() {
        let fs = InMemoryFs::new();
        fs.create_directories(p("/tmp/t/sub")).unwrap();
        fs.write_contents(p("/tmp/t/a"), "").unwrap();
        fs.write_contents(p("/tmp/t/sub/stuck"), "").unwrap();
        fs.write_contents(p("/tmp/t/z"), "").unwrap();
        fs.deny_removal(p("/tmp/t/sub/stuck"));

        let err = fs.remove_all(p("/tmp/t")).unwrap_err();
        assert_eq!(err.failure_point(), Some(p("/tmp/t/sub/stuck")));
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);

        assert!(!fs.exists(p("/tmp/t/a")).unwrap());
        assert!(!fs.exists(p("/tmp/t/z")).unwrap());
        assert!(fs.exists(p("/tmp/t/sub/stuck")).unwrap());
    }

    #[test]
    fn remove_all_on_missing_path_is_ok() {
        InMemoryFs::new().remove_all(p("/tmp/never")).unwrap();
    }

    #[test]
    fn remove_all_inside_keeps_the_directory() {
        let fs = InMemoryFs::new();
        fs.create_directories(p("/tmp/k/deep")).unwrap();
        fs.write_contents(p("/tmp/k/deep/f"), "").unwrap();

        fs.remove_all_inside(p("/tmp/k")).unwrap();
        assert!(fs.is_directory(p("/tmp/k")).unwrap());
        assert!(fs.is_empty(p("/tmp/k")).unwrap());
    }

    #[test]
    fn remove_all_leaves_junction_targets_alone() {
        let fs = InMemoryFs::new();
        fs.create_directory(p("/tmp/target")).unwrap();
        fs.write_contents(p("/tmp/target/keep"), "").unwrap();
        fs.create_directory(p("/tmp/tree")).unwrap();
        fs.junction("/tmp/target", p("/tmp/tree/j")).unwrap();

        fs.remove_all(p("/tmp/tree")).unwrap();
        assert!(fs.exists(p("/tmp/target/keep")).unwrap());
    }

    #[test]
    fn remove_all_inside_empties_directory_behind_link() {
        let fs = InMemoryFs::new();
        fs.create_directories(p("/tmp/real/sub")).unwrap();
        fs.write_contents(p("/tmp/real/f"), "").unwrap();
        fs.write_contents(p("/tmp/real/sub/g"), "").unwrap();
        fs.symlink("/tmp/real", p("/tmp/link")).unwrap();
        fs.junction("/tmp/real", p("/tmp/j")).unwrap();

        fs.remove_all_inside(p("/tmp/link")).unwrap();
        assert!(fs.is_symlink(p("/tmp/link")).unwrap());
        assert!(fs.is_directory(p("/tmp/real")).unwrap());
        assert!(fs.is_empty(p("/tmp/real")).unwrap());

        fs.write_contents(p("/tmp/real/h"), "").unwrap();
        fs.remove_all_inside(p("/tmp/j")).unwrap();
        assert!(fs.is_symlink(p("/tmp/j")).unwrap());
        assert!(fs.is_empty(p("/tmp/real")).unwrap());
    }
}

mod links {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn junction_is_symlink_classified() {
        let fs = InMemoryFs::new();
        fs.create_directory(p("/tmp/target")).unwrap();
        fs.junction("/tmp/target", p("/tmp/j")).unwrap();

        let own = fs.symlink_status(p("/tmp/j")).unwrap();
        assert_eq!(own.file_type, FileType::Junction);
        assert!(own.is_symlink());
        assert!(fs.is_symlink(p("/tmp/j")).unwrap());
        assert_eq!(fs.status(p("/tmp/j")).unwrap().file_type, FileType::Directory);
    }

    #[test]
    fn dangling_link_exists() {
        let fs = InMemoryFs::new();
        fs.symlink("/tmp/nowhere", p("/tmp/dangling")).unwrap();
        assert!(fs.exists(p("/tmp/dangling")).unwrap());
        assert!(!fs.status(p("/tmp/dangling")).unwrap().exists());
    }

    #[test]
    fn relative_link_targets_resolve_from_link_dir() {
        let fs = InMemoryFs::new();
        fs.create_directories(p("/tmp/a/b")).unwrap();
        fs.write_contents(p("/tmp/a/file"), "up one").unwrap();
        fs.symlink("../file", p("/tmp/a/b/link")).unwrap();
        assert_eq!(fs.read_contents(p("/tmp/a/b/link")).unwrap(), "up one");
    }
}

mod copying {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rename_or_copy_across_mounts_moves_contents() {
        let fs = InMemoryFs::new();
        fs.create_directory(p("/mnt")).unwrap();
        fs.add_mount(p("/mnt"));
        fs.create_directories(p("/tmp/src/nested")).unwrap();
        fs.write_contents(p("/tmp/src/top"), "t").unwrap();
        fs.write_contents(p("/tmp/src/nested/deep"), "d").unwrap();
        fs.symlink("top", p("/tmp/src/alias")).unwrap();

        fs.rename_or_copy(p("/tmp/src"), p("/mnt/dst"), ".partial").unwrap();

        assert!(!fs.exists(p("/tmp/src")).unwrap());
        assert!(!fs.exists(p("/mnt/dst.partial")).unwrap());
        assert_eq!(fs.read_contents(p("/mnt/dst/top")).unwrap(), "t");
        assert_eq!(fs.read_contents(p("/mnt/dst/nested/deep")).unwrap(), "d");
        assert!(fs.is_symlink(p("/mnt/dst/alias")).unwrap());
    }

    #[test]
    fn rename_or_copy_failure_cleans_up_temp() {
        let fs = InMemoryFs::new();
        fs.create_directory(p("/mnt")).unwrap();
        fs.add_mount(p("/mnt"));
        fs.create_directory(p("/tmp/src")).unwrap();
        fs.write_contents(p("/tmp/src/f"), "").unwrap();
        fs.write_contents(p("/mnt/dst.partial"), "in the way").unwrap();

        // The temp path is a file, so creating the directory copy fails.
        assert!(fs.rename_or_copy(p("/tmp/src"), p("/mnt/dst"), ".partial").is_err());
        assert!(fs.exists(p("/tmp/src/f")).unwrap());
        assert!(!fs.exists(p("/mnt/dst")).unwrap());
    }

    #[test]
    fn rename_or_copy_removes_temp_when_final_rename_fails() {
        let fs = InMemoryFs::new();
        fs.create_directory(p("/mnt")).unwrap();
        fs.add_mount(p("/mnt"));
        fs.create_directory(p("/tmp/src")).unwrap();
        fs.write_contents(p("/tmp/src/f"), "payload").unwrap();
        fs.create_directory(p("/mnt/dst")).unwrap();
        fs.write_contents(p("/mnt/dst/occupant"), "").unwrap();

        let err = fs
            .rename_or_copy(p("/tmp/src"), p("/mnt/dst"), ".partial")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectoryNotEmpty);
        assert!(!fs.exists(p("/mnt/dst.partial")).unwrap());
        assert_eq!(fs.read_contents(p("/tmp/src/f")).unwrap(), "payload");
        assert!(fs.exists(p("/mnt/dst/occupant")).unwrap());
    }

    #[test]
    fn copy_file_onto_itself_is_rejected() {
        let fs = InMemoryFs::new();
        fs.write_contents(p("/tmp/f"), "important data").unwrap();
        fs.symlink("f", p("/tmp/alias")).unwrap();

        for options in [CopyOptions::OVERWRITE_EXISTING, CopyOptions::UPDATE_EXISTING] {
            let err = fs.copy_file(p("/tmp/f"), p("/tmp/f"), options).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
            let err = fs.copy_file(p("/tmp/alias"), p("/tmp/f"), options).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        assert_eq!(fs.read_contents(p("/tmp/f")).unwrap(), "important data");
    }

    #[test]
    fn update_existing_uses_write_order() {
        let fs = InMemoryFs::new();
        fs.write_contents(p("/tmp/src"), "v1").unwrap();
        fs.write_contents(p("/tmp/dst"), "newer").unwrap();
        assert!(!fs.copy_file(p("/tmp/src"), p("/tmp/dst"), CopyOptions::UPDATE_EXISTING).unwrap());

        fs.write_contents(p("/tmp/src"), "v2").unwrap();
        assert!(fs.copy_file(p("/tmp/src"), p("/tmp/dst"), CopyOptions::UPDATE_EXISTING).unwrap());
        assert_eq!(fs.read_contents(p("/tmp/dst")).unwrap(), "v2");
    }

    #[test]
    fn copy_without_policy_refuses_to_clobber() {
        let fs = InMemoryFs::new();
        fs.write_contents(p("/tmp/a"), "a").unwrap();
        fs.write_contents(p("/tmp/b"), "b").unwrap();
        let err = fs
            .copy(p("/tmp/a"), p("/tmp/b"), CopyOptions::RECURSIVE)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }
}

mod search_path {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn find_from_path_uses_configured_dirs_in_order() {
        let search = std::env::join_paths(["/bin1", "/bin2", "/bin3"]).unwrap();
        let fs = InMemoryFs::with_config(FsConfig::new().search_path(search));
        for (dir, mode) in [("/bin1", 0o755), ("/bin2", 0o644), ("/bin3", 0o700)] {
            fs.create_directory(p(dir)).unwrap();
            let tool = Path::new(dir).join("tool");
            fs.write_contents(&tool, "").unwrap();
            fs.set_permissions(&tool, Perms::from_mode(mode)).unwrap();
        }

        assert_eq!(
            fs.find_from_path("tool"),
            vec![PathBuf::from("/bin1/tool"), PathBuf::from("/bin3/tool")]
        );
        assert!(fs.find_from_path("other").is_empty());
    }

    #[test]
    fn find_from_path_without_search_path_is_empty() {
        let fs = InMemoryFs::new();
        fs.write_contents(p("/tmp/tool"), "").unwrap();
        assert!(fs.find_from_path("tool").is_empty());
    }
}

mod locking {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blocking_lock_waits_for_release() {
        let fs = Arc::new(InMemoryFs::new());
        let held = fs.take_exclusive_file_lock(p("/tmp/.lock")).unwrap();
        assert!(fs.exists(p("/tmp/.lock")).unwrap());

        let waiter = {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                let start = Instant::now();
                let handle = fs.take_exclusive_file_lock(p("/tmp/.lock")).unwrap();
                let waited = start.elapsed();
                fs.unlock_file_lock(handle).unwrap();
                waited
            })
        };

        thread::sleep(Duration::from_millis(100));
        fs.unlock_file_lock(held).unwrap();
        assert!(waiter.join().unwrap() >= Duration::from_millis(50));
    }

    #[test]
    fn bounded_lock_times_out() {
        let fs = InMemoryFs::with_config(FsConfig::new().lock_timeout(Duration::from_millis(120)));
        let held = fs.take_exclusive_file_lock(p("/tmp/.lock")).unwrap();

        let start = Instant::now();
        let err = fs.try_take_exclusive_file_lock(p("/tmp/.lock")).unwrap_err();
        let elapsed = start.elapsed();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(2));

        fs.unlock_file_lock(held).unwrap();
        let handle = fs.try_take_exclusive_file_lock(p("/tmp/.lock")).unwrap();
        assert!(handle.is_valid());
        fs.unlock_file_lock(handle).unwrap();
    }
}
