//! fskit CLI - Command line front end over the native filesystem
//!
//! Usage:
//!   fskit stat PATH [--no-follow] [--json]   # Print file type and permissions
//!   fskit ls DIR [-r]                        # List entries
//!   fskit cp SRC DST [-r] [--overwrite]      # Copy files or trees
//!   fskit mv SRC DST                         # Rename, copying across devices
//!   fskit lock PATH [--try] -- CMD ARGS...   # Run a command under a file lock
//!
//! Set `RUST_LOG=fskit=debug` to see every mutating operation on stderr.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use fskit::{CopyOptions, Filesystem, FilesystemExt, FsConfig, RealFs};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// fskit - Portable filesystem operations
#[derive(Parser, Debug)]
#[command(name = "fskit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Budget for `lock --try`, in milliseconds
    #[arg(long, global = true, default_value_t = 1500)]
    lock_timeout_ms: u64,

    /// Search path used by `which` instead of PATH
    #[arg(long, global = true)]
    search_path: Option<OsString>,

    #[command(subcommand)]
    command: SubCmd,
}

#[derive(Subcommand, Debug)]
enum SubCmd {
    /// Print file type and permissions
    Stat {
        path: PathBuf,
        /// Describe a symlink itself rather than its target
        #[arg(long)]
        no_follow: bool,
        #[arg(long)]
        json: bool,
    },
    /// Print a file's contents
    Cat { path: PathBuf },
    /// Print a file's lines, numbered
    Lines { path: PathBuf },
    /// List a directory
    Ls {
        dir: PathBuf,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Create a directory
    Mkdir {
        path: PathBuf,
        /// Create missing parents
        #[arg(short, long)]
        parents: bool,
    },
    /// Remove a file, symlink or directory
    Rm {
        path: PathBuf,
        #[arg(short, long)]
        recursive: bool,
        /// Empty the directory but keep it
        #[arg(long, requires = "recursive")]
        inside: bool,
    },
    /// Copy a file, symlink or directory
    Cp {
        src: PathBuf,
        dst: PathBuf,
        #[arg(short, long)]
        recursive: bool,
        #[arg(long, conflicts_with_all = ["overwrite", "update"])]
        skip_existing: bool,
        #[arg(long, conflicts_with = "update")]
        overwrite: bool,
        /// Replace the destination only if it is older
        #[arg(long)]
        update: bool,
        /// Copy symlinks as links
        #[arg(short = 'P', long)]
        copy_symlinks: bool,
    },
    /// Move a file or directory, copying when the rename crosses devices
    Mv {
        src: PathBuf,
        dst: PathBuf,
        #[arg(long, default_value = ".fskit-tmp")]
        temp_suffix: String,
    },
    /// Find every executable with this name on the search path
    Which { name: String },
    /// Resolve a path through every symlink
    Canonical { path: PathBuf },
    /// Make a path absolute without touching disk
    Absolute { path: PathBuf },
    /// Find the nearest ancestor directory containing a file
    Up { start: PathBuf, name: PathBuf },
    /// Run a command while holding an exclusive lock
    Lock {
        path: PathBuf,
        /// Give up after --lock-timeout-ms instead of waiting forever
        #[arg(long = "try")]
        try_only: bool,
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<OsString>,
    },
}

impl Args {
    fn fs_config(&self) -> FsConfig {
        let mut config = FsConfig::new().lock_timeout(Duration::from_millis(self.lock_timeout_ms));
        if let Some(path) = &self.search_path {
            config = config.search_path(path.clone());
        }
        config
    }
}

fn copy_options(
    recursive: bool,
    skip_existing: bool,
    overwrite: bool,
    update: bool,
    copy_symlinks: bool,
) -> CopyOptions {
    let mut options = CopyOptions::empty();
    options.set(CopyOptions::RECURSIVE, recursive);
    options.set(CopyOptions::SKIP_EXISTING, skip_existing);
    options.set(CopyOptions::OVERWRITE_EXISTING, overwrite);
    options.set(CopyOptions::UPDATE_EXISTING, update);
    options.set(CopyOptions::COPY_SYMLINKS, copy_symlinks);
    options
}

/// Execute one subcommand, returning the process exit code.
fn run(args: Args) -> Result<i32> {
    let fs = RealFs::with_config(args.fs_config());
    tracing::debug!(command = ?args.command, "running");

    match args.command {
        SubCmd::Stat {
            path,
            no_follow,
            json,
        } => {
            let status = if no_follow {
                fs.symlink_status(&path)
            } else {
                fs.status(&path)
            }
            .with_context(|| format!("Failed to stat {}", path.display()))?;
            if json {
                println!("{}", serde_json::to_string(&status)?);
            } else {
                println!("{}\t{}", status.file_type, status.permissions);
            }
            Ok(if status.exists() { 0 } else { 1 })
        }
        SubCmd::Cat { path } => {
            let contents = fs
                .read_contents(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            print!("{contents}");
            Ok(0)
        }
        SubCmd::Lines { path } => {
            let lines = fs
                .read_lines(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            for (n, line) in lines.iter().enumerate() {
                println!("{:>6}\t{line}", n + 1);
            }
            Ok(0)
        }
        SubCmd::Ls { dir, recursive } => {
            let mut entries = if recursive {
                fs.get_files_recursive(&dir)
            } else {
                fs.get_files_non_recursive(&dir)
            }
            .with_context(|| format!("Failed to list {}", dir.display()))?;
            entries.sort();
            for entry in entries {
                println!("{}", entry.display());
            }
            Ok(0)
        }
        SubCmd::Mkdir { path, parents } => {
            let created = if parents {
                fs.create_directories(&path)
            } else {
                fs.create_directory(&path)
            }
            .with_context(|| format!("Failed to create {}", path.display()))?;
            if !created {
                eprintln!("fskit: {} already exists", path.display());
            }
            Ok(0)
        }
        SubCmd::Rm {
            path,
            recursive,
            inside,
        } => {
            let result = match (recursive, inside) {
                (true, true) => fs.remove_all_inside(&path),
                (true, false) => fs.remove_all(&path),
                (false, _) => fs.remove(&path).map(drop),
            };
            result.with_context(|| format!("Failed to remove {}", path.display()))?;
            Ok(0)
        }
        SubCmd::Cp {
            src,
            dst,
            recursive,
            skip_existing,
            overwrite,
            update,
            copy_symlinks,
        } => {
            let options = copy_options(recursive, skip_existing, overwrite, update, copy_symlinks);
            fs.copy(&src, &dst, options).with_context(|| {
                format!("Failed to copy {} to {}", src.display(), dst.display())
            })?;
            Ok(0)
        }
        SubCmd::Mv {
            src,
            dst,
            temp_suffix,
        } => {
            fs.rename_or_copy(&src, &dst, &temp_suffix).with_context(|| {
                format!("Failed to move {} to {}", src.display(), dst.display())
            })?;
            Ok(0)
        }
        SubCmd::Which { name } => {
            let found = fs.find_from_path(&name);
            for path in &found {
                println!("{}", path.display());
            }
            Ok(if found.is_empty() { 1 } else { 0 })
        }
        SubCmd::Canonical { path } => {
            let resolved = fs
                .canonical(&path)
                .with_context(|| format!("Failed to resolve {}", path.display()))?;
            println!("{}", resolved.display());
            Ok(0)
        }
        SubCmd::Absolute { path } => {
            println!("{}", fs.absolute(&path)?.display());
            Ok(0)
        }
        SubCmd::Up { start, name } => match fs.find_file_recursively_up(&start, &name)? {
            Some(dir) => {
                println!("{}", dir.display());
                Ok(0)
            }
            None => Ok(1),
        },
        SubCmd::Lock {
            path,
            try_only,
            command,
        } => {
            let guard = if try_only {
                fs.try_lock_exclusive(&path)
            } else {
                fs.lock_exclusive(&path)
            }
            .with_context(|| format!("Failed to lock {}", path.display()))?;

            let Some((program, rest)) = command.split_first() else {
                bail!("no command given");
            };
            let status = Command::new(program)
                .args(rest)
                .status()
                .with_context(|| format!("Failed to run {}", program.to_string_lossy()))?;
            guard.unlock().context("Failed to release lock")?;
            Ok(status.code().unwrap_or(1))
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let code = run(Args::parse())?;
    std::process::exit(code);
}
