//! Working-copy repair for corrupted clones.
//!
//! The git tooling can leave zombie helper processes, stale internal lock
//! files, and read-only object files behind after a crash. Repair tears
//! that down so initialization can retry from a clean slate. The store's
//! corruption state machine depends only on the trait, so it is testable
//! with a recording fake instead of real process control.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Attempts at removing the working copy tree
const REMOVE_ATTEMPTS: u32 = 3;

/// Wait between removal attempts and while confirming the tree is gone
const REMOVE_BACKOFF_MS: u64 = 200;

/// Tears down the broken pieces of a working copy.
pub trait WorkingCopyRepairer: Send + Sync {
    /// Best-effort termination of version-control helper processes rooted
    /// at the working copy. Returns whether any signal was delivered.
    fn terminate_helpers(&self, work_dir: &Path) -> bool;

    /// Remove stray internal lock files under `.git/`. Returns how many
    /// were deleted.
    fn remove_stale_git_locks(&self, work_dir: &Path) -> Result<usize>;

    /// Forcibly remove the working copy tree, clearing read-only
    /// attributes as needed.
    fn force_remove_dir(&self, work_dir: &Path) -> Result<()>;
}

/// Repairer backed by the operating system.
pub struct SystemRepairer;

impl WorkingCopyRepairer for SystemRepairer {
    #[cfg(unix)]
    fn terminate_helpers(&self, work_dir: &Path) -> bool {
        // Helper processes (git, git-lfs) carry the working copy path in
        // their command line.
        let pattern = format!("git.*{}", work_dir.display());
        std::process::Command::new("pkill")
            .args(["-f", &pattern])
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn terminate_helpers(&self, _work_dir: &Path) -> bool {
        // No per-path filter available; stale locks and directory removal
        // below still unblock initialization.
        false
    }

    fn remove_stale_git_locks(&self, work_dir: &Path) -> Result<usize> {
        let git_dir = work_dir.join(".git");
        if !git_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        remove_lock_files(&git_dir, &mut removed)?;
        if removed > 0 {
            debug!(removed, git_dir = %git_dir.display(), "removed stale git lock files");
        }
        Ok(removed)
    }

    fn force_remove_dir(&self, work_dir: &Path) -> Result<()> {
        if !work_dir.exists() {
            return Ok(());
        }

        let mut last_err = None;
        for attempt in 1..=REMOVE_ATTEMPTS {
            if let Err(err) = make_tree_writable(work_dir) {
                warn!(attempt, %err, "could not clear read-only attributes");
            }

            match fs::remove_dir_all(work_dir) {
                Ok(()) => {
                    if wait_until_gone(work_dir) {
                        return Ok(());
                    }
                    last_err = Some(io::Error::new(
                        io::ErrorKind::Other,
                        "directory still present after removal",
                    ));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                Err(e) => {
                    warn!(attempt, %e, dir = %work_dir.display(), "working copy removal failed");
                    last_err = Some(e);
                }
            }

            std::thread::sleep(Duration::from_millis(REMOVE_BACKOFF_MS * u64::from(attempt)));
        }

        Err(Error::Io(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "working copy removal failed")
        })))
    }
}

fn remove_lock_files(dir: &Path, removed: &mut usize) -> Result<()> {
    for dirent in fs::read_dir(dir)? {
        let dirent = dirent?;
        let path = dirent.path();
        let file_type = dirent.file_type()?;

        if file_type.is_dir() {
            remove_lock_files(&path, removed)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("lock") {
            match fs::remove_file(&path) {
                Ok(()) => *removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }
    Ok(())
}

fn make_tree_writable(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    make_writable(path, &metadata)?;

    if metadata.is_dir() {
        for dirent in fs::read_dir(path)? {
            let dirent = dirent?;
            make_tree_writable(&dirent.path())?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn make_writable(path: &Path, metadata: &fs::Metadata) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode();
    if mode & 0o200 == 0 {
        fs::set_permissions(path, fs::Permissions::from_mode(mode | 0o700))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_writable(path: &Path, metadata: &fs::Metadata) -> io::Result<()> {
    let mut perms = metadata.permissions();
    if perms.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

fn wait_until_gone(path: &Path) -> bool {
    for _ in 0..10 {
        if !path.exists() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(REMOVE_BACKOFF_MS));
    }
    !path.exists()
}
