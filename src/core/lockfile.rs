//! Run lock — mutual exclusion for the scheduled runner.
//!
//! The lock is a file created with `create_new` holding the owner's PID.
//! A held lock whose owner is no longer alive (no `/proc/<pid>` entry)
//! is reclaimed; an unreadable PID is treated as a live owner.

use std::io::Write;
use std::path::{Path, PathBuf};

/// Holds the lock for the lifetime of a run; removed on drop.
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Try to acquire the lock. Returns `Ok(None)` when another live process
/// holds it — the caller should skip, not queue.
pub fn acquire(path: &Path) -> Result<Option<LockGuard>, String> {
    match try_create(path)? {
        Some(guard) => Ok(Some(guard)),
        None => {
            if holder_alive(path) {
                return Ok(None);
            }
            // Stale lock from a dead process
            std::fs::remove_file(path)
                .map_err(|e| format!("cannot remove stale lock {}: {}", path.display(), e))?;
            try_create(path)
        }
    }
}

fn try_create(path: &Path) -> Result<Option<LockGuard>, String> {
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(mut file) => {
            let _ = write!(file, "{}", std::process::id());
            Ok(Some(LockGuard {
                path: path.to_path_buf(),
            }))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(format!("cannot create lock {}: {}", path.display(), e)),
    }
}

fn holder_alive(path: &Path) -> bool {
    let pid = match std::fs::read_to_string(path) {
        Ok(content) => match content.trim().parse::<u32>() {
            Ok(pid) => pid,
            Err(_) => return true,
        },
        Err(_) => return true,
    };
    Path::new(&format!("/proc/{}", pid)).exists()
}
