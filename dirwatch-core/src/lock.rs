//! Single-instance guard.
//!
//! The lock file holds an exclusive `fs2` lock plus the owner's PID. A lock
//! file left behind by a crashed process is not locked any more and is simply
//! taken over. Deleting the lock file from outside asks a running poll loop to
//! stop after its current cycle.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::error::WatchError;

pub struct InstanceGuard {
    file: File,
    path: PathBuf,
}

impl InstanceGuard {
    /// Takes the lock at `path` without blocking.
    pub fn acquire(path: &Path) -> Result<Self, WatchError> {
        debug!(path = %path.display(), "Attempting to acquire instance lock");
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| WatchError::io("open lock file", path, e))?;

        // fs2's method, not the std one of the same name.
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {}
            Err(e) if is_contended(&e) => {
                warn!(path = %path.display(), "Lock file is held by another instance");
                return Err(WatchError::AlreadyRunning(path.to_path_buf()));
            }
            Err(e) => return Err(WatchError::io("lock", path, e)),
        }

        write_pid(&mut file).map_err(|e| WatchError::io("write lock file", path, e))?;
        info!(path = %path.display(), pid = std::process::id(), "Acquired instance lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// False once the lock file has been removed from outside.
    pub fn is_held(&self) -> bool {
        self.path.exists()
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Releasing instance lock");
        // Only our own file: after an external removal another instance may own the path.
        let ours = fs::read_to_string(&self.path)
            .map(|content| content.trim() == std::process::id().to_string())
            .unwrap_or(false);
        if ours {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = ?e, "Failed to remove lock file");
            }
        }
        let _ = FileExt::unlock(&self.file);
    }
}

impl std::fmt::Debug for InstanceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceGuard")
            .field("path", &self.path)
            .finish()
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn write_pid(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_reports_already_running() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dirwatch.lock");

        let guard = InstanceGuard::acquire(&path).unwrap();
        let pid = fs::read_to_string(&path).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());

        let err = InstanceGuard::acquire(&path).unwrap_err();
        assert!(matches!(err, WatchError::AlreadyRunning(_)));
        assert!(guard.is_held());
    }

    #[test]
    fn drop_removes_the_lock_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dirwatch.lock");
        {
            let _guard = InstanceGuard::acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
        assert!(InstanceGuard::acquire(&path).is_ok());
    }

    #[test]
    fn leftover_unlocked_file_is_taken_over() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dirwatch.lock");
        fs::write(&path, "999999\n").unwrap();

        let _guard = InstanceGuard::acquire(&path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap().trim(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn removing_the_file_releases_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dirwatch.lock");
        let guard = InstanceGuard::acquire(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(!guard.is_held());
    }
}
