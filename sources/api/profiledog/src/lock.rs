//! Advisory lock serializing reconciliation calls against one appliance.

use crate::{error, Result};
use nix::fcntl::{flock, FlockArg};
use snafu::ResultExt;
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Holds an exclusive `flock` on the lock file until dropped.
#[derive(Debug)]
pub struct TargetLock {
    // Closing the file releases the lock.
    _file: File,
    path: PathBuf,
}

impl TargetLock {
    /// Blocks until the lock is available.
    pub fn acquire<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)
            .context(error::LockOpenSnafu { path })?;
        debug!("Waiting for lock on {}", path.display());
        flock(file.as_raw_fd(), FlockArg::LockExclusive).context(error::LockSnafu { path })?;
        trace!("Locked {}", path.display());

        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiledog.lock");

        let lock = TargetLock::acquire(&path).unwrap();
        assert_eq!(lock.path(), path.as_path());

        let other = File::open(&path).unwrap();
        assert!(flock(other.as_raw_fd(), FlockArg::LockExclusiveNonblock).is_err());

        drop(lock);
        assert!(flock(other.as_raw_fd(), FlockArg::LockExclusiveNonblock).is_ok());
    }

    #[test]
    fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TargetLock::acquire(dir.path().join("nope").join("x.lock")).is_err());
    }
}
