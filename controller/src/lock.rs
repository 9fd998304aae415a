// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Advisory file locks serializing tool instances.

use crate::Error;
use nix::errno::Errno;
use nix::fcntl::Flock;
use nix::fcntl::FlockArg;
use std::fs::File;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::path::PathBuf;

/// The lock held around a command's execution.
pub const EXECUTE_LOCK_NAME: &str = "op_execute_lock";

/// The lock held while appending to the operation log.
pub const OP_LOG_LOCK_NAME: &str = "op_log";

/// An exclusive `flock` on a file in the lock directory.
///
/// The lock is released when this is dropped, including while unwinding.
#[derive(Debug)]
pub struct FileLock {
    _lock: Flock<File>,
    path: PathBuf,
}

fn open_lock_file(dir: &Path, name: &str) -> Result<(File, PathBuf), Error> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o600)
        .open(&path)?;
    Ok((file, path))
}

impl FileLock {
    /// Block until the lock `name` in `dir` is held, creating both on demand.
    pub fn acquire(dir: &Path, name: &str) -> Result<Self, Error> {
        let (file, path) = open_lock_file(dir, name)?;
        let lock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, e)| Error::Lock(e))?;
        Ok(Self { _lock: lock, path })
    }

    /// Take the lock `name` in `dir` if it is free.
    pub fn try_acquire(dir: &Path, name: &str) -> Result<Option<Self>, Error> {
        let (file, path) = open_lock_file(dir, name)?;
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => Ok(Some(Self { _lock: lock, path })),
            Err((_, Errno::EWOULDBLOCK)) => Ok(None),
            Err((_, e)) => Err(Error::Lock(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::FileLock;
    use super::EXECUTE_LOCK_NAME;

    #[test]
    fn test_lock_excludes_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let locks = dir.path().join("locks");
        let held = FileLock::acquire(&locks, EXECUTE_LOCK_NAME).unwrap();
        assert_eq!(held.path(), locks.join(EXECUTE_LOCK_NAME));
        assert!(FileLock::try_acquire(&locks, EXECUTE_LOCK_NAME)
            .unwrap()
            .is_none());
        drop(held);
        assert!(FileLock::try_acquire(&locks, EXECUTE_LOCK_NAME)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_lock_released_on_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let result = std::panic::catch_unwind(|| {
            let _lock = FileLock::acquire(&path, EXECUTE_LOCK_NAME).unwrap();
            panic!("command failed");
        });
        assert!(result.is_err());
        assert!(FileLock::try_acquire(dir.path(), EXECUTE_LOCK_NAME)
            .unwrap()
            .is_some());
    }
}
