use std::fs::{File, OpenOptions};
use crate::core::error::{IndexError, Result};
use crate::storage::layout::StorageLayout;

/// Single writer guarantee
pub struct FileLock {
    pub file: File,
}

impl FileLock {
    /// Takes the exclusive write lock, failing fast if another writer holds it.
    pub fn acquire(storage: &StorageLayout) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(storage.lock_path())?;

        // Platform-specific locking
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_NB};

            let fd = file.as_raw_fd();
            // SAFETY: fd is a valid descriptor owned by `file` for the duration of the call.
            let rc = unsafe { flock(fd, LOCK_EX | LOCK_NB) };
            if rc != 0 {
                return Err(IndexError::WriterLocked {
                    path: storage.base_dir.clone(),
                });
            }
        }

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            // SAFETY: see `acquire`.
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}
