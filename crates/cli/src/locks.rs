//! Single-instance lock for the agent
//!
//! The watcher module supports one watch per process, and two agents would
//! race on the config file, so only one agent may run per user.
//!
//! Exclusion comes from an OS advisory lock on the lock file (`flock` on
//! Unix, `LockFileEx` on Windows). The OS drops it when the holder exits,
//! crashed or not, so a file left behind by a dead agent is simply locked
//! again and rewritten.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "dirsentry.lock";

/// Held for the lifetime of a running agent
pub struct InstanceLock {
    path: PathBuf,
    // Closing the handle releases the OS lock
    #[allow(dead_code)]
    file: File,
}

/// Who holds the lock, for error messages
#[derive(Debug, Serialize, Deserialize)]
struct LockOwner {
    pid: u32,
    started_at: u64,
}

impl InstanceLock {
    /// Default lock directory
    pub fn default_dir() -> Option<PathBuf> {
        dirs::runtime_dir()
            .or_else(dirs::data_local_dir)
            .map(|d| d.join("dirsentry"))
    }

    /// Acquire the exclusive agent lock in `lock_dir`
    ///
    /// Fails only while another agent process is alive and holding it.
    pub fn acquire(lock_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(lock_dir).context("Failed to create lock directory")?;
        let lock_path = lock_dir.join(LOCK_FILE);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .context("Failed to open lock file")?;

        if !try_lock_exclusive(&file)? {
            // Windows refuses reads of a locked range, so the owner is best effort
            match read_owner(&mut file) {
                Ok(owner) => anyhow::bail!("Dirsentry is already running (pid {})", owner.pid),
                Err(_) => anyhow::bail!("Dirsentry is already running"),
            }
        }

        if let Ok(previous) = read_owner(&mut file) {
            if previous.pid != std::process::id() {
                tracing::warn!("Reclaiming lock left by exited agent (pid {})", previous.pid);
            }
        }
        write_owner(&mut file)?;

        Ok(Self {
            path: lock_path,
            file,
        })
    }

    /// Release the lock and remove the lock file
    pub fn release(self) -> Result<()> {
        std::fs::remove_file(&self.path).context("Failed to remove lock file")?;
        Ok(())
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn write_owner(file: &mut File) -> Result<()> {
    let owner = LockOwner {
        pid: std::process::id(),
        started_at: chrono::Utc::now().timestamp_millis().max(0) as u64,
    };
    let serialized = serde_json::to_string(&owner).context("Failed to serialize lock owner")?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn read_owner(file: &mut File) -> Result<LockOwner> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).context("Failed to deserialize lock owner")
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> Result<bool> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    let handle = file.as_raw_handle() as HANDLE;
    // Lock the whole file range starting at offset zero
    let mut overlapped: OVERLAPPED = unsafe { std::mem::zeroed() };
    let locked = unsafe {
        LockFileEx(
            handle,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            u32::MAX,
            u32::MAX,
            &mut overlapped,
        )
    };

    if locked != 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
        Ok(false)
    } else {
        Err(err).context("Failed to lock agent lock file")
    }
}

#[cfg(not(any(unix, windows)))]
fn try_lock_exclusive(_file: &File) -> Result<bool> {
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_acquisition() {
        let temp_dir = TempDir::new().unwrap();

        let lock1 = InstanceLock::acquire(temp_dir.path());
        assert!(lock1.is_ok());

        // Second handle in the same process still conflicts
        let lock2 = InstanceLock::acquire(temp_dir.path());
        let err = lock2.err().expect("second lock should fail");
        assert!(err.to_string().contains("already running"));

        drop(lock1);

        let lock3 = InstanceLock::acquire(temp_dir.path());
        assert!(lock3.is_ok());
    }

    #[test]
    fn test_lock_release() {
        let temp_dir = TempDir::new().unwrap();

        let lock = InstanceLock::acquire(temp_dir.path()).unwrap();
        let lock_path = lock.path.clone();
        assert!(lock_path.exists());

        lock.release().unwrap();
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_lock_left_by_crashed_agent_is_reclaimed() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join(LOCK_FILE);

        // A crash leaves the file and its owner record, but no OS lock
        let dead = LockOwner {
            pid: u32::MAX - 1,
            started_at: 1,
        };
        std::fs::write(&lock_path, serde_json::to_string(&dead).unwrap()).unwrap();

        let mut lock = InstanceLock::acquire(temp_dir.path()).unwrap();
        let owner = read_owner(&mut lock.file).unwrap();
        assert_eq!(owner.pid, std::process::id());
        assert!(owner.started_at > 1);
    }

    #[test]
    fn test_garbage_lock_file_is_reclaimed() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(LOCK_FILE), b"not json").unwrap();

        assert!(InstanceLock::acquire(temp_dir.path()).is_ok());
    }
}
