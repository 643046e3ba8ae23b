//! Cache-flush coordinator: `sync`, then ask the kernel to drop page/dentry/inode caches.
//!
//! Dropping caches is machine-wide and cannot be undone or scoped to this process.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::error::FlushError;

pub const DROP_CACHES_PATH: &str = "/proc/sys/vm/drop_caches";

/// Environment variable holding the sudo password piped to `sudo -S`.
pub const SUDO_PASSWORD_ENV: &str = "PERF_BENCH_SUDO_PASSWORD";

/// `3` = free page cache plus dentries and inodes.
const DROP_ALL: &str = "3";

/// The control file arrives as `$1`, never spliced into the script text.
const DROP_SCRIPT: &str = "echo 3 > \"$1\"";

#[derive(Clone)]
pub struct CacheFlusher {
    credential: Option<String>,
    control_file: PathBuf,
}

impl std::fmt::Debug for CacheFlusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFlusher")
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("control_file", &self.control_file)
            .finish()
    }
}

impl Default for CacheFlusher {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CacheFlusher {
    /// With a credential the drop goes through `sudo -S`; without one the control file is
    /// written directly, which only works as root.
    pub fn new(credential: Option<String>) -> Self {
        Self {
            credential,
            control_file: PathBuf::from(DROP_CACHES_PATH),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var(SUDO_PASSWORD_ENV).ok())
    }

    pub fn with_control_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.control_file = path.into();
        self
    }

    pub fn flush(&self) -> Result<(), FlushError> {
        sync_filesystems()?;
        self.drop_caches()
    }

    /// Like [`CacheFlusher::flush`], but a refused cache drop is logged and swallowed.
    /// Returns whether the caches were actually dropped.
    pub fn flush_or_warn(&self) -> Result<bool, FlushError> {
        match self.flush() {
            Ok(()) => Ok(true),
            Err(FlushError::Denied { diagnostic }) => {
                warn!(%diagnostic, "could not drop OS caches; measuring with warm caches");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn drop_caches(&self) -> Result<(), FlushError> {
        match &self.credential {
            Some(password) => self.drop_caches_sudo(password),
            None => fs::write(&self.control_file, DROP_ALL).map_err(|e| FlushError::Denied {
                diagnostic: format!("{}: {e}", self.control_file.display()),
            }),
        }?;
        debug!(path = %self.control_file.display(), "dropped OS caches");
        Ok(())
    }

    fn sudo_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-S", "-p", "", "sh", "-c", DROP_SCRIPT, "sh"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(self.control_file.clone().into_os_string());
        args
    }

    fn drop_caches_sudo(&self, password: &str) -> Result<(), FlushError> {
        let mut child = Command::new("sudo")
            .args(self.sudo_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FlushError::Denied {
                diagnostic: format!("failed to run sudo: {e}"),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // sudo may exit before reading; a broken pipe shows up in its status below.
            let _ = writeln!(stdin, "{password}");
        }

        let output = child.wait_with_output().map_err(|e| FlushError::Denied {
            diagnostic: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(FlushError::Denied {
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Force all buffered filesystem writes to durable storage.
pub fn sync_filesystems() -> Result<(), FlushError> {
    let status = Command::new("sync").status().map_err(FlushError::Sync)?;
    if !status.success() {
        return Err(FlushError::Sync(std::io::Error::other(format!(
            "sync exited with {status}"
        ))));
    }
    Ok(())
}

/// Flush using the credential from [`SUDO_PASSWORD_ENV`], if set.
pub fn flush_os_cache() -> Result<(), FlushError> {
    CacheFlusher::from_env().flush()
}
