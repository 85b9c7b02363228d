use anyhow::{Context, Result};
use ccmup_core::InstallError;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::fs_utils::unix_now;
use crate::interrupt::{self, InterruptRegistration};
use crate::InstallLayout;

/// Best-effort description of the process holding the install lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockOwner {
    pub pid: Option<u32>,
    pub host: Option<String>,
    pub started_at_unix: Option<u64>,
    pub exe: Option<String>,
}

impl LockOwner {
    pub fn current() -> Self {
        Self {
            pid: Some(std::process::id()),
            host: hostname(),
            started_at_unix: Some(unix_now()),
            exe: std::env::current_exe()
                .ok()
                .map(|path| path.display().to_string()),
        }
    }

    fn render(&self) -> String {
        let mut payload = String::new();
        if let Some(pid) = self.pid {
            payload.push_str(&format!("pid={pid}\n"));
        }
        if let Some(host) = &self.host {
            payload.push_str(&format!("host={host}\n"));
        }
        if let Some(started) = self.started_at_unix {
            payload.push_str(&format!("started_at_unix={started}\n"));
        }
        if let Some(exe) = &self.exe {
            payload.push_str(&format!("exe={exe}\n"));
        }
        payload
    }

    pub(crate) fn parse(raw: &str) -> Self {
        let mut owner = Self::default();
        for line in raw.lines().map(str::trim) {
            let Some((k, v)) = line.split_once('=') else {
                continue;
            };
            match k {
                "pid" => owner.pid = v.parse().ok(),
                "host" => owner.host = Some(v.to_string()),
                "started_at_unix" => owner.started_at_unix = v.parse().ok(),
                "exe" => owner.exe = Some(v.to_string()),
                _ => {}
            }
        }
        owner
    }

    pub fn is_local_host(&self) -> bool {
        match (&self.host, hostname()) {
            (Some(recorded), Some(local)) => *recorded == local,
            _ => true,
        }
    }
}

impl fmt::Display for LockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "pid {pid}")?,
            None => f.write_str("unknown pid")?,
        }
        if let Some(host) = &self.host {
            write!(f, " on {host}")?;
        }
        if let Some(started) = self.started_at_unix {
            write!(f, " since {started}")?;
        }
        Ok(())
    }
}

/// Exclusive hold on an install root; released when dropped.
#[derive(Debug)]
pub struct InstallLock {
    path: PathBuf,
    registration: Option<InterruptRegistration>,
    released: bool,
}

impl InstallLock {
    pub fn acquire(layout: &InstallLayout) -> Result<Self> {
        fs::create_dir_all(layout.root())
            .with_context(|| format!("failed to create install root: {}", layout.root().display()))?;

        let path = layout.lock_path();
        match fs::create_dir(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(InstallError::InstallInProgress {
                    owner: read_lock_owner(layout).map(|owner| owner.to_string()),
                    lock: path,
                }
                .into());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to create install lock: {}", path.display()));
            }
        }

        let owner_path = layout.lock_owner_path();
        if let Err(err) = fs::write(&owner_path, LockOwner::current().render()) {
            warn!(path = %owner_path.display(), "failed to record install lock owner: {err}");
        }
        let registration = interrupt::register(&path, &owner_path);
        debug!(lock = %path.display(), "install lock acquired");

        Ok(Self {
            path,
            registration,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if let Some(registration) = self.registration.take() {
            interrupt::unregister(&registration);
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to remove install lock: {}", self.path.display())
                })
            }
        }
        debug!(lock = %self.path.display(), "install lock released");
        Ok(())
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(err) = self.release_inner() {
            warn!("{err:#}");
        }
    }
}

pub fn read_lock_owner(layout: &InstallLayout) -> Option<LockOwner> {
    fs::read_to_string(layout.lock_owner_path())
        .ok()
        .map(|raw| LockOwner::parse(&raw))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    Free,
    Held {
        owner: Option<LockOwner>,
        owner_alive: Option<bool>,
    },
}

pub fn inspect_lock(layout: &InstallLayout) -> LockState {
    if fs::symlink_metadata(layout.lock_path()).is_err() {
        return LockState::Free;
    }
    let owner = read_lock_owner(layout);
    let owner_alive = owner.as_ref().and_then(owner_liveness);
    LockState::Held { owner, owner_alive }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    NotLocked,
    Removed { owner: Option<LockOwner> },
    OwnerAlive { owner: LockOwner },
    OwnerUnknown,
}

/// Removes a stale install lock. Without `force` the lock is kept unless its owner is known dead.
pub fn unlock(layout: &InstallLayout, force: bool) -> Result<UnlockOutcome> {
    let owner = match inspect_lock(layout) {
        LockState::Free => return Ok(UnlockOutcome::NotLocked),
        LockState::Held { owner, owner_alive } if !force => match (owner, owner_alive) {
            (owner, Some(false)) => owner,
            (Some(owner), Some(true)) => return Ok(UnlockOutcome::OwnerAlive { owner }),
            _ => return Ok(UnlockOutcome::OwnerUnknown),
        },
        LockState::Held { owner, .. } => owner,
    };

    let path = layout.lock_path();
    fs::remove_dir_all(&path)
        .with_context(|| format!("failed to remove install lock: {}", path.display()))?;
    Ok(UnlockOutcome::Removed { owner })
}

// `None` when liveness cannot be decided from here (another host, no pid).
fn owner_liveness(owner: &LockOwner) -> Option<bool> {
    if !owner.is_local_host() {
        return None;
    }
    owner.pid.map(is_pid_alive)
}

pub(crate) fn is_pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    #[cfg(unix)]
    {
        // SAFETY: signal 0 only checks for process existence.
        let result = unsafe { libc::kill(pid, 0) };
        if result == 0 {
            return true;
        }
        io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

fn hostname() -> Option<String> {
    #[cfg(unix)]
    {
        let mut buf = [0_u8; 256];
        // SAFETY: the buffer is valid for `buf.len()` bytes.
        let result = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
        if result != 0 {
            return None;
        }
        let end = buf.iter().position(|byte| *byte == 0).unwrap_or(buf.len());
        let name = String::from_utf8_lossy(&buf[..end]).trim().to_string();
        (!name.is_empty()).then_some(name)
    }
    #[cfg(not(unix))]
    {
        std::env::var("COMPUTERNAME").ok()
    }
}
