//! Repository-wide mutual exclusion across threads and processes.
//!
//! Every operation that mutates the working copy runs under this lock.
//! Ownership is a marker file created with exclusive-create semantics,
//! holding {pid, hostname, acquired_at}. A crashed holder leaves its
//! marker behind, so contention inspects the marker and breaks it when
//! it is provably stale: older than the age ceiling, or held by a pid
//! that no longer exists on this host.
//!
//! Breaking an aged-but-alive holder is a documented trade-off: a truly
//! slow operation past the ceiling loses the lock rather than deadlocking
//! every peer forever.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::fsio;

/// Default bound on how long acquire() waits
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(15);

/// Default marker age beyond which the holder is declared stale
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(300);

/// Poll interval while a healthy holder is working
const RETRY_INTERVAL_MS: u64 = 250;

/// Attempts to delete a marker that resists removal (e.g. PermissionDenied)
const FORCE_REMOVE_ATTEMPTS: u32 = 3;

/// Circuit breaker: forced recoveries allowed within one acquire() call.
/// An unresolved underlying cause (filesystem permissions, a respawning
/// holder) must surface as an error instead of looping.
const MAX_FORCED_RECOVERIES: u32 = 3;

/// Marker file payload identifying the holder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMarker {
    pub pid: u32,
    pub host: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockMarker {
    fn for_current_process() -> Self {
        Self {
            pid: std::process::id(),
            host: hostname(),
            acquired_at: Utc::now(),
        }
    }

    fn age(&self) -> Duration {
        (Utc::now() - self.acquired_at).to_std().unwrap_or_default()
    }
}

/// Probes process liveness so the staleness policy is testable without
/// killing real processes.
pub trait ProcessProbe: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;

    /// Best-effort termination; returns whether a signal was delivered.
    fn terminate(&self, pid: u32) -> bool;
}

/// Probe backed by the operating system's process table.
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    #[cfg(unix)]
    fn is_alive(&self, pid: u32) -> bool {
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn is_alive(&self, pid: u32) -> bool {
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/NH"])
            .output()
            .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    #[cfg(unix)]
    fn terminate(&self, pid: u32) -> bool {
        Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn terminate(&self, pid: u32) -> bool {
        Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

enum MarkerState {
    Missing,
    Corrupt,
    Held(LockMarker),
}

/// Cross-process mutex over the working copy.
pub struct RepoMutex {
    marker_path: PathBuf,
    acquire_timeout: Duration,
    stale_after: Duration,
    probe: Arc<dyn ProcessProbe>,
}

impl RepoMutex {
    pub fn new(marker_path: impl AsRef<Path>) -> Self {
        Self::with_probe(marker_path, Arc::new(SystemProbe))
    }

    pub fn with_probe(marker_path: impl AsRef<Path>, probe: Arc<dyn ProcessProbe>) -> Self {
        Self {
            marker_path: marker_path.as_ref().to_path_buf(),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            stale_after: DEFAULT_STALE_AFTER,
            probe,
        }
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn stale_after(mut self, ceiling: Duration) -> Self {
        self.stale_after = ceiling;
        self
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Block until exclusive ownership is obtained, or fail with
    /// `LockTimeout` once the bounded wait elapses.
    ///
    /// Stale and corrupt markers are broken in place and retried
    /// immediately, without burning the timeout budget.
    pub fn acquire(&self) -> Result<RepoMutexGuard> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut forced_recoveries = 0u32;

        loop {
            if self.try_create_marker()? {
                debug!(marker = %self.marker_path.display(), "repository lock acquired");
                return Ok(RepoMutexGuard {
                    marker_path: self.marker_path.clone(),
                });
            }

            match self.read_marker() {
                MarkerState::Missing => {
                    // Holder released between our create attempt and the
                    // read; retry straight away.
                    continue;
                }
                MarkerState::Corrupt => {
                    warn!(
                        marker = %self.marker_path.display(),
                        "repository lock marker unreadable, breaking it"
                    );
                    self.force_recovery(None, &mut forced_recoveries)?;
                }
                MarkerState::Held(marker) if self.is_stale(&marker) => {
                    warn!(
                        pid = marker.pid,
                        host = %marker.host,
                        age_secs = marker.age().as_secs(),
                        "stale repository lock detected, forcing recovery"
                    );
                    self.force_recovery(Some(&marker), &mut forced_recoveries)?;
                }
                MarkerState::Held(marker) => {
                    if Instant::now() >= deadline {
                        debug!(pid = marker.pid, host = %marker.host, "repository lock wait timed out");
                        return Err(Error::LockTimeout(self.acquire_timeout));
                    }
                    std::thread::sleep(Duration::from_millis(RETRY_INTERVAL_MS));
                }
            }
        }
    }

    fn try_create_marker(&self) -> Result<bool> {
        let marker = LockMarker::for_current_process();
        let payload = serde_json::to_vec_pretty(&marker)?;
        fsio::create_exclusive(&self.marker_path, &payload)
    }

    fn read_marker(&self) -> MarkerState {
        match fs::read(&self.marker_path) {
            Ok(raw) => match serde_json::from_slice(&raw) {
                Ok(marker) => MarkerState::Held(marker),
                Err(_) => MarkerState::Corrupt,
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => MarkerState::Missing,
            Err(_) => MarkerState::Corrupt,
        }
    }

    /// A marker is stale when its age exceeds the ceiling, or when it was
    /// taken on this host by a pid that no longer exists. Liveness of a
    /// pid on another host is unknowable here, so only the age rule
    /// applies to foreign markers.
    fn is_stale(&self, marker: &LockMarker) -> bool {
        if marker.age() > self.stale_after {
            return true;
        }
        marker.host == hostname() && !self.probe.is_alive(marker.pid)
    }

    fn force_recovery(&self, marker: Option<&LockMarker>, forced: &mut u32) -> Result<()> {
        if *forced >= MAX_FORCED_RECOVERIES {
            return Err(Error::LockTimeout(self.acquire_timeout));
        }
        *forced += 1;

        if let Some(marker) = marker {
            if marker.host == hostname() && self.probe.is_alive(marker.pid) {
                let delivered = self.probe.terminate(marker.pid);
                debug!(pid = marker.pid, delivered, "terminated stale lock holder");
            }
        }

        self.remove_marker_with_retries()
    }

    fn remove_marker_with_retries(&self) -> Result<()> {
        let mut last_err = None;
        for attempt in 1..=FORCE_REMOVE_ATTEMPTS {
            match fs::remove_file(&self.marker_path) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    warn!(
                        attempt,
                        marker = %self.marker_path.display(),
                        "permission denied removing stale lock marker"
                    );
                    last_err = Some(e);
                    std::thread::sleep(Duration::from_millis(100 * u64::from(attempt)));
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        Err(Error::Io(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "stale lock marker removal failed")
        })))
    }
}

/// Scoped ownership of the repository lock; the marker is removed on every
/// exit path, including panics and early returns.
pub struct RepoMutexGuard {
    marker_path: PathBuf,
}

impl RepoMutexGuard {
    /// Explicit release for callers that want the error, not just the drop.
    pub fn release(self) -> Result<()> {
        let path = self.marker_path.clone();
        std::mem::forget(self);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

impl Drop for RepoMutexGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.marker_path);
    }
}

fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    if let Ok(name) = std::env::var("COMPUTERNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }

    Command::new("hostname")
        .output()
        .ok()
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
