//! Per-artifact checkout registry.
//!
//! A checkout is an advisory exclusive lock on a logical artifact path,
//! independent of the git backend's own state. Records live one JSON file
//! per locked path under `.locks/` in the working copy, so they survive
//! process restarts and can be published through the store for peers to
//! see. Registry operations are plain file I/O and never touch the
//! repository mutex.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::fsio;

/// Records area inside the working copy
pub const RECORDS_DIR: &str = ".locks";

/// Extension of individual checkout records
const RECORD_EXT: &str = "lock";

/// Attempts when an exclusive create races with a corrupted-record cleanup
const CREATE_ATTEMPTS: u32 = 3;

/// An advisory exclusive lock on an artifact path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkout {
    /// Logical artifact path (relative to the working copy)
    pub path: String,

    /// Identity of the holder
    pub user: String,

    /// Optional free-form reason for the checkout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When the checkout was taken
    pub locked_at: DateTime<Utc>,
}

/// A checkout enriched with its elapsed duration, for dashboards and
/// abandonment detection.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutEntry {
    #[serde(flatten)]
    pub checkout: Checkout,
    pub duration_seconds: f64,
}

/// Registry of current checkouts, one record file per locked path.
#[derive(Debug, Clone)]
pub struct CheckoutRegistry {
    records_dir: PathBuf,
}

impl CheckoutRegistry {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            records_dir: work_dir.join(RECORDS_DIR),
        }
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    /// Absolute path of the record file for an artifact path.
    pub fn record_path(&self, path: &str) -> PathBuf {
        self.records_dir
            .join(format!("{}.{RECORD_EXT}", record_key(path)))
    }

    /// Record file path relative to the working copy, for publishing.
    pub fn record_rel_path(&self, path: &str) -> String {
        format!("{RECORDS_DIR}/{}.{RECORD_EXT}", record_key(path))
    }

    /// Take a checkout on `path` for `user`.
    ///
    /// Fails with `AlreadyCheckedOut` when a record exists; the create
    /// itself is exclusive, so two racing callers for the same path leave
    /// exactly one record behind. `force` is reserved for administrative
    /// override and unconditionally overwrites.
    pub fn create(
        &self,
        path: &str,
        user: &str,
        message: Option<String>,
        force: bool,
    ) -> Result<Checkout> {
        let checkout = Checkout {
            path: path.to_string(),
            user: user.to_string(),
            message,
            locked_at: Utc::now(),
        };
        let payload = serde_json::to_vec_pretty(&checkout)?;
        let record = self.record_path(path);

        if force {
            fsio::write_atomic(&record, &payload)?;
            return Ok(checkout);
        }

        for _ in 0..CREATE_ATTEMPTS {
            if fsio::create_exclusive(&record, &payload)? {
                return Ok(checkout);
            }

            // Lost the race, or a record already exists. A readable record
            // names the holder; an unreadable one is discarded by get()
            // and the create retried.
            match self.get(path)? {
                Some(existing) => {
                    return Err(Error::AlreadyCheckedOut {
                        path: path.to_string(),
                        holder: existing.user,
                    });
                }
                None => continue,
            }
        }

        Err(Error::AlreadyCheckedOut {
            path: path.to_string(),
            holder: "unknown".to_string(),
        })
    }

    /// Release the checkout on `path`. Idempotent: a missing record is not
    /// an error.
    pub fn release(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.record_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Current checkout for `path`, or `None`.
    ///
    /// A record that fails to parse is deleted on the spot and reported
    /// absent; the warn log is what distinguishes "never locked" from
    /// "corrupted and discarded".
    pub fn get(&self, path: &str) -> Result<Option<Checkout>> {
        self.load_record(&self.record_path(path))
    }

    /// All current checkouts enriched with elapsed durations. Corrupted
    /// records are discarded and skipped, not surfaced as errors.
    pub fn list(&self) -> Result<Vec<CheckoutEntry>> {
        if !self.records_dir.exists() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut entries = Vec::new();

        for dirent in fs::read_dir(&self.records_dir)? {
            let dirent = dirent?;
            let file = dirent.path();
            if file.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }

            if let Some(checkout) = self.load_record(&file)? {
                let duration = (now - checkout.locked_at)
                    .to_std()
                    .unwrap_or_default()
                    .as_secs_f64();
                entries.push(CheckoutEntry {
                    checkout,
                    duration_seconds: duration,
                });
            }
        }

        entries.sort_by(|a, b| a.checkout.path.cmp(&b.checkout.path));
        Ok(entries)
    }

    fn load_record(&self, file: &Path) -> Result<Option<Checkout>> {
        let raw = match fs::read(file) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        match serde_json::from_slice(&raw) {
            Ok(checkout) => Ok(Some(checkout)),
            Err(err) => {
                warn!(
                    record = %file.display(),
                    %err,
                    "discarding corrupted checkout record"
                );
                let _ = fs::remove_file(file);
                Ok(None)
            }
        }
    }
}

/// Filesystem-safe encoding of an artifact path: alphanumerics, dashes and
/// underscores pass through, everything else becomes '_'.
fn record_key(path: &str) -> String {
    let mut key = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            key.push(ch);
        } else {
            key.push('_');
        }
    }
    if key.is_empty() {
        "_".to_string()
    } else {
        key
    }
}
