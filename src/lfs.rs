//! Git LFS pointer handling and on-demand content retrieval.
//!
//! Artifacts live in LFS; the working copy holds lightweight pointer files
//! until a user actually opens one. Pulls are always scoped to a single
//! path so network and disk cost stay bounded to the artifacts in use.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::{Error, Result};

/// Pointer files are tiny; anything at or above this size is real content.
pub const POINTER_SIZE_CEILING: u64 = 1024;

/// First line of every LFS pointer file
const POINTER_SIGNATURE: &[u8] = b"version https://git-lfs.github.com/spec/v1";

/// Cheap heuristic: small file beginning with the pointer signature.
/// A missing file is simply not a pointer.
pub fn is_pointer(path: &Path) -> Result<bool> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::Io(e)),
    };

    if !metadata.is_file() || metadata.len() >= POINTER_SIZE_CEILING {
        return Ok(false);
    }

    let mut head = [0u8; POINTER_SIGNATURE.len()];
    let mut file = File::open(path)?;
    let read = file.read(&mut head)?;

    Ok(read == head.len() && head == *POINTER_SIGNATURE)
}

/// Materialize full content for a single pointer file.
///
/// Runs `git lfs pull` scoped to exactly `rel_path`; the empty exclude
/// overrides any repository-wide fetchexclude.
pub fn pull_file(work_dir: &Path, rel_path: &str, allow_insecure: bool) -> Result<()> {
    debug!(path = rel_path, "pulling LFS content");

    let mut command = Command::new("git");
    command
        .args(["lfs", "pull", "--include", rel_path, "--exclude", ""])
        .current_dir(work_dir);
    if allow_insecure {
        command.env("GIT_SSL_NO_VERIFY", "true");
    }

    let output = command.output()?;
    if !output.status.success() {
        return Err(Error::OperationFailed(format!(
            "git lfs pull failed for {rel_path}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(())
}

/// Configure a freshly opened working copy for on-demand retrieval: bulk
/// fetches exclude everything, so only explicit single-path pulls download
/// content.
pub fn configure_on_demand(repo: &git2::Repository) -> Result<()> {
    let mut config = repo.config()?;
    config.set_str("lfs.fetchexclude", "*")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn pointer_body() -> Vec<u8> {
        let mut body = POINTER_SIGNATURE.to_vec();
        body.extend_from_slice(
            b"\noid sha256:4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393\nsize 12345\n",
        );
        body
    }

    #[test]
    fn small_signed_file_is_pointer() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("1234567.mcam");
        fs::write(&path, pointer_body()).unwrap();

        assert!(is_pointer(&path).unwrap());
    }

    #[test]
    fn ordinary_binary_is_not_pointer() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("1234567.mcam");
        fs::write(&path, vec![0x89u8; 4096]).unwrap();

        assert!(!is_pointer(&path).unwrap());
    }

    #[test]
    fn small_unsigned_file_is_not_pointer() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("note.txt");
        fs::write(&path, b"just a tiny file").unwrap();

        assert!(!is_pointer(&path).unwrap());
    }

    #[test]
    fn large_file_with_signature_prefix_is_not_pointer() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("odd.bin");
        let mut body = pointer_body();
        body.resize(POINTER_SIZE_CEILING as usize + 1, b'x');
        fs::write(&path, body).unwrap();

        assert!(!is_pointer(&path).unwrap());
    }

    #[test]
    fn missing_file_is_not_pointer() {
        let temp = TempDir::new().unwrap();
        assert!(!is_pointer(&temp.path().join("absent.mcam")).unwrap());
    }
}
