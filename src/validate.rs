//! Artifact naming and content validation.
//!
//! Shop naming policy: artifact stems are a 7-digit part number with an
//! optional `_` + 1-3 uppercase letters + 1-3 digits operation suffix.
//! Link names are stricter: the suffix, when present, is exactly 3 letters
//! and 3 digits, and link names never carry an extension.

use std::path::Path;

use crate::error::{Error, Result};

/// Maximum artifact stem length (before the extension)
pub const MAX_STEM_LEN: usize = 15;

/// Maximum link name length: 7 digits + '_' + 3 letters + 3 digits
pub const MAX_LINK_LEN: usize = 13;

/// Content signatures for artifact types that have one.
/// `.mcam` files are HDF5 containers; both commercial and HLE builds are accepted.
const MCAM_SIGNATURES: [&[u8]; 2] = [b"\x89HDF\r\n\x1a\n", b"\x89HDF\x01\x02\x03\x04"];

/// Validate a regular artifact filename (with extension).
pub fn validate_artifact_name(filename: &str, allowed_extensions: &[String]) -> Result<()> {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let extension = extension_of(filename);
    if extension.is_empty() || extension == ".link" {
        return Err(Error::InvalidName(format!(
            "'{filename}' must have an artifact extension"
        )));
    }
    if !allowed_extensions.iter().any(|allowed| *allowed == extension) {
        return Err(Error::InvalidName(format!(
            "extension '{extension}' is not allowed"
        )));
    }

    if stem.len() > MAX_STEM_LEN {
        return Err(Error::InvalidName(format!(
            "filename stem cannot exceed {MAX_STEM_LEN} characters"
        )));
    }

    if !stem_matches(stem, 1, 3, 1, 3) {
        return Err(Error::InvalidName(format!(
            "'{stem}' must follow the format 7digits or 7digits_1-3LETTERS1-3digits (e.g., 1234567_AB123)"
        )));
    }

    Ok(())
}

/// Validate a link name (no extension allowed).
pub fn validate_link_name(name: &str) -> Result<()> {
    if name.contains('.') {
        return Err(Error::InvalidName(
            "link names cannot have file extensions".to_string(),
        ));
    }

    if name.len() > MAX_LINK_LEN {
        return Err(Error::InvalidName(format!(
            "link name cannot exceed {MAX_LINK_LEN} characters"
        )));
    }

    if !stem_matches(name, 3, 3, 3, 3) {
        return Err(Error::InvalidName(format!(
            "'{name}' must follow the format 7digits or 7digits_3LETTERS3digits (e.g., 1234567_ABC123)"
        )));
    }

    Ok(())
}

/// Check the file content against the magic signature for its type.
///
/// Types without a registered signature are trusted on extension alone.
pub fn validate_content_signature(filename: &str, content: &[u8]) -> Result<()> {
    if extension_of(filename) != ".mcam" {
        return Ok(());
    }

    if MCAM_SIGNATURES.iter().any(|sig| content.starts_with(sig)) {
        return Ok(());
    }

    Err(Error::InvalidArgument(format!(
        "content of '{filename}' does not match the expected file signature"
    )))
}

/// Lowercased extension including the dot, or "" when absent.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Match `7digits` optionally followed by `_`, `letters_min..=letters_max`
/// uppercase letters, and `digits_min..=digits_max` digits.
fn stem_matches(
    stem: &str,
    letters_min: usize,
    letters_max: usize,
    digits_min: usize,
    digits_max: usize,
) -> bool {
    let bytes = stem.as_bytes();
    if bytes.len() < 7 || !bytes[..7].iter().all(u8::is_ascii_digit) {
        return false;
    }

    let rest = &bytes[7..];
    if rest.is_empty() {
        return true;
    }
    if rest[0] != b'_' {
        return false;
    }

    let suffix = &rest[1..];
    let letters = suffix.iter().take_while(|b| b.is_ascii_uppercase()).count();
    if !(letters_min..=letters_max).contains(&letters) {
        return false;
    }

    let digits = &suffix[letters..];
    (digits_min..=digits_max).contains(&digits.len()) && digits.iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec![".mcam".to_string(), ".vnc".to_string(), ".emcam".to_string()]
    }

    #[test]
    fn accepts_standard_names() {
        assert!(validate_artifact_name("1234567.mcam", &allowed()).is_ok());
        assert!(validate_artifact_name("1234567_AB123.mcam", &allowed()).is_ok());
        assert!(validate_artifact_name("1234567_A1.vnc", &allowed()).is_ok());
    }

    #[test]
    fn rejects_bad_stems() {
        assert!(validate_artifact_name("123456.mcam", &allowed()).is_err());
        assert!(validate_artifact_name("1234567_abc12.mcam", &allowed()).is_err());
        assert!(validate_artifact_name("1234567-AB123.mcam", &allowed()).is_err());
        assert!(validate_artifact_name("1234567_ABCD123.mcam", &allowed()).is_err());
        assert!(validate_artifact_name("toolong12345678.mcam", &allowed()).is_err());
    }

    #[test]
    fn rejects_bad_extensions() {
        assert!(validate_artifact_name("1234567", &allowed()).is_err());
        assert!(validate_artifact_name("1234567.exe", &allowed()).is_err());
        assert!(validate_artifact_name("1234567.link", &allowed()).is_err());
    }

    #[test]
    fn link_names_are_strict() {
        assert!(validate_link_name("1234567").is_ok());
        assert!(validate_link_name("1234567_ABC123").is_ok());
        assert!(validate_link_name("1234567_AB123").is_err());
        assert!(validate_link_name("1234567.link").is_err());
        assert!(validate_link_name("12345678_ABC123").is_err());
    }

    #[test]
    fn mcam_signature_checked() {
        let mut good = b"\x89HDF\r\n\x1a\n".to_vec();
        good.extend_from_slice(&[0u8; 64]);
        assert!(validate_content_signature("1234567.mcam", &good).is_ok());

        assert!(validate_content_signature("1234567.mcam", b"not an hdf file").is_err());
        // Types without signatures are trusted on extension
        assert!(validate_content_signature("1234567.vnc", b"anything").is_ok());
    }
}
