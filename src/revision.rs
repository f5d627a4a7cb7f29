//! Revision numbering for artifact metadata.
//!
//! Revisions are "MAJOR.MINOR" strings tracked in side-car metadata,
//! independent of commit hashes. A major bump resets the minor counter;
//! an explicit major value overrides the automatic increment.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A MAJOR.MINOR revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision {
    pub major: u32,
    pub minor: u32,
}

impl Revision {
    pub const ZERO: Revision = Revision { major: 0, minor: 0 };

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse leniently: anything that is not "MAJOR.MINOR" yields `None`.
    pub fn parse(raw: &str) -> Option<Revision> {
        let (major, minor) = raw.trim().split_once('.')?;
        Some(Revision {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Revision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Revision::parse(s)
            .ok_or_else(|| Error::InvalidArgument(format!("Invalid revision '{s}'. Expected MAJOR.MINOR")))
    }
}

/// Kind of revision bump requested at check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionKind {
    Major,
    Minor,
}

impl RevisionKind {
    /// "major" selects a major bump; anything else is a minor bump.
    pub fn from_request(raw: &str) -> RevisionKind {
        if raw.trim().eq_ignore_ascii_case("major") {
            RevisionKind::Major
        } else {
            RevisionKind::Minor
        }
    }
}

impl fmt::Display for RevisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionKind::Major => write!(f, "major"),
            RevisionKind::Minor => write!(f, "minor"),
        }
    }
}

/// Compute the next revision.
///
/// `current` is parsed as "MAJOR.MINOR" and falls back to 0.0 when absent
/// or unparseable. A major bump resets MINOR to 0 and takes `explicit_major`
/// when it is numeric, otherwise MAJOR+1. A minor bump leaves MAJOR alone.
pub fn increment(current: Option<&str>, kind: RevisionKind, explicit_major: Option<&str>) -> Revision {
    let current = current.and_then(Revision::parse).unwrap_or(Revision::ZERO);

    match kind {
        RevisionKind::Major => {
            let major = explicit_major
                .and_then(|raw| raw.trim().parse::<u32>().ok())
                .unwrap_or(current.major + 1);
            Revision::new(major, 0)
        }
        RevisionKind::Minor => Revision::new(current.major, current.minor + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        assert_eq!(Revision::parse("3.14"), Some(Revision::new(3, 14)));
        assert_eq!(Revision::new(5, 0).to_string(), "5.0");
        assert_eq!(Revision::parse("garbage"), None);
        assert_eq!(Revision::parse("1.2.3"), None);
        assert_eq!(Revision::parse(""), None);
    }

    #[test]
    fn minor_increments_minor_only() {
        let rev = increment(Some("5.0"), RevisionKind::Minor, None);
        assert_eq!(rev.to_string(), "5.1");
    }

    #[test]
    fn major_resets_minor() {
        let rev = increment(Some("5.1"), RevisionKind::Major, None);
        assert_eq!(rev.to_string(), "6.0");
    }

    #[test]
    fn explicit_major_wins_when_numeric() {
        let rev = increment(Some("0.0"), RevisionKind::Major, Some("5"));
        assert_eq!(rev.to_string(), "5.0");

        let rev = increment(Some("3.7"), RevisionKind::Major, Some("not a number"));
        assert_eq!(rev.to_string(), "4.0");
    }

    #[test]
    fn absent_or_unparseable_starts_at_zero() {
        assert_eq!(increment(None, RevisionKind::Minor, None).to_string(), "0.1");
        assert_eq!(
            increment(Some("corrupt"), RevisionKind::Minor, None).to_string(),
            "0.1"
        );
    }

    #[test]
    fn major_then_minor_lands_on_dot_one() {
        let bumped = increment(Some("2.9"), RevisionKind::Major, None);
        let next = increment(Some(&bumped.to_string()), RevisionKind::Minor, None);
        assert_eq!(next, Revision::new(bumped.major, 1));
    }

    #[test]
    fn kind_from_request() {
        assert_eq!(RevisionKind::from_request("major"), RevisionKind::Major);
        assert_eq!(RevisionKind::from_request("MAJOR"), RevisionKind::Major);
        assert_eq!(RevisionKind::from_request("minor"), RevisionKind::Minor);
        assert_eq!(RevisionKind::from_request("anything"), RevisionKind::Minor);
    }
}
