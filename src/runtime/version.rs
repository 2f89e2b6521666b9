// src/runtime/version.rs

use std::fmt;
use std::str::FromStr;

/// A concrete Python version as reported by an interpreter, e.g. `3.11.4`
/// or `3.13.0rc2`.
///
/// Ordering compares release segments numerically, so `3.10` sorts above
/// `3.9`. The raw text is kept for display and as a tie-breaker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PythonVersion {
    raw: String,
    release: Vec<u32>,
}

impl PythonVersion {
    pub fn release(&self) -> &[u32] {
        &self.release
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for PythonVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let release = parse_release(s)?;
        Ok(Self {
            raw: s.trim().to_string(),
            release,
        })
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for PythonVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.release
            .cmp(&other.release)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for PythonVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A requested version specifier from configuration or `--python`, e.g.
/// `3` or `3.9`.
///
/// A specifier matches any installed version whose release starts with the
/// specifier's segments: `3.9` matches `3.9.18` but not `3.19.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionSpec {
    raw: String,
    release: Vec<u32>,
}

impl VersionSpec {
    pub fn release(&self) -> &[u32] {
        &self.release
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, version: &PythonVersion) -> bool {
        version.release().starts_with(&self.release)
    }
}

impl FromStr for VersionSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let release = parse_release(s)?;
        Ok(Self {
            raw: s.trim().to_string(),
            release,
        })
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse dotted release segments, tolerating a pre/post suffix on the last
/// segment (`3.13.0rc2` yields `[3, 13, 0]`).
fn parse_release(s: &str) -> Result<Vec<u32>, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("empty version string".to_string());
    }

    let mut release = Vec::new();
    for segment in trimmed.split('.') {
        let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            break;
        }
        let number = digits
            .parse::<u32>()
            .map_err(|e| format!("invalid version segment '{segment}': {e}"))?;
        release.push(number);
        if digits.len() != segment.len() {
            // Suffix like `rc2` or `b1`; release segments stop here.
            break;
        }
    }

    if release.is_empty() {
        return Err(format!("no numeric release segments in '{trimmed}'"));
    }
    Ok(release)
}
