// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Patterns always excluded from watching, regardless of configuration:
/// the managed environment tree, version control, and Python caches.
pub const BUILTIN_IGNORES: &[&str] = &[
    ".jobx",
    ".jobx/**",
    ".git",
    ".git/**",
    "**/__pycache__",
    "**/__pycache__/**",
    "**/*.pyc",
];

/// Compiled ignore patterns for watch mode.
///
/// The patterns are evaluated against paths relative to the project root,
/// with forward slashes (e.g. `"src/jobx/core.py"`).
#[derive(Clone)]
pub struct IgnoreProfile {
    set: GlobSet,
}

impl fmt::Debug for IgnoreProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreProfile").finish_non_exhaustive()
    }
}

impl IgnoreProfile {
    /// Compile the built-in ignores plus any configured extras.
    pub fn build(extra: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in BUILTIN_IGNORES.iter().copied() {
            builder.add(Glob::new(pattern).context("invalid built-in glob pattern")?);
        }
        for pattern in extra {
            let glob = Glob::new(pattern)
                .with_context(|| format!("invalid watch_exclude pattern: {pattern}"))?;
            builder.add(glob);
        }
        Ok(Self {
            set: builder.build()?,
        })
    }

    /// True when a change to this path should be discarded.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        self.set.is_match(rel_path)
    }
}
