//! Codebase snapshots
//!
//! A snapshot is the packed text of a (sub)tree handed to the model as
//! context, plus a short summary. The fingerprint decides whether a stored
//! snapshot is still current.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

mod error;
mod fingerprint;
mod packer;

pub use error::SnapshotError;
pub use fingerprint::Fingerprinter;
pub use packer::WalkdirPacker;

/// Produces packed repository text on demand
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Pack the tree rooted at `dir`
    async fn pack(&self, dir: &Path) -> Result<Snapshot, SnapshotError>;
}

/// Result of packing a tree
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Packed file sections
    pub content: String,

    /// Directory the fingerprint is computed over
    pub fingerprint_input: PathBuf,

    pub summary: SnapshotSummary,
}

/// Short description of a snapshot, shown to the user and the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub file_count: usize,
    pub total_lines: usize,
    pub size_bytes: u64,
    pub sample_files: Vec<String>,
    #[serde(default)]
    pub skipped_files: usize,
    #[serde(default)]
    pub truncated: bool,
}

impl SnapshotSummary {
    /// One-paragraph description for prompts and the terminal
    pub fn describe(&self) -> String {
        let mut text = format!(
            "{} files, {} lines, {} bytes",
            self.file_count, self.total_lines, self.size_bytes
        );
        if !self.sample_files.is_empty() {
            text.push_str(&format!(" (e.g. {})", self.sample_files.join(", ")));
        }
        if self.skipped_files > 0 {
            text.push_str(&format!("; {} files skipped", self.skipped_files));
        }
        if self.truncated {
            text.push_str("; content truncated at the size cap");
        }
        text
    }
}

/// Compiled exclude globs, matched against `/`-separated relative paths
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
}

impl ExcludeSet {
    pub fn new(patterns: &[String]) -> Result<Self, SnapshotError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|source| SnapshotError::InvalidPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Directories also match as `dir/` so `target/**` prunes `target` itself
    pub fn is_excluded(&self, rel: &str, is_dir: bool) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        let as_dir = is_dir.then(|| format!("{rel}/"));
        self.patterns.iter().any(|p| {
            p.matches_with(rel, options) || as_dir.as_deref().is_some_and(|d| p.matches_with(d, options))
        })
    }
}

/// Relative path with `/` separators regardless of platform
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclude_set_prunes_directories() {
        let excludes = ExcludeSet::new(&["target/**".to_string(), "*.lock".to_string()]).unwrap();

        assert!(excludes.is_excluded("target", true));
        assert!(excludes.is_excluded("target/debug/app", false));
        assert!(excludes.is_excluded("Cargo.lock", false));
        assert!(excludes.is_excluded("nested/yarn.lock", false));
        assert!(!excludes.is_excluded("src/target.rs", false));
        assert!(!excludes.is_excluded("src", true));
    }

    #[test]
    fn test_exclude_set_rejects_bad_pattern() {
        let err = ExcludeSet::new(&["[".to_string()]).unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidPattern { .. }));
    }

    #[test]
    fn test_summary_describe() {
        let summary = SnapshotSummary {
            file_count: 2,
            total_lines: 10,
            size_bytes: 120,
            sample_files: vec!["a.rs".to_string(), "b.rs".to_string()],
            skipped_files: 1,
            truncated: false,
        };
        assert_eq!(summary.describe(), "2 files, 10 lines, 120 bytes (e.g. a.rs, b.rs); 1 files skipped");
    }

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = Path::new("/repo");
        assert_eq!(relative_path(root, Path::new("/repo/src/lib.rs")), "src/lib.rs");
        assert_eq!(relative_path(root, root), "");
    }
}
