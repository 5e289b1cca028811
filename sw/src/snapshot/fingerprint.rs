//! Working-tree fingerprints
//!
//! Inside a git work tree the fingerprint digests `HEAD`, the porcelain
//! status and the diff against `HEAD`, restricted to the fingerprinted
//! directory, plus path, size and mtime of each untracked file. Elsewhere it falls back to a digest of path, size and mtime
//! over at most `sample_limit` files in walk order. The fallback is
//! best-effort: an edit that preserves both size and mtime goes unnoticed,
//! as does any change beyond the sampled files.

use std::path::Path;
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};
use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

use super::{ExcludeSet, SnapshotError, relative_path};
use crate::config::SnapshotConfig;

/// Computes change-detection fingerprints for a directory
pub struct Fingerprinter {
    excludes: ExcludeSet,
    sample_limit: usize,
}

impl Fingerprinter {
    pub fn from_config(config: &SnapshotConfig) -> Result<Self, SnapshotError> {
        Ok(Self {
            excludes: ExcludeSet::new(&config.exclude)?,
            sample_limit: config.fingerprint_sample_limit,
        })
    }

    /// Fingerprint `dir`, prefixed `git:` or `fs:` by method
    pub async fn compute(&self, dir: &Path) -> Result<String, SnapshotError> {
        debug!(dir = %dir.display(), "compute: called");
        if !dir.is_dir() {
            return Err(SnapshotError::MissingRoot(dir.to_path_buf()));
        }

        if let Some(digest) = git_digest(dir).await {
            return Ok(format!("git:{digest}"));
        }
        debug!("compute: not a git work tree, using metadata digest");
        Ok(format!("fs:{}", self.metadata_digest(dir)?))
    }

    fn metadata_digest(&self, dir: &Path) -> Result<String, SnapshotError> {
        let mut hasher = Sha256::new();

        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.path() == dir || !self.excludes.is_excluded(&relative_path(dir, e.path()), e.file_type().is_dir())
            });

        let mut sampled = 0usize;
        for entry in walker {
            let entry = entry.map_err(|source| SnapshotError::Walk {
                path: dir.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if sampled == self.sample_limit {
                break;
            }

            let metadata = entry.metadata().map_err(|source| SnapshotError::Walk {
                path: entry.path().to_path_buf(),
                source,
            })?;
            hasher.update(relative_path(dir, entry.path()).as_bytes());
            hasher.update(format!("|{}|{}\n", metadata.len(), mtime_nanos(&metadata)).as_bytes());
            sampled += 1;
        }

        debug!(%sampled, "metadata_digest: done");
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Digest of git state for `dir`, or None when git is unusable there
async fn git_digest(dir: &Path) -> Option<String> {
    let head = git(dir, &["rev-parse", "HEAD"]).await?;
    let status = git(dir, &["status", "--porcelain", "--untracked-files=all", "--", "."]).await?;
    let diff = git(dir, &["diff", "HEAD", "--", "."]).await?;
    let untracked = git(dir, &["ls-files", "--others", "--exclude-standard", "-z", "--", "."]).await?;

    let mut hasher = Sha256::new();
    hasher.update(&head);
    hasher.update(b"\0");
    hasher.update(&status);
    hasher.update(b"\0");
    hasher.update(&diff);
    hasher.update(b"\0");
    // Edits to untracked files change neither status nor diff
    for path in untracked.split(|&b| b == 0).filter(|p| !p.is_empty()) {
        let path = String::from_utf8_lossy(path);
        let (len, mtime) = std::fs::metadata(dir.join(path.as_ref()))
            .map(|m| (m.len(), mtime_nanos(&m)))
            .unwrap_or_default();
        hasher.update(path.as_bytes());
        hasher.update(format!("|{len}|{mtime}\n").as_bytes());
    }
    Some(format!("{:x}", hasher.finalize()))
}

fn mtime_nanos(metadata: &std::fs::Metadata) -> u128 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

async fn git(dir: &Path, args: &[&str]) -> Option<Vec<u8>> {
    let output = Command::new("git").arg("-C").arg(dir).args(args).output().await.ok()?;
    if !output.status.success() {
        debug!(?args, "git: command failed");
        return None;
    }
    Some(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn fingerprinter(sample_limit: usize) -> Fingerprinter {
        Fingerprinter::from_config(&SnapshotConfig {
            fingerprint_sample_limit: sample_limit,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_metadata_digest_stable_for_unchanged_tree() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.rs"), "fn a() {}").unwrap();

        let fp = fingerprinter(100);
        let first = fp.metadata_digest(temp.path()).unwrap();
        let second = fp.metadata_digest(temp.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_metadata_digest_changes_when_file_added_or_resized() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.rs"), "fn a() {}").unwrap();
        let fp = fingerprinter(100);
        let before = fp.metadata_digest(temp.path()).unwrap();

        fs::write(temp.path().join("b.rs"), "fn b() {}").unwrap();
        let added = fp.metadata_digest(temp.path()).unwrap();
        assert_ne!(before, added);

        fs::write(temp.path().join("a.rs"), "fn a() { println!(); }").unwrap();
        let resized = fp.metadata_digest(temp.path()).unwrap();
        assert_ne!(added, resized);
    }

    #[test]
    fn test_metadata_digest_ignores_excluded_and_unsampled_files() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.rs"), "fn a() {}").unwrap();
        let fp = fingerprinter(1);
        let before = fp.metadata_digest(temp.path()).unwrap();

        // Beyond the sample limit
        fs::write(temp.path().join("z.rs"), "fn z() {}").unwrap();
        // Excluded by default globs
        fs::create_dir_all(temp.path().join("target")).unwrap();
        fs::write(temp.path().join("target/out"), "bin").unwrap();

        assert_eq!(before, fp.metadata_digest(temp.path()).unwrap());
    }

    #[tokio::test]
    async fn test_compute_outside_git_uses_fs_prefix() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.rs"), "fn a() {}").unwrap();

        let fingerprint = fingerprinter(100).compute(temp.path()).await.unwrap();
        assert!(fingerprint.starts_with("fs:"));
    }

    fn git_available() -> bool {
        std::process::Command::new("git").arg("--version").output().is_ok_and(|o| o.status.success())
    }

    fn run_git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["-c", "user.name=sw", "-c", "user.email=sw@example.com"])
            .args(args)
            .output()
            .unwrap()
            .status;
        assert!(status.success(), "git {args:?} failed");
    }

    #[tokio::test]
    async fn test_git_fingerprint_changes_when_untracked_file_edited() {
        if !git_available() {
            return;
        }
        let temp = tempdir().unwrap();
        run_git(temp.path(), &["init", "-q"]);
        fs::write(temp.path().join("a.rs"), "fn a() {}").unwrap();
        run_git(temp.path(), &["add", "a.rs"]);
        run_git(temp.path(), &["commit", "-q", "-m", "init"]);
        fs::write(temp.path().join("notes.md"), "draft").unwrap();

        let fp = fingerprinter(100);
        let before = fp.compute(temp.path()).await.unwrap();
        assert!(before.starts_with("git:"));
        assert_eq!(before, fp.compute(temp.path()).await.unwrap());

        fs::write(temp.path().join("notes.md"), "a much longer draft").unwrap();
        let after = fp.compute(temp.path()).await.unwrap();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn test_compute_missing_dir() {
        let err = fingerprinter(100).compute(Path::new("/nonexistent/dir")).await.unwrap_err();
        assert!(matches!(err, SnapshotError::MissingRoot(_)));
    }
}
