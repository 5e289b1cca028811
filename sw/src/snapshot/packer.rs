//! WalkdirPacker - default snapshot provider

use std::fs;
use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{ExcludeSet, Snapshot, SnapshotError, SnapshotProvider, SnapshotSummary, relative_path};
use crate::config::SnapshotConfig;

/// Number of paths listed in the summary
const SAMPLE_FILES: usize = 20;

/// Bytes inspected when sniffing for binary content
const BINARY_SNIFF_BYTES: usize = 8192;

/// Packs a tree into `<file path="...">` sections
pub struct WalkdirPacker {
    excludes: ExcludeSet,
    max_file_bytes: u64,
    max_total_bytes: u64,
}

impl WalkdirPacker {
    pub fn from_config(config: &SnapshotConfig) -> Result<Self, SnapshotError> {
        Ok(Self {
            excludes: ExcludeSet::new(&config.exclude)?,
            max_file_bytes: config.max_file_bytes,
            max_total_bytes: config.max_total_bytes,
        })
    }

    fn pack_sync(&self, dir: &Path) -> Result<Snapshot, SnapshotError> {
        if !dir.is_dir() {
            return Err(SnapshotError::MissingRoot(dir.to_path_buf()));
        }

        let mut content = String::new();
        let mut summary = SnapshotSummary::default();

        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.path() == dir || !self.excludes.is_excluded(&relative_path(dir, e.path()), e.file_type().is_dir())
            });

        for entry in walker {
            let entry = entry.map_err(|source| SnapshotError::Walk {
                path: dir.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let rel = relative_path(dir, path);
            let io_err = |source| SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            };
            let size = entry
                .metadata()
                .map_err(|source| SnapshotError::Walk {
                    path: path.to_path_buf(),
                    source,
                })?
                .len();

            if size > self.max_file_bytes {
                debug!(%rel, %size, "pack: file over size cap, skipping");
                summary.skipped_files += 1;
                continue;
            }
            if summary.size_bytes + size > self.max_total_bytes {
                debug!(%rel, "pack: total size cap reached");
                summary.truncated = true;
                summary.skipped_files += 1;
                continue;
            }

            let mut bytes = Vec::with_capacity(size as usize);
            fs::File::open(path)
                .and_then(|mut f| f.read_to_end(&mut bytes))
                .map_err(io_err)?;
            if bytes.iter().take(BINARY_SNIFF_BYTES).any(|b| *b == 0) {
                debug!(%rel, "pack: binary file, skipping");
                summary.skipped_files += 1;
                continue;
            }
            let text = String::from_utf8_lossy(&bytes);

            content.push_str(&format!("<file path=\"{rel}\">\n"));
            content.push_str(&text);
            if !text.ends_with('\n') {
                content.push('\n');
            }
            content.push_str("</file>\n\n");

            summary.file_count += 1;
            summary.total_lines += text.lines().count();
            summary.size_bytes += size;
            if summary.sample_files.len() < SAMPLE_FILES {
                summary.sample_files.push(rel);
            }
        }

        info!(
            dir = %dir.display(),
            files = summary.file_count,
            bytes = summary.size_bytes,
            skipped = summary.skipped_files,
            "pack: snapshot complete"
        );

        Ok(Snapshot {
            content,
            fingerprint_input: dir.to_path_buf(),
            summary,
        })
    }
}

#[async_trait]
impl SnapshotProvider for WalkdirPacker {
    async fn pack(&self, dir: &Path) -> Result<Snapshot, SnapshotError> {
        debug!(dir = %dir.display(), "pack: called");
        self.pack_sync(dir)
    }
}
