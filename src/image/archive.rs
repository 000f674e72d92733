//! Filtered build-context archives
//!
//! Writes a gzip-compressed tar of a directory to a temporary file, leaving
//! out everything the ignore matcher rejects. Ignored directories are pruned
//! from the walk rather than filtered entry by entry.

use super::ignore::IgnoreMatcher;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::task::spawn_blocking;
use tracing::debug;
use walkdir::WalkDir;

/// A finished archive. The backing file is deleted when this is dropped.
#[derive(Debug)]
pub struct ContextArchive {
    file: NamedTempFile,
    /// Relative paths written, in archive order
    pub entries: Vec<PathBuf>,
    /// Compressed size in bytes
    pub size: u64,
}

impl ContextArchive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Archive `dir` on the blocking pool
pub async fn archive_context(dir: &Path, matcher: IgnoreMatcher) -> io::Result<ContextArchive> {
    let dir = dir.to_owned();
    spawn_blocking(move || archive_context_sync(&dir, &matcher)).await?
}

fn archive_context_sync(dir: &Path, matcher: &IgnoreMatcher) -> io::Result<ContextArchive> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("build context {} is not a directory", dir.display()),
        ));
    }

    let file = tempfile::Builder::new()
        .prefix("workload-build-context-")
        .suffix(".tar.gz")
        .tempfile()?;
    let mut entries = Vec::new();

    {
        let encoder = GzEncoder::new(file.as_file(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let keep = relative_name(dir, entry.path())
                    .map(|rel| !matcher.is_ignored(&rel))
                    .unwrap_or(false);
                if !keep {
                    debug!(path = %entry.path().display(), "Ignoring build context entry");
                }
                keep
            });

        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?
                .to_path_buf();

            if entry.file_type().is_dir() {
                builder.append_dir(&relative, entry.path())?;
            } else {
                builder.append_path_with_name(entry.path(), &relative)?;
            }
            entries.push(relative);
        }

        builder.into_inner()?.finish()?;
    }

    let size = file.as_file().metadata()?.len();
    debug!(
        path = %file.path().display(),
        entries = entries.len(),
        compressed_size = size,
        "Created build context archive"
    );

    Ok(ContextArchive {
        file,
        entries,
        size,
    })
}

/// Path of `path` relative to `root`, `/`-separated
fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
