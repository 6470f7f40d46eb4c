//! Deleting generated files and directories.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fileset::FileSet;
use crate::path_utils::{glob_base, has_magic, normalize_pattern, stays_within_root};

/// Outcome of a clean run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Root-relative paths that were removed.
    pub removed: Vec<PathBuf>,
}

fn check_pattern(pattern: &str) -> Result<()> {
    let negated = pattern.starts_with('!');
    let literal = normalize_pattern(pattern.trim_start_matches('!'));
    let first_segment = literal.split('/').next().unwrap_or_default();
    // A wildcard in the first segment sweeps up the project root itself.
    let sweeps_root = !negated
        && glob_base(literal).as_os_str().is_empty()
        && has_magic(first_segment);
    if literal.is_empty() || literal == "." || sweeps_root {
        return Err(Error::Config(format!(
            "Refusing to clean the project root (pattern '{}')",
            pattern
        )));
    }
    if !stays_within_root(Path::new(literal)) {
        return Err(Error::Config(format!(
            "Refusing to clean outside the project root (pattern '{}')",
            pattern
        )));
    }
    Ok(())
}

/// Removes every file or directory under `root` matching any of `patterns`.
///
/// Nothing matching is not an error. Entries that vanish while cleaning (a
/// file inside a directory that was already removed) are skipped.
pub async fn clean<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<CleanReport> {
    for pattern in patterns {
        check_pattern(pattern.as_ref())?;
    }

    let entries = FileSet::new(patterns)?.resolve_entries(root)?;
    let mut report = CleanReport::default();

    for entry in entries {
        let metadata = match tokio::fs::symlink_metadata(&entry.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::io_at(&entry.path, e)),
        };

        let removal = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&entry.path).await
        } else {
            tokio::fs::remove_file(&entry.path).await
        };

        match removal {
            Ok(()) => {
                debug!(path = %entry.root_relative.display(), "Removed");
                report.removed.push(entry.root_relative);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io_at(&entry.path, e)),
        }
    }

    info!(removed = report.removed.len(), "Clean finished");
    Ok(report)
}
