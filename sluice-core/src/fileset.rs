//! Glob-based file-set resolution.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use indexmap::IndexMap;
use tracing::warn;

use crate::error::{Error, Result};
use crate::path_utils::{glob_base, normalize_pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A file matched by a [`FileSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute (root-joined) path of the file.
    pub path: PathBuf,
    /// Path relative to the glob base of the pattern that matched it.
    pub relative: PathBuf,
    /// Path relative to the project root.
    pub root_relative: PathBuf,
}

#[derive(Debug, Clone)]
struct Include {
    raw: String,
    pattern: Pattern,
    base: PathBuf,
}

/// An ordered set of include globs plus `!`-prefixed exclusions.
///
/// Resolution walks the filesystem each time it is called, so the same set
/// can be resolved repeatedly (for example on every watch-triggered rebuild).
#[derive(Debug, Clone)]
pub struct FileSet {
    includes: Vec<Include>,
    excludes: Vec<Pattern>,
    raw: Vec<String>,
}

impl PartialEq for FileSet {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for FileSet {}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| Error::InvalidGlob {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

impl FileSet {
    /// Compiles a list of patterns. Patterns starting with `!` exclude.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        let mut raw = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            raw.push(pattern.to_string());

            if let Some(negated) = pattern.strip_prefix('!') {
                excludes.push(compile(normalize_pattern(negated))?);
            } else {
                let normalized = normalize_pattern(pattern);
                includes.push(Include {
                    raw: normalized.to_string(),
                    pattern: compile(normalized)?,
                    base: glob_base(normalized),
                });
            }
        }

        Ok(Self {
            includes,
            excludes,
            raw,
        })
    }

    /// The patterns as written.
    pub fn patterns(&self) -> &[String] {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
    }

    /// Returns `true` if a root-relative path is included and not excluded.
    pub fn matches(&self, relative: &Path) -> bool {
        self.includes
            .iter()
            .any(|inc| inc.pattern.matches_path_with(relative, MATCH_OPTIONS))
            && !self.is_excluded(relative)
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        self.excludes.iter().any(|ex| {
            ex.matches_path_with(relative, MATCH_OPTIONS)
                || relative
                    .ancestors()
                    .skip(1)
                    .filter(|a| !a.as_os_str().is_empty())
                    .any(|a| ex.matches_path_with(a, MATCH_OPTIONS))
        })
    }

    /// Resolves regular files under `root`, in pattern order, deduplicated.
    pub fn resolve(&self, root: &Path) -> Result<Vec<SourceFile>> {
        let entries = self.walk(root)?;
        Ok(entries
            .into_values()
            .filter(|file| file.path.is_file())
            .collect())
    }

    /// Resolves every matching entry, files and directories alike.
    pub fn resolve_entries(&self, root: &Path) -> Result<Vec<SourceFile>> {
        Ok(self.walk(root)?.into_values().collect())
    }

    fn walk(&self, root: &Path) -> Result<IndexMap<PathBuf, SourceFile>> {
        let mut found = IndexMap::new();

        for include in &self.includes {
            // The root is literal text; only the pattern part may match.
            let escaped_root = Pattern::escape(&root.to_string_lossy());
            let full_pattern = format!("{}/{}", escaped_root.trim_end_matches('/'), include.raw);
            let paths = glob::glob_with(&full_pattern, MATCH_OPTIONS).map_err(|e| {
                Error::InvalidGlob {
                    pattern: include.raw.clone(),
                    message: e.to_string(),
                }
            })?;

            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        warn!(pattern = %include.raw, error = %e, "Skipping unreadable path");
                        continue;
                    }
                };

                let root_relative = match path.strip_prefix(root) {
                    Ok(rel) => rel.to_path_buf(),
                    Err(_) => continue,
                };
                if self.is_excluded(&root_relative) || found.contains_key(&root_relative) {
                    continue;
                }

                let relative = root_relative
                    .strip_prefix(&include.base)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| root_relative.clone());

                found.insert(
                    root_relative.clone(),
                    SourceFile {
                        path,
                        relative,
                        root_relative,
                    },
                );
            }
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    #[test]
    fn test_resolve_relative_to_glob_base() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/a.es6");
        touch(temp.path(), "src/nested/b.es6");
        touch(temp.path(), "src/c.txt");

        let set = FileSet::new(["src/**/*.es6"]).unwrap();
        let files = set.resolve(temp.path()).unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative.clone()).collect();

        assert_eq!(
            relative,
            vec![PathBuf::from("a.es6"), PathBuf::from("nested/b.es6")]
        );
        assert_eq!(files[1].root_relative, PathBuf::from("src/nested/b.es6"));
    }

    #[test]
    fn test_negation_excludes_directories() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "app/js/main.js");
        touch(temp.path(), "app/js/bower_components/lib/lib.js");

        let set = FileSet::new([
            "./app/js/**/*.js",
            "!app/js/bower_components",
        ])
        .unwrap();
        let files = set.resolve(temp.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, PathBuf::from("main.js"));
    }

    #[test]
    fn test_matches_root_relative_paths() {
        let set = FileSet::new(["src/**/*.*", "!src/vendor/**"]).unwrap();
        assert!(set.matches(Path::new("src/app.es6")));
        assert!(set.matches(Path::new("src/deep/er/app.es6")));
        assert!(!set.matches(Path::new("src/vendor/lib.js")));
        assert!(!set.matches(Path::new("app/index.html")));
    }

    #[test]
    fn test_root_with_glob_metacharacters() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("site[1]");
        touch(&root, "src/a.js");
        touch(&root, "src/b?.js");

        let set = FileSet::new(["src/*.js"]).unwrap();
        let files = set.resolve(&root).unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative.clone()).collect();

        assert_eq!(relative, vec![PathBuf::from("a.js"), PathBuf::from("b?.js")]);
        assert_eq!(files[0].path, root.join("src/a.js"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = FileSet::new(["app/js/**.es6.js"]).unwrap_err();
        assert!(matches!(err, Error::InvalidGlob { .. }));
    }

    #[test]
    fn test_missing_files_resolve_to_nothing() {
        let temp = TempDir::new().unwrap();
        let set = FileSet::new(["does/not/exist/**/*.js"]).unwrap();
        assert!(set.resolve(temp.path()).unwrap().is_empty());
    }
}
