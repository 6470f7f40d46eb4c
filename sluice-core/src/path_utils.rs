//! Path helpers shared by pipelines, injection and watching.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

const GLOB_CHARS: [char; 4] = ['*', '?', '[', '{'];

/// Returns `true` when the pattern contains glob metacharacters.
pub fn has_magic(pattern: &str) -> bool {
    pattern.contains(&GLOB_CHARS[..])
}

/// Strips a leading `./` so that patterns and relative paths compare equal.
pub fn normalize_pattern(pattern: &str) -> &str {
    let mut pattern = pattern;
    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest;
    }
    pattern
}

/// Returns the non-magic directory prefix of a glob.
///
/// `src/**/*.es6` has base `src`, `app/*.html` has base `app`. A pattern
/// without metacharacters names a single entry, so its base is the parent
/// directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let pattern = normalize_pattern(pattern);

    if !has_magic(pattern) {
        return Path::new(pattern)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
    }

    let mut base = PathBuf::new();
    for segment in pattern.split('/') {
        if has_magic(segment) {
            break;
        }
        base.push(segment);
    }
    base
}

/// Renders a path with forward slashes, for use in markup and sourcemaps.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Computes the path of `target` relative to the directory `from_dir`.
///
/// Both paths must be relative to the same root (or both absolute).
pub fn relative_path(from_dir: &Path, target: &Path) -> PathBuf {
    let from: Vec<Component> = from_dir
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to: Vec<Component> = target
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..from.len() {
        result.push("..");
    }
    for component in &to[common..] {
        result.push(component.as_os_str());
    }
    result
}

/// Returns `true` if `path` stays inside its root once `..` segments are
/// resolved lexically.
pub fn stays_within_root(path: &Path) -> bool {
    let mut depth: i64 = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::RootDir | Component::Prefix(_) => return false,
            Component::CurDir => {}
        }
    }
    true
}

fn default_flatten() -> bool {
    true
}

/// Extension substitution rule applied to output paths.
///
/// A path whose file name ends in `from` gets that suffix replaced by `to`,
/// and with `flatten` set its directories are dropped so every output lands
/// directly in the destination directory. Other paths pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRewrite {
    pub from: String,
    pub to: String,
    #[serde(default = "default_flatten")]
    pub flatten: bool,
}

impl PathRewrite {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            flatten: true,
        }
    }

    pub fn with_flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    /// Returns `true` if the rule would rewrite this path.
    pub fn matches(&self, path: &Path) -> bool {
        self.rewritten_name(path).is_some()
    }

    fn rewritten_name(&self, path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_suffix(self.from.as_str())?;
        if stem.is_empty() {
            return None;
        }
        Some(format!("{}{}", stem, self.to))
    }

    /// Applies the rule to a relative output path.
    pub fn apply(&self, path: &Path) -> PathBuf {
        match self.rewritten_name(path) {
            Some(name) if self.flatten => PathBuf::from(name),
            Some(name) => path.with_file_name(name),
            None => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("src/**/*.es6"), PathBuf::from("src"));
        assert_eq!(glob_base("./app/js/**/*.js"), PathBuf::from("app/js"));
        assert_eq!(glob_base("app/*.html"), PathBuf::from("app"));
        assert_eq!(glob_base("*.html"), PathBuf::new());
        assert_eq!(glob_base("app/index.html"), PathBuf::from("app"));
        assert_eq!(glob_base("dist"), PathBuf::new());
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("app"), Path::new("app/js/main.js")),
            PathBuf::from("js/main.js")
        );
        assert_eq!(
            relative_path(Path::new("app"), Path::new("bower_components/x/x.js")),
            PathBuf::from("../bower_components/x/x.js")
        );
        assert_eq!(
            relative_path(Path::new(""), Path::new("a/b.css")),
            PathBuf::from("a/b.css")
        );
    }

    #[test]
    fn test_stays_within_root() {
        assert!(stays_within_root(Path::new("dist")));
        assert!(stays_within_root(Path::new("a/../b")));
        assert!(!stays_within_root(Path::new("../outside")));
        assert!(!stays_within_root(Path::new("/etc")));
    }

    #[test]
    fn test_rewrite_flattens_matching_paths() {
        let rule = PathRewrite::new(".es6", ".es6.js");
        assert_eq!(
            rule.apply(Path::new("nested/dir/app.es6")),
            PathBuf::from("app.es6.js")
        );
    }

    #[test]
    fn test_rewrite_keeps_directories_without_flatten() {
        let rule = PathRewrite::new(".es6", ".js").with_flatten(false);
        assert_eq!(
            rule.apply(Path::new("nested/app.es6")),
            PathBuf::from("nested/app.js")
        );
    }

    #[test]
    fn test_rewrite_passes_unmatched_paths_through() {
        let rule = PathRewrite::new(".es6", ".es6.js");
        let rewritten = rule.apply(Path::new("nested/app.es6"));
        assert_eq!(rule.apply(&rewritten), rewritten);
        assert_eq!(
            rule.apply(Path::new("nested/readme.md")),
            PathBuf::from("nested/readme.md")
        );
        assert!(!rule.matches(Path::new(".es6")));
    }
}
