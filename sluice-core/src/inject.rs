//! Injection of asset references into markup placeholder regions.
//!
//! A region looks like
//!
//! ```html
//! <!-- inject:js -->
//! <!-- endinject -->
//! ```
//!
//! and is refilled with one tag per matching source file on every run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fileset::FileSet;
use crate::path_utils::{relative_path, to_slash};

static END_INJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--\s*endinject\s*-->").expect("valid endinject regex"));

fn default_name() -> String {
    "inject".to_string()
}

fn default_true() -> bool {
    true
}

/// An inject action as written in `sluice.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InjectSpec {
    /// Markup files to rewrite (globs allowed).
    pub target: Vec<String>,
    /// Files to reference (globs, `!` excludes).
    #[serde(default)]
    pub sources: Vec<String>,
    /// Also reference the main files of installed bower packages.
    #[serde(default)]
    pub bower: bool,
    /// Placeholder tag name: `<!-- NAME:ext -->`.
    #[serde(default = "default_name")]
    pub name: String,
    /// Reference paths relative to each target file rather than to the root.
    #[serde(default = "default_true")]
    pub relative: bool,
    /// Output directory; defaults to rewriting targets in place.
    #[serde(default)]
    pub dest: Option<PathBuf>,
}

/// Outcome of one injection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectReport {
    pub written: Vec<PathBuf>,
    pub references: usize,
}

/// Renders the tag referencing `url` for a given file extension.
pub fn reference_tag(extension: &str, url: &str) -> Option<String> {
    match extension {
        "js" => Some(format!("<script src=\"{}\"></script>", url)),
        "css" => Some(format!("<link rel=\"stylesheet\" href=\"{}\">", url)),
        "html" => Some(format!("<link rel=\"import\" href=\"{}\">", url)),
        _ => None,
    }
}

/// Replaces the contents of every `<!-- name:ext -->` region of `markup`
/// with tags for the `references` (root-relative paths) of that extension.
///
/// `url_for` turns a root-relative path into the URL written into the tag.
pub fn inject_references<F>(
    markup: &str,
    name: &str,
    references: &[PathBuf],
    url_for: F,
) -> String
where
    F: Fn(&Path) -> String,
{
    let start = Regex::new(&format!(r"<!--\s*{}:(\w+)\s*-->", regex::escape(name)))
        .expect("escaped placeholder regex is valid");

    let mut out = String::with_capacity(markup.len());
    let mut cursor = 0;

    while let Some(caps) = start.captures_at(markup, cursor) {
        let (Some(open), Some(ext)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let Some(close) = END_INJECT.find_at(markup, open.end()) else {
            break;
        };

        let line_start = markup[..open.start()].rfind('\n').map_or(0, |i| i + 1);
        let line = &markup[line_start..open.start()];
        let indent = &line[..line.len() - line.trim_start_matches(&[' ', '\t'][..]).len()];
        let tags: Vec<String> = references
            .iter()
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(ext.as_str()))
            .filter_map(|path| reference_tag(ext.as_str(), &url_for(path)))
            .collect();

        out.push_str(&markup[cursor..open.end()]);
        for tag in &tags {
            out.push('\n');
            out.push_str(indent);
            out.push_str(tag);
        }
        out.push('\n');
        out.push_str(indent);
        out.push_str(close.as_str());
        cursor = close.end();
    }

    out.push_str(&markup[cursor..]);
    out
}

/// Collects the main files of the bower packages declared in `bower.json`,
/// dependencies of a package before the package itself.
pub fn bower_main_files(root: &Path) -> Result<Vec<PathBuf>> {
    let manifest = read_json(&root.join("bower.json"))?;
    let directory = read_json(&root.join(".bowerrc"))
        .ok()
        .and_then(|rc| rc.get("directory").and_then(|d| d.as_str()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("bower_components"));
    let overrides = manifest.get("overrides").cloned().unwrap_or_default();

    let mut files = Vec::new();
    let mut visited = HashSet::new();
    for name in dependency_names(&manifest) {
        collect_bower_package(root, &directory, &name, &overrides, &mut visited, &mut files)?;
    }
    Ok(files)
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid JSON in {}: {}", path.display(), e)))
}

fn dependency_names(manifest: &serde_json::Value) -> Vec<String> {
    manifest
        .get("dependencies")
        .and_then(|d| d.as_object())
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default()
}

fn main_entries(value: Option<&serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn collect_bower_package(
    root: &Path,
    directory: &Path,
    name: &str,
    overrides: &serde_json::Value,
    visited: &mut HashSet<String>,
    files: &mut Vec<PathBuf>,
) -> Result<()> {
    if !visited.insert(name.to_string()) {
        return Ok(());
    }

    let package_dir = directory.join(name);
    let manifest = [".bower.json", "bower.json", "package.json"]
        .iter()
        .map(|file| root.join(&package_dir).join(file))
        .find(|path| path.is_file())
        .map(|path| read_json(&path))
        .transpose()?
        .unwrap_or_default();

    for dep in dependency_names(&manifest) {
        collect_bower_package(root, directory, &dep, overrides, visited, files)?;
    }

    let overridden = overrides.get(name).and_then(|o| o.get("main"));
    let mains = main_entries(overridden.or_else(|| manifest.get("main")));
    if mains.is_empty() {
        debug!(package = name, "Bower package declares no main files");
        return Ok(());
    }

    let patterns: Vec<String> = mains
        .iter()
        .map(|main| to_slash(&package_dir.join(main.trim_start_matches("./"))))
        .collect();
    for file in FileSet::new(&patterns)?.resolve(root)? {
        if !files.contains(&file.root_relative) {
            files.push(file.root_relative);
        }
    }
    Ok(())
}

/// A configured injection.
#[derive(Debug, Clone)]
pub struct Injector {
    targets: FileSet,
    sources: FileSet,
    spec: InjectSpec,
}

impl Injector {
    pub fn new(spec: InjectSpec) -> Result<Self> {
        if spec.target.is_empty() {
            return Err(Error::Config("inject 'target' must name a markup file".to_string()));
        }
        Ok(Self {
            targets: FileSet::new(&spec.target)?,
            sources: FileSet::new(&spec.sources)?,
            spec,
        })
    }

    fn references(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut references = if self.spec.bower {
            bower_main_files(root)?
        } else {
            Vec::new()
        };
        for file in self.sources.resolve(root)? {
            if !references.contains(&file.root_relative) {
                references.push(file.root_relative);
            }
        }
        Ok(references)
    }

    pub async fn run(&self, root: &Path) -> Result<InjectReport> {
        let references = self.references(root)?;
        let targets = self.targets.resolve(root)?;
        if targets.is_empty() {
            return Err(Error::Config(format!(
                "inject target {:?} matched no files",
                self.spec.target
            )));
        }

        let mut report = InjectReport {
            written: Vec::new(),
            references: references.len(),
        };

        for target in targets {
            let markup = tokio::fs::read_to_string(&target.path)
                .await
                .map_err(|e| Error::io_at(&target.path, e))?;
            let target_dir = target
                .root_relative
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();

            let rewritten = inject_references(&markup, &self.spec.name, &references, |path| {
                if self.spec.relative {
                    to_slash(&relative_path(&target_dir, path))
                } else {
                    format!("/{}", to_slash(path))
                }
            });

            let out_rel = match &self.spec.dest {
                Some(dest) => dest.join(&target.relative),
                None => target.root_relative.clone(),
            };
            let out_path = root.join(&out_rel);
            if let Some(parent) = out_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::io_at(parent, e))?;
            }
            tokio::fs::write(&out_path, rewritten)
                .await
                .map_err(|e| Error::io_at(&out_path, e))?;
            report.written.push(out_rel);
        }

        info!(
            name = %self.spec.name,
            references = report.references,
            targets = report.written.len(),
            "Injection finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = "<html>\n<head>\n  <!-- inject:css -->\n  <!-- endinject -->\n</head>\n<body>\n    <!-- inject:js -->\n    <script src=\"stale.js\"></script>\n    <!-- endinject -->\n</body>\n</html>\n";

    #[test]
    fn test_fills_regions_by_extension_with_indentation() {
        let refs = vec![PathBuf::from("app/js/a.js"), PathBuf::from("app/css/site.css")];
        let out = inject_references(INDEX, "inject", &refs, |p| to_slash(p));

        assert!(out.contains(
            "  <!-- inject:css -->\n  <link rel=\"stylesheet\" href=\"app/css/site.css\">\n  <!-- endinject -->"
        ));
        assert!(out.contains(
            "    <!-- inject:js -->\n    <script src=\"app/js/a.js\"></script>\n    <!-- endinject -->"
        ));
        assert!(!out.contains("stale.js"));
    }

    #[test]
    fn test_is_idempotent() {
        let refs = vec![PathBuf::from("a.js")];
        let once = inject_references(INDEX, "inject", &refs, |p| to_slash(p));
        let twice = inject_references(&once, "inject", &refs, |p| to_slash(p));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fills_placeholder_after_markup_on_same_line() {
        let markup = "  <head><!-- inject:css --><!-- endinject --></head>\n";
        let refs = vec![PathBuf::from("site.css")];
        let out = inject_references(markup, "inject", &refs, |p| to_slash(p));
        assert_eq!(
            out,
            "  <head><!-- inject:css -->\n  <link rel=\"stylesheet\" href=\"site.css\">\n  <!-- endinject --></head>\n"
        );
    }

    #[test]
    fn test_other_names_are_left_alone() {
        let markup = "<!-- bower:js -->\n<!-- endinject -->\n";
        let out = inject_references(markup, "inject", &[PathBuf::from("a.js")], |p| to_slash(p));
        assert_eq!(out, markup);
    }
}
