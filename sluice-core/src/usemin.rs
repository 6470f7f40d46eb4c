//! Usemin: replaces `<!-- build:TYPE OUTPUT -->` blocks in markup with one
//! reference to a processed bundle of the files the block listed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fileset::{FileSet, SourceFile};
use crate::inject::reference_tag;
use crate::path_utils::{stays_within_root, to_slash};
use crate::transform::{apply_all, Asset, StepConfig, TransformStep};

static BUILD_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)([ \t]*)<!--\s*build:(\w+)(?:\(([^)]*)\))?(?:\s+(\S+))?\s*-->(.*?)<!--\s*endbuild\s*-->",
    )
    .expect("valid build block regex")
});

static SCRIPT_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<script\b[^>]*\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid script regex")
});

static LINK_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<link\b[^>]*\bhref\s*=\s*["']([^"']+)["']"#).expect("valid link regex")
});

/// A usemin action as written in `sluice.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UseminSpec {
    pub src: Vec<String>,
    pub dest: PathBuf,
    #[serde(default)]
    pub js: Vec<StepConfig>,
    #[serde(default)]
    pub css: Vec<StepConfig>,
    #[serde(default)]
    pub html: Vec<StepConfig>,
}

/// One `build:` block found in a markup file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBlock {
    pub indent: String,
    pub kind: String,
    /// Directory (root-relative) to resolve references against instead of
    /// the markup file's own directory.
    pub alternate: Option<String>,
    pub output: Option<String>,
    pub references: Vec<String>,
    start: usize,
    end: usize,
}

/// Finds every build block of `markup`, in document order.
pub fn parse_blocks(markup: &str) -> Vec<BuildBlock> {
    BUILD_BLOCK
        .captures_iter(markup)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let kind = caps.get(2)?.as_str().to_string();
            let body = caps.get(5).map(|m| m.as_str()).unwrap_or_default();
            let pattern = if kind == "css" { &*LINK_HREF } else { &*SCRIPT_SRC };
            Some(BuildBlock {
                indent: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
                alternate: caps.get(3).map(|m| m.as_str().trim().to_string()),
                output: caps.get(4).map(|m| m.as_str().to_string()),
                references: pattern
                    .captures_iter(body)
                    .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                    .collect(),
                kind,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Step list of one block type, split at the `concat` marker.
struct StepPlan {
    per_file: Vec<Arc<dyn TransformStep>>,
    bundle: Vec<Arc<dyn TransformStep>>,
}

impl StepPlan {
    fn build(configs: &[StepConfig], root: &Path) -> Result<Self> {
        let (before, after) = match configs.iter().position(StepConfig::is_concat_marker) {
            Some(index) => (&configs[..index], &configs[index + 1..]),
            None => (&configs[..0], configs),
        };
        let build = |steps: &[StepConfig]| -> Result<Vec<Arc<dyn TransformStep>>> {
            steps
                .iter()
                .filter(|step| !step.is_concat_marker())
                .map(|step| step.build(root))
                .collect()
        };
        Ok(Self {
            per_file: build(before)?,
            bundle: build(after)?,
        })
    }
}

/// A configured usemin run.
pub struct Usemin {
    markup: FileSet,
    dest: PathBuf,
    js: StepPlan,
    css: StepPlan,
    html: Vec<Arc<dyn TransformStep>>,
}

impl std::fmt::Debug for Usemin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Usemin")
            .field("src", &self.markup.patterns())
            .field("dest", &self.dest)
            .finish_non_exhaustive()
    }
}

/// Outcome of one usemin run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UseminReport {
    /// Root-relative paths of the bundles and markup files written.
    pub written: Vec<PathBuf>,
    pub blocks: usize,
}

impl Usemin {
    pub fn from_spec(spec: &UseminSpec, root: &Path) -> Result<Self> {
        if spec.src.is_empty() {
            return Err(Error::Config("usemin 'src' must list at least one glob".to_string()));
        }
        Ok(Self {
            markup: FileSet::new(&spec.src)?,
            dest: spec.dest.clone(),
            js: StepPlan::build(&spec.js, root)?,
            css: StepPlan::build(&spec.css, root)?,
            html: spec
                .html
                .iter()
                .map(|step| step.build(root))
                .collect::<Result<_>>()?,
        })
    }

    fn plan_for(&self, kind: &str) -> Option<&StepPlan> {
        match kind {
            "js" => Some(&self.js),
            "css" => Some(&self.css),
            _ => None,
        }
    }

    /// Processes every markup file. Nothing is written unless all bundles
    /// and markup files were produced.
    pub async fn run(&self, root: &Path) -> Result<UseminReport> {
        let pages = self.markup.resolve(root)?;
        let mut outputs: Vec<Asset> = Vec::new();
        // dest-relative bundle path -> final (possibly revved) path
        let mut bundles: HashMap<PathBuf, PathBuf> = HashMap::new();
        let mut blocks = 0;

        for page in &pages {
            let markup = tokio::fs::read_to_string(&page.path)
                .await
                .map_err(|e| Error::io_at(&page.path, e))?;
            let mut rewritten = String::with_capacity(markup.len());
            let mut cursor = 0;
            for block in parse_blocks(&markup) {
                blocks += 1;
                rewritten.push_str(&markup[cursor..block.start]);
                cursor = block.end;

                if block.kind == "remove" {
                    continue;
                }
                let replacement = self
                    .bundle_block(root, page, &block, &mut bundles, &mut outputs)
                    .await?;
                rewritten.push_str(&block.indent);
                rewritten.push_str(&replacement);
            }
            rewritten.push_str(&markup[cursor..]);

            let asset = apply_all(&self.html, Asset::new(page.relative.clone(), rewritten)).await?;
            outputs.push(asset);
        }

        let dest = root.join(&self.dest);
        let mut report = UseminReport {
            written: Vec::new(),
            blocks,
        };
        for asset in outputs {
            let target = dest.join(&asset.path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::io_at(parent, e))?;
            }
            tokio::fs::write(&target, asset.contents.as_bytes())
                .await
                .map_err(|e| Error::io_at(&target, e))?;
            debug!(path = %target.display(), "Wrote usemin output");
            report.written.push(self.dest.join(&asset.path));
        }

        info!(
            dest = %self.dest.display(),
            pages = pages.len(),
            blocks = report.blocks,
            "Usemin finished"
        );
        Ok(report)
    }

    async fn bundle_block(
        &self,
        root: &Path,
        page: &SourceFile,
        block: &BuildBlock,
        bundles: &mut HashMap<PathBuf, PathBuf>,
        outputs: &mut Vec<Asset>,
    ) -> Result<String> {
        let plan = self.plan_for(&block.kind).ok_or_else(|| {
            Error::Config(format!(
                "Unsupported build block type '{}' in {}; expected js, css or remove",
                block.kind,
                page.root_relative.display()
            ))
        })?;
        let output = block.output.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "build:{} block in {} names no output file",
                block.kind,
                page.root_relative.display()
            ))
        })?;

        // Relative outputs sit next to the page in `dest`, like the tag that
        // points at them; `/` outputs are relative to `dest` itself.
        let page_out_dir = match output.strip_prefix('/') {
            Some(_) => PathBuf::new(),
            None => parent_dir(&page.relative),
        };
        let bundle_path = page_out_dir.join(output.trim_start_matches('/'));
        if !stays_within_root(&bundle_path) {
            return Err(Error::Config(format!(
                "build:{} output '{}' in {} points outside the destination",
                block.kind,
                output,
                page.root_relative.display()
            )));
        }

        let final_path = match bundles.get(&bundle_path) {
            Some(path) => path.clone(),
            None => {
                let search_dir = match &block.alternate {
                    Some(alternate) => PathBuf::from(alternate.trim_start_matches("./")),
                    None => parent_dir(&page.root_relative),
                };
                let mut contents = String::new();
                for reference in &block.references {
                    let relative = resolve_reference(&search_dir, reference)?;
                    let path = root.join(&relative);
                    let source = tokio::fs::read_to_string(&path)
                        .await
                        .map_err(|e| Error::io_at(&path, e))?;
                    let asset = apply_all(&plan.per_file, Asset::new(relative, source)).await?;
                    if !contents.is_empty() && !contents.ends_with('\n') {
                        contents.push('\n');
                    }
                    contents.push_str(&asset.contents);
                }

                let bundle =
                    apply_all(&plan.bundle, Asset::new(bundle_path.clone(), contents)).await?;
                let path = bundle.path.clone();
                debug!(
                    output,
                    path = %path.display(),
                    sources = block.references.len(),
                    "Bundled build block"
                );
                outputs.push(bundle);
                bundles.insert(bundle_path, path.clone());
                path
            }
        };

        let url = if output.starts_with('/') {
            format!("/{}", to_slash(&final_path))
        } else {
            let local = final_path.strip_prefix(&page_out_dir).unwrap_or(&final_path);
            to_slash(local)
        };
        reference_tag(&block.kind, &url).ok_or_else(|| {
            Error::Config(format!("No tag form for build block type '{}'", block.kind))
        })
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Root-relative path of a block reference. Leading `/` means root-relative;
/// anything else is relative to `search_dir`. Query strings are dropped.
fn resolve_reference(search_dir: &Path, reference: &str) -> Result<PathBuf> {
    let clean = reference.split(&['?', '#'][..]).next().unwrap_or(reference);
    let relative = match clean.strip_prefix('/') {
        Some(absolute) => PathBuf::from(absolute),
        None => search_dir.join(clean),
    };
    if !stays_within_root(&relative) {
        return Err(Error::Config(format!(
            "Reference '{}' points outside the project root",
            reference
        )));
    }
    Ok(relative)
}
