//! Pipeline composition: file set -> transform steps -> destination.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fileset::{FileSet, SourceFile};
use crate::path_utils::{to_slash, PathRewrite};
use crate::sourcemap::{line_count, mapping_url_comment, SourceMapBuilder};
use crate::transform::{apply_all, build_steps, Asset, StepConfig, TransformStep};

/// A pipeline as written in `sluice.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSpec {
    pub src: Vec<String>,
    pub dest: PathBuf,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
    #[serde(default)]
    pub rename: Option<PathRewrite>,
    #[serde(default)]
    pub concat: Option<PathBuf>,
    #[serde(default)]
    pub sourcemaps: bool,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Root-relative paths of every file written, sourcemaps included.
    pub written: Vec<PathBuf>,
    pub sources: usize,
}

struct Output {
    asset: Asset,
    map: Option<SourceMapBuilder>,
}

/// A composed pipeline, ready to run against a project root.
pub struct Pipeline {
    files: FileSet,
    steps: Vec<Arc<dyn TransformStep>>,
    dest: PathBuf,
    rewrite: Option<PathRewrite>,
    concat: Option<PathBuf>,
    sourcemaps: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("files", &self.files.patterns())
            .field("steps", &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("dest", &self.dest)
            .field("rewrite", &self.rewrite)
            .field("concat", &self.concat)
            .field("sourcemaps", &self.sourcemaps)
            .finish()
    }
}

impl Pipeline {
    pub fn new(files: FileSet, dest: impl Into<PathBuf>) -> Self {
        Self {
            files,
            steps: Vec::new(),
            dest: dest.into(),
            rewrite: None,
            concat: None,
            sourcemaps: false,
        }
    }

    /// Builds a pipeline from its configuration. Command steps run in `root`.
    pub fn from_spec(spec: &PipelineSpec, root: &Path) -> Result<Self> {
        if spec.src.is_empty() {
            return Err(Error::Config("pipeline 'src' must list at least one glob".to_string()));
        }
        let mut pipeline = Self::new(FileSet::new(&spec.src)?, &spec.dest)
            .with_sourcemaps(spec.sourcemaps);
        pipeline.steps = build_steps(&spec.steps, root)?;
        pipeline.rewrite = spec.rename.clone();
        pipeline.concat = spec.concat.clone();
        Ok(pipeline)
    }

    pub fn with_step(mut self, step: Arc<dyn TransformStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_rewrite(mut self, rewrite: PathRewrite) -> Self {
        self.rewrite = Some(rewrite);
        self
    }

    pub fn with_concat(mut self, name: impl Into<PathBuf>) -> Self {
        self.concat = Some(name.into());
        self
    }

    pub fn with_sourcemaps(mut self, enabled: bool) -> Self {
        self.sourcemaps = enabled;
        self
    }

    fn output_path(&self, relative: &Path) -> PathBuf {
        match &self.rewrite {
            Some(rule) => rule.apply(relative),
            None => relative.to_path_buf(),
        }
    }

    async fn read_source(file: &SourceFile) -> Result<String> {
        tokio::fs::read_to_string(&file.path)
            .await
            .map_err(|e| Error::io_at(&file.path, e))
    }

    /// Runs the pipeline.
    ///
    /// Every file is transformed in memory before anything is written, so a
    /// failing step aborts the batch without partial output.
    pub async fn run(&self, root: &Path) -> Result<PipelineReport> {
        let sources = self.files.resolve(root)?;
        debug!(
            patterns = ?self.files.patterns(),
            matched = sources.len(),
            "Resolved pipeline sources"
        );

        let mut outputs = Vec::new();
        if let Some(bundle) = &self.concat {
            if !sources.is_empty() {
                outputs.push(self.transform_concat(&sources, bundle).await?);
            }
        } else {
            for source in &sources {
                outputs.push(self.transform_one(source).await?);
            }
        }

        let dest = root.join(&self.dest);
        let mut report = PipelineReport {
            written: Vec::new(),
            sources: sources.len(),
        };
        for output in outputs {
            self.write_output(root, &dest, output, &mut report).await?;
        }

        info!(
            dest = %self.dest.display(),
            files = report.written.len(),
            "Pipeline finished"
        );
        Ok(report)
    }

    async fn transform_one(&self, source: &SourceFile) -> Result<Output> {
        let original = Self::read_source(source).await?;
        let asset = Asset::new(source.relative.clone(), original.clone());
        let mut asset = apply_all(&self.steps, asset).await?;
        asset.path = self.output_path(&asset.path);

        let map = self.sourcemaps.then(|| {
            let mut builder = SourceMapBuilder::new();
            let index = builder.add_source(to_slash(&source.relative), original);
            builder.map_lines(index, line_count(&asset.contents));
            builder
        });

        Ok(Output { asset, map })
    }

    async fn transform_concat(&self, sources: &[SourceFile], bundle: &Path) -> Result<Output> {
        let mut builder = SourceMapBuilder::new();
        let mut contents = String::new();

        for (position, source) in sources.iter().enumerate() {
            let original = Self::read_source(source).await?;
            let asset = Asset::new(source.relative.clone(), original.clone());
            let asset = apply_all(&self.steps, asset).await?;

            if position > 0 && !contents.ends_with('\n') {
                contents.push('\n');
            }
            let index = builder.add_source(to_slash(&source.relative), original);
            builder.map_lines(index, line_count(&asset.contents));
            contents.push_str(&asset.contents);
        }

        let asset = Asset::new(self.output_path(bundle), contents);
        Ok(Output {
            asset,
            map: self.sourcemaps.then_some(builder),
        })
    }

    async fn write_output(
        &self,
        root: &Path,
        dest: &Path,
        output: Output,
        report: &mut PipelineReport,
    ) -> Result<()> {
        let Output { mut asset, map } = output;
        let target = dest.join(&asset.path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_at(parent, e))?;
        }

        if let Some(map) = map {
            let file_name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let map_name = format!("{}.map", file_name);
            if let Some(comment) = mapping_url_comment(asset.extension(), &map_name) {
                if !asset.contents.ends_with('\n') {
                    asset.contents.push('\n');
                }
                asset.contents.push_str(&comment);
            }
            let map_path = target.with_file_name(&map_name);
            tokio::fs::write(&map_path, map.to_json(&file_name))
                .await
                .map_err(|e| Error::io_at(&map_path, e))?;
            report.written.push(strip_root(root, &map_path));
        }

        tokio::fs::write(&target, asset.contents.as_bytes())
            .await
            .map_err(|e| Error::io_at(&target, e))?;
        debug!(path = %target.display(), "Wrote pipeline output");
        report.written.push(strip_root(root, &target));
        Ok(())
    }
}

fn strip_root(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{MinifyJs, ReplaceStep};
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_identity_pipeline_preserves_structure() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/a.txt", "a");
        write(temp.path(), "src/deep/b.txt", "b");

        let pipeline = Pipeline::new(FileSet::new(["src/**/*.txt"]).unwrap(), "out");
        let report = pipeline.run(temp.path()).await.unwrap();

        assert_eq!(report.sources, 2);
        assert_eq!(fs::read_to_string(temp.path().join("out/a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(temp.path().join("out/deep/b.txt")).unwrap(), "b");
    }

    #[tokio::test]
    async fn test_rename_flattens_and_writes_sourcemaps() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/nested/app.es6", "let a = 1; // one\nlet b = 2;\n");

        let pipeline = Pipeline::new(FileSet::new(["src/**/*.es6"]).unwrap(), "app/js")
            .with_step(Arc::new(MinifyJs::new()))
            .with_rewrite(PathRewrite::new(".es6", ".es6.js"))
            .with_sourcemaps(true);
        let report = pipeline.run(temp.path()).await.unwrap();

        let out = fs::read_to_string(temp.path().join("app/js/app.es6.js")).unwrap();
        assert_eq!(
            out,
            "let a = 1;\nlet b = 2;\n//# sourceMappingURL=app.es6.js.map\n"
        );

        let map: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(temp.path().join("app/js/app.es6.js.map")).unwrap(),
        )
        .unwrap();
        assert_eq!(map["file"], "app.es6.js");
        assert_eq!(map["sources"][0], "nested/app.es6");
        assert!(report.written.contains(&PathBuf::from("app/js/app.es6.js.map")));
    }

    #[tokio::test]
    async fn test_concat_bundles_in_order() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "css/a.css", "a{}");
        write(temp.path(), "css/b.css", "b{}\n");

        let pipeline =
            Pipeline::new(FileSet::new(["css/*.css"]).unwrap(), "dist").with_concat("all.css");
        pipeline.run(temp.path()).await.unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("dist/all.css")).unwrap(),
            "a{}\nb{}\n"
        );
    }

    #[tokio::test]
    async fn test_failing_step_writes_nothing() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/a.js", "var ok = 1;\n");
        write(temp.path(), "src/b.js", "var broken = 'unterminated;\n");
        write(temp.path(), "src/c.js", "var ok = 2;\n");

        let pipeline = Pipeline::new(FileSet::new(["src/*.js"]).unwrap(), "out")
            .with_step(Arc::new(ReplaceStep::new("ok", "fine").unwrap()))
            .with_step(Arc::new(MinifyJs::new()));
        let err = pipeline.run(temp.path()).await.unwrap_err();

        assert!(matches!(err, Error::Transform { ref path, .. } if path == Path::new("b.js")));
        assert!(!temp.path().join("out").exists());
    }

    #[test]
    fn test_spec_requires_sources() {
        let spec = PipelineSpec {
            src: vec![],
            dest: "out".into(),
            steps: vec![],
            rename: None,
            concat: None,
            sourcemaps: false,
        };
        assert!(Pipeline::from_spec(&spec, Path::new(".")).is_err());
    }
}
