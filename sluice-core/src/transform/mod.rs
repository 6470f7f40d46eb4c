//! Transform steps applied to assets flowing through pipelines.

mod command;
mod css;
mod html;
mod js;
mod replace;
mod rev;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use command::CommandStep;
pub use css::MinifyCss;
pub use html::MinifyHtml;
pub use js::MinifyJs;
pub use replace::ReplaceStep;
pub use rev::Rev;

/// Name of the usemin marker that splits per-file steps from whole-bundle steps.
pub const CONCAT_MARKER: &str = "concat";

/// A file in flight: its output path (relative to the destination) and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub contents: String,
}

impl Asset {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }
}

/// A named function over an asset's contents (and possibly its path).
#[async_trait]
pub trait TransformStep: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, asset: Asset) -> Result<Asset>;
}

impl fmt::Debug for dyn TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransformStep({})", self.name())
    }
}

pub(crate) fn transform_error(step: &str, asset: &Asset, message: impl Into<String>) -> Error {
    Error::Transform {
        step: step.to_string(),
        path: asset.path.clone(),
        message: message.into(),
    }
}

/// Runs an asset through each step in order.
pub async fn apply_all(steps: &[Arc<dyn TransformStep>], mut asset: Asset) -> Result<Asset> {
    for step in steps {
        tracing::trace!(step = step.name(), path = %asset.path.display(), "Applying transform");
        asset = step.apply(asset).await?;
    }
    Ok(asset)
}

/// A transform step as written in `sluice.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepConfig {
    /// A built-in step: `minify-css`, `minify-html`, `minify-js`, `rev`, or
    /// the `concat` marker.
    Named(String),
    /// Pipes the asset through an external program's stdin and stdout.
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Regex substitution over the asset contents.
    Replace { replace: String, with: String },
}

impl StepConfig {
    pub fn named(name: impl Into<String>) -> Self {
        StepConfig::Named(name.into())
    }

    pub fn is_concat_marker(&self) -> bool {
        matches!(self, StepConfig::Named(name) if name == CONCAT_MARKER)
    }

    /// Instantiates the step. Commands run with `root` as working directory.
    pub fn build(&self, root: &Path) -> Result<Arc<dyn TransformStep>> {
        let step: Arc<dyn TransformStep> = match self {
            StepConfig::Named(name) => match name.as_str() {
                "minify-css" => Arc::new(MinifyCss::new()),
                "minify-html" => Arc::new(MinifyHtml::new()),
                "minify-js" => Arc::new(MinifyJs::new()),
                "rev" => Arc::new(Rev::new()),
                CONCAT_MARKER => {
                    return Err(Error::Config(
                        "'concat' is only meaningful in usemin step lists; use the pipeline 'concat' option instead".to_string(),
                    ))
                }
                other => {
                    return Err(Error::Config(format!(
                        "Unknown transform step '{}'. Built-in steps: minify-css, minify-html, minify-js, rev",
                        other
                    )))
                }
            },
            StepConfig::Command { command, args } => {
                Arc::new(CommandStep::new(command, args.clone()).with_cwd(root))
            }
            StepConfig::Replace { replace, with } => Arc::new(ReplaceStep::new(replace, with)?),
        };
        Ok(step)
    }
}

/// Builds a list of steps, rejecting the `concat` marker.
pub fn build_steps(configs: &[StepConfig], root: &Path) -> Result<Vec<Arc<dyn TransformStep>>> {
    configs.iter().map(|config| config.build(root)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_config_forms() {
        #[derive(Deserialize)]
        struct Steps {
            steps: Vec<StepConfig>,
        }

        let parsed: Steps = toml::from_str(
            r#"
steps = [
    "minify-js",
    { command = "babel", args = ["--no-babelrc"] },
    { replace = "DEBUG", with = "false" },
]
"#,
        )
        .unwrap();

        assert_eq!(parsed.steps[0], StepConfig::named("minify-js"));
        assert!(matches!(
            &parsed.steps[1],
            StepConfig::Command { command, args } if command == "babel" && args.len() == 1
        ));
        assert!(matches!(&parsed.steps[2], StepConfig::Replace { .. }));
    }

    #[test]
    fn test_unknown_step_is_configuration_error() {
        let err = StepConfig::named("uglify").build(Path::new(".")).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("uglify"));
    }

    #[test]
    fn test_concat_marker_rejected_outside_usemin() {
        assert!(StepConfig::named("concat").is_concat_marker());
        assert!(build_steps(&[StepConfig::named("concat")], Path::new(".")).is_err());
    }

    #[tokio::test]
    async fn test_apply_all_runs_steps_in_order() {
        let steps = build_steps(
            &[
                StepConfig::Replace {
                    replace: "a".to_string(),
                    with: "b".to_string(),
                },
                StepConfig::Replace {
                    replace: "b".to_string(),
                    with: "c".to_string(),
                },
            ],
            Path::new("."),
        )
        .unwrap();

        let out = apply_all(&steps, Asset::new("x.txt", "aaa")).await.unwrap();
        assert_eq!(out.contents, "ccc");
    }
}
