//! External program transform (transpilers, third-party minifiers).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{transform_error, Asset, TransformStep};
use crate::error::Result;

/// Feeds the asset to `program`'s stdin and replaces it with the program's
/// stdout. The asset path is exported as `SLUICE_FILE`.
#[derive(Debug, Clone)]
pub struct CommandStep {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    label: String,
}

impl CommandStep {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let label = if args.is_empty() {
            program.clone()
        } else {
            format!("{} {}", program, args.join(" "))
        };
        Self {
            program,
            args,
            cwd: None,
            label,
        }
    }

    pub fn with_cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }
}

#[async_trait]
impl TransformStep for CommandStep {
    fn name(&self) -> &str {
        &self.label
    }

    async fn apply(&self, asset: Asset) -> Result<Asset> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env("SLUICE_FILE", &asset.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let mut child = command
            .spawn()
            .map_err(|e| transform_error(&self.label, &asset, format!("Failed to spawn: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| transform_error(&self.label, &asset, "Failed to capture stdin"))?;
        let input = asset.contents.clone().into_bytes();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| transform_error(&self.label, &asset, e.to_string()))?;

        if let Ok(Err(e)) = writer.await {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(transform_error(&self.label, &asset, e.to_string()));
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(transform_error(&self.label, &asset, message));
        }

        let contents = String::from_utf8(output.stdout)
            .map_err(|_| transform_error(&self.label, &asset, "Output is not valid UTF-8"))?;

        Ok(Asset {
            path: asset.path,
            contents,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_pipes_contents_through_program() {
        let step = CommandStep::new("tr", vec!["a-z".to_string(), "A-Z".to_string()]);
        let out = step.apply(Asset::new("a.js", "let x = 1;")).await.unwrap();
        assert_eq!(out.contents, "LET X = 1;");
        assert_eq!(out.path, PathBuf::from("a.js"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_transform_error() {
        let step = CommandStep::new(
            "sh",
            vec!["-c".to_string(), "echo 'SyntaxError: bad' >&2; exit 3".to_string()],
        );
        let err = step.apply(Asset::new("broken.es6", "let")).await.unwrap_err();
        match err {
            Error::Transform { path, message, .. } => {
                assert_eq!(path, PathBuf::from("broken.es6"));
                assert!(message.contains("SyntaxError"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let step = CommandStep::new("sluice-definitely-missing-binary", vec![]);
        assert!(step.apply(Asset::new("a.js", "")).await.is_err());
    }
}
