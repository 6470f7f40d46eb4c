//! Regex substitution step.

use async_trait::async_trait;
use regex::Regex;

use super::{Asset, TransformStep};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ReplaceStep {
    pattern: Regex,
    replacement: String,
    label: String,
}

impl ReplaceStep {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::Config(format!("Invalid replace pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            pattern: regex,
            replacement: replacement.to_string(),
            label: format!("replace({})", pattern),
        })
    }
}

#[async_trait]
impl TransformStep for ReplaceStep {
    fn name(&self) -> &str {
        &self.label
    }

    async fn apply(&self, asset: Asset) -> Result<Asset> {
        let contents = self
            .pattern
            .replace_all(&asset.contents, self.replacement.as_str())
            .into_owned();
        Ok(Asset {
            path: asset.path,
            contents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capture_groups_expand() {
        let step = ReplaceStep::new(r"v(\d+)", "version-$1").unwrap();
        let out = step.apply(Asset::new("a.txt", "v1 v22")).await.unwrap();
        assert_eq!(out.contents, "version-1 version-22");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(ReplaceStep::new("(", "").is_err());
    }
}
