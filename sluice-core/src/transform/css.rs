//! CSS minification backed by lightningcss.

use async_trait::async_trait;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

use super::{transform_error, Asset, TransformStep};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct MinifyCss;

impl MinifyCss {
    pub fn new() -> Self {
        Self
    }
}

/// Parses, minifies and reprints a stylesheet.
pub fn minify_css(source: &str) -> std::result::Result<String, String> {
    let mut sheet =
        StyleSheet::parse(source, ParserOptions::default()).map_err(|e| e.to_string())?;
    sheet
        .minify(MinifyOptions::default())
        .map_err(|e| e.to_string())?;
    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;
    Ok(printed.code)
}

#[async_trait]
impl TransformStep for MinifyCss {
    fn name(&self) -> &str {
        "minify-css"
    }

    async fn apply(&self, asset: Asset) -> Result<Asset> {
        let contents =
            minify_css(&asset.contents).map_err(|msg| transform_error(self.name(), &asset, msg))?;
        Ok(Asset {
            path: asset.path,
            contents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minifies_whitespace_and_colors() {
        let css = "body {\n  color: #ff0000;\n  margin: 0px;\n}\n";
        let out = minify_css(css).unwrap();
        assert!(!out.contains('\n'));
        assert!(out.starts_with("body{"));
        assert!(out.contains("red"));
    }

    #[tokio::test]
    async fn test_step_keeps_path() {
        let out = MinifyCss::new()
            .apply(Asset::new("site.css", "a {\n  margin: 0px;\n}\n"))
            .await
            .unwrap();
        assert_eq!(out.path, std::path::PathBuf::from("site.css"));
        assert_eq!(out.contents, "a{margin:0}");
    }
}
