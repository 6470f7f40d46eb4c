//! Markup minification.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Asset, TransformStep};
use crate::error::Result;

static RAW_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?is)<pre\b.*?</pre\s*>|<textarea\b.*?</textarea\s*>",
        r"|<script\b.*?</script\s*>|<style\b.*?</style\s*>",
    ))
    .expect("valid raw block regex")
});
static COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static NEWLINE_BETWEEN_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r">\s*\n\s*<").expect("valid tag gap regex"));
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}|\n").expect("valid whitespace regex"));

#[derive(Debug, Clone, Default)]
pub struct MinifyHtml;

impl MinifyHtml {
    pub fn new() -> Self {
        Self
    }
}

fn is_conditional_comment(comment: &str) -> bool {
    comment.starts_with("<!--[if") || comment.contains("<![endif]")
}

fn minify_fragment(fragment: &str) -> String {
    let without_comments = COMMENT.replace_all(fragment, |caps: &regex::Captures| {
        let comment = &caps[0];
        if is_conditional_comment(comment) {
            comment.to_string()
        } else {
            String::new()
        }
    });
    let joined = NEWLINE_BETWEEN_TAGS.replace_all(&without_comments, "><");
    WHITESPACE_RUN.replace_all(&joined, " ").into_owned()
}

/// Strips comments and formatting whitespace from markup.
///
/// Conditional comments survive, and the bodies of `pre`, `textarea`,
/// `script` and `style` elements are copied untouched.
pub fn minify_html(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for block in RAW_BLOCK.find_iter(source) {
        out.push_str(&minify_fragment(&source[last..block.start()]));
        out.push_str(block.as_str());
        last = block.end();
    }
    out.push_str(&minify_fragment(&source[last..]));

    out.trim().to_string()
}

#[async_trait]
impl TransformStep for MinifyHtml {
    fn name(&self) -> &str {
        "minify-html"
    }

    async fn apply(&self, asset: Asset) -> Result<Asset> {
        Ok(Asset {
            contents: minify_html(&asset.contents),
            path: asset.path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_formatting_whitespace() {
        let html = "<html>\n  <body>\n    <p>Hello   world</p>\n  </body>\n</html>\n";
        assert_eq!(
            minify_html(html),
            "<html><body><p>Hello world</p></body></html>"
        );
    }

    #[test]
    fn test_drops_comments_but_keeps_conditionals() {
        let html = "<div><!-- note --><!--[if IE]><p>old</p><![endif]--></div>";
        assert_eq!(
            minify_html(html),
            "<div><!--[if IE]><p>old</p><![endif]--></div>"
        );
    }

    #[test]
    fn test_preserves_raw_blocks() {
        let html = "<div>\n  <pre>  keep\n   this</pre>\n  <script>\n  var a = 1;  // x\n</script>\n</div>";
        let out = minify_html(html);
        assert!(out.contains("<pre>  keep\n   this</pre>"));
        assert!(out.contains("<script>\n  var a = 1;  // x\n</script>"));
    }

    #[test]
    fn test_keeps_inline_spacing() {
        assert_eq!(minify_html("<b>a</b> <i>b</i>"), "<b>a</b> <i>b</i>");
    }
}
