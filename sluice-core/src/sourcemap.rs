//! Line-granular source map generation (revision 3).

use serde::Serialize;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const SOURCE_ROOT: &str = "/source/";

fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap<'a> {
    version: u8,
    file: &'a str,
    source_root: &'a str,
    sources: Vec<&'a str>,
    sources_content: Vec<&'a str>,
    names: Vec<&'a str>,
    mappings: String,
}

/// Accumulates generated lines and the source line each one came from.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    sources: Vec<(String, String)>,
    lines: Vec<Option<(usize, usize)>>,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source file and returns its index.
    pub fn add_source(&mut self, name: impl Into<String>, content: impl Into<String>) -> usize {
        self.sources.push((name.into(), content.into()));
        self.sources.len() - 1
    }

    /// Maps `generated_lines` output lines one-to-one onto the lines of
    /// `source`, clamping to the source's last line.
    pub fn map_lines(&mut self, source: usize, generated_lines: usize) {
        let source_lines = self
            .sources
            .get(source)
            .map(|(_, content)| content.lines().count().max(1))
            .unwrap_or(1);
        for line in 0..generated_lines {
            self.lines.push(Some((source, line.min(source_lines - 1))));
        }
    }

    /// Adds output lines that have no source (for example concat separators).
    pub fn skip_lines(&mut self, count: usize) {
        self.lines.extend(std::iter::repeat(None).take(count));
    }

    fn mappings(&self) -> String {
        let mut out = String::new();
        let mut prev_source = 0i64;
        let mut prev_line = 0i64;

        for (index, line) in self.lines.iter().enumerate() {
            if index > 0 {
                out.push(';');
            }
            if let Some((source, source_line)) = line {
                let (source, source_line) = (*source as i64, *source_line as i64);
                encode_vlq(0, &mut out);
                encode_vlq(source - prev_source, &mut out);
                encode_vlq(source_line - prev_line, &mut out);
                encode_vlq(0, &mut out);
                prev_source = source;
                prev_line = source_line;
            }
        }
        out
    }

    /// Serializes the map for the generated file named `file`.
    pub fn to_json(&self, file: &str) -> String {
        let map = RawSourceMap {
            version: 3,
            file,
            source_root: SOURCE_ROOT,
            sources: self.sources.iter().map(|(name, _)| name.as_str()).collect(),
            sources_content: self
                .sources
                .iter()
                .map(|(_, content)| content.as_str())
                .collect(),
            names: Vec::new(),
            mappings: self.mappings(),
        };
        serde_json::to_string(&map).unwrap_or_default()
    }
}

/// Counts output lines the way source maps do (a trailing newline does not
/// start a new mapped line).
pub fn line_count(contents: &str) -> usize {
    contents.lines().count()
}

/// Builds the trailing `sourceMappingURL` comment for a generated file, if
/// its type supports one.
pub fn mapping_url_comment(extension: Option<&str>, map_name: &str) -> Option<String> {
    match extension {
        Some("js") | Some("mjs") | Some("cjs") => {
            Some(format!("//# sourceMappingURL={}\n", map_name))
        }
        Some("css") => Some(format!("/*# sourceMappingURL={} */\n", map_name)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(value: i64) -> String {
        let mut out = String::new();
        encode_vlq(value, &mut out);
        out
    }

    #[test]
    fn test_vlq_encoding() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
        assert_eq!(vlq(-17), "jB");
    }

    #[test]
    fn test_identity_mapping() {
        let mut builder = SourceMapBuilder::new();
        let src = builder.add_source("app.es6", "a\nb\nc\n");
        builder.map_lines(src, 3);
        let json: serde_json::Value = serde_json::from_str(&builder.to_json("app.es6.js")).unwrap();

        assert_eq!(json["version"], 3);
        assert_eq!(json["file"], "app.es6.js");
        assert_eq!(json["sources"][0], "app.es6");
        assert_eq!(json["sourcesContent"][0], "a\nb\nc\n");
        assert_eq!(json["mappings"], "AAAA;AACA;AACA");
    }

    #[test]
    fn test_concatenated_sources() {
        let mut builder = SourceMapBuilder::new();
        let a = builder.add_source("a.js", "1\n2\n");
        let b = builder.add_source("b.js", "3\n");
        builder.map_lines(a, 2);
        builder.skip_lines(1);
        builder.map_lines(b, 1);

        let json: serde_json::Value = serde_json::from_str(&builder.to_json("all.js")).unwrap();
        assert_eq!(json["mappings"], "AAAA;AACA;;ACDA");
    }

    #[test]
    fn test_mapping_url_comment() {
        assert_eq!(
            mapping_url_comment(Some("js"), "a.js.map").unwrap(),
            "//# sourceMappingURL=a.js.map\n"
        );
        assert!(mapping_url_comment(Some("html"), "a.html.map").is_none());
    }
}
