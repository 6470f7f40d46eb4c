//! Conservative JavaScript minification.
//!
//! Removes comments, indentation, trailing whitespace and blank lines while
//! copying string, template and regular-expression literals verbatim. Line
//! breaks between statements are kept so automatic semicolon insertion still
//! sees the same program. `/*! ... */` banner comments are preserved.

use async_trait::async_trait;

use super::{transform_error, Asset, TransformStep};
use crate::error::Result;

const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case",
    "do", "else", "yield", "await",
];

#[derive(Debug, Clone, Default)]
pub struct MinifyJs;

impl MinifyJs {
    pub fn new() -> Self {
        Self
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Decides whether a `/` at this point starts a regular expression literal,
/// based on the last significant token already emitted.
fn regex_allowed(out: &str) -> bool {
    let trimmed = out.trim_end();
    let last = match trimmed.chars().last() {
        Some(c) => c,
        None => return true,
    };

    if is_ident_char(last) {
        let word: String = trimmed
            .chars()
            .rev()
            .take_while(|c| is_ident_char(*c))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return REGEX_PRECEDING_KEYWORDS.contains(&word.as_str());
    }

    match last {
        ')' | ']' | '\'' | '"' | '`' => false,
        '+' | '-' => {
            // `a++ / b` is a division, `x = +/re/.test(s)` is not.
            let mut tail = trimmed.chars().rev();
            tail.next();
            tail.next() != Some(last)
        }
        _ => true,
    }
}

fn push_space(out: &mut String) {
    if !out.is_empty() && !out.ends_with(&[' ', '\n'][..]) {
        out.push(' ');
    }
}

fn push_newline(out: &mut String) {
    while out.ends_with(&[' ', '\t'][..]) {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Minifies `source`, returning an error message for unterminated literals
/// or comments.
pub fn minify_js(source: &str) -> std::result::Result<String, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' | '\r' => {
                push_newline(&mut out);
                i += 1;
            }
            ' ' | '\t' | '\u{feff}' => {
                push_space(&mut out);
                i += 1;
            }
            '"' | '\'' => {
                let start = i;
                i += 1;
                loop {
                    match chars.get(i) {
                        None | Some('\n') => {
                            return Err(format!("Unterminated string literal at offset {}", start))
                        }
                        Some('\\') => i += 2,
                        Some(&q) if q == c => {
                            i += 1;
                            break;
                        }
                        Some(_) => i += 1,
                    }
                }
                out.extend(&chars[start..i.min(chars.len())]);
            }
            '`' => {
                let start = i;
                i += 1;
                let mut depth = 0usize;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(format!("Unterminated template literal at offset {}", start))
                        }
                        Some('\\') => i += 2,
                        Some('$') if chars.get(i + 1) == Some(&'{') => {
                            depth += 1;
                            i += 2;
                        }
                        Some('}') if depth > 0 => {
                            depth -= 1;
                            i += 1;
                        }
                        Some('`') if depth == 0 => {
                            i += 1;
                            break;
                        }
                        Some(_) => i += 1,
                    }
                }
                out.extend(&chars[start..i.min(chars.len())]);
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = i;
                let end = (i + 2..chars.len().saturating_sub(1))
                    .find(|&j| chars[j] == '*' && chars[j + 1] == '/')
                    .ok_or_else(|| format!("Unterminated block comment at offset {}", start))?;
                let body = &chars[start..end + 2];
                if chars.get(start + 2) == Some(&'!') {
                    out.extend(body);
                    push_newline(&mut out);
                } else if body.contains(&'\n') {
                    push_newline(&mut out);
                } else {
                    push_space(&mut out);
                }
                i = end + 2;
            }
            '/' if regex_allowed(&out) => {
                let start = i;
                i += 1;
                let mut in_class = false;
                loop {
                    match chars.get(i) {
                        None | Some('\n') => {
                            return Err(format!(
                                "Unterminated regular expression at offset {}",
                                start
                            ))
                        }
                        Some('\\') => i += 2,
                        Some('[') => {
                            in_class = true;
                            i += 1;
                        }
                        Some(']') => {
                            in_class = false;
                            i += 1;
                        }
                        Some('/') if !in_class => {
                            i += 1;
                            break;
                        }
                        Some(_) => i += 1,
                    }
                }
                out.extend(&chars[start..i.min(chars.len())]);
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    push_newline(&mut out);
    Ok(out)
}

#[async_trait]
impl TransformStep for MinifyJs {
    fn name(&self) -> &str {
        "minify-js"
    }

    async fn apply(&self, asset: Asset) -> Result<Asset> {
        let contents =
            minify_js(&asset.contents).map_err(|msg| transform_error(self.name(), &asset, msg))?;
        Ok(Asset {
            path: asset.path,
            contents,
        })
    }
}
