//! Line formatting: turns beautified source into a stable, line-addressable
//! representation the batch splitter and prompts operate on.

use anyhow::{Context, Result};
use std::path::Path;

/// Resolves a beautified position back to original source coordinates.
/// Queried once per formatted line, at column 0.
pub trait SourceMapResolver: Send + Sync {
    fn resolve(&self, line: u32, column: u32) -> Option<SourcePosition>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

/// Resolver for sources without a map: every lookup is unresolved.
#[derive(Debug, Default)]
pub struct NoSourceMap;

impl SourceMapResolver for NoSourceMap {
    fn resolve(&self, _line: u32, _column: u32) -> Option<SourcePosition> {
        None
    }
}

/// In-memory line table built ahead of time, one optional original position
/// per beautified line.
#[derive(Debug, Default)]
pub struct LineTableResolver {
    entries: Vec<Option<SourcePosition>>,
}

impl LineTableResolver {
    pub fn new(entries: Vec<Option<SourcePosition>>) -> Self {
        Self { entries }
    }
}

impl SourceMapResolver for LineTableResolver {
    fn resolve(&self, line: u32, _column: u32) -> Option<SourcePosition> {
        if line == 0 {
            return None;
        }
        self.entries.get(line as usize - 1).copied().flatten()
    }
}

/// One beautified source line, 1-indexed, optionally carrying its original
/// source coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedLine {
    pub line_number: u32,
    pub source_line: Option<u32>,
    pub source_column: Option<u32>,
    pub code: String,
}

impl FormattedLine {
    /// Renders the line with its number embedded, so batch content remains
    /// self-describing after splitting.
    pub fn render(&self) -> String {
        match (self.source_line, self.source_column) {
            (Some(sl), Some(sc)) => {
                format!("{} [src {}:{}]: {}", self.line_number, sl, sc, self.code)
            }
            _ => format!("{}: {}", self.line_number, self.code),
        }
    }
}

/// Supplies beautified code to the formatter. The concrete beautification
/// service is an external collaborator; [`PlainBeautifier`] is the
/// self-contained default that reads the file and bounds string literals.
pub trait Beautifier: Send + Sync {
    fn beautify(&self, path: &Path) -> Result<BeautifiedSource>;
}

pub struct BeautifiedSource {
    pub code: String,
    pub resolver: Box<dyn SourceMapResolver>,
}

pub struct PlainBeautifier {
    literal_char_limit: usize,
}

impl PlainBeautifier {
    pub fn new(literal_char_limit: usize) -> Self {
        Self { literal_char_limit }
    }
}

impl Beautifier for PlainBeautifier {
    fn beautify(&self, path: &Path) -> Result<BeautifiedSource> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let code = truncate_string_literals(&raw, self.literal_char_limit);
        Ok(BeautifiedSource {
            code,
            resolver: Box::new(NoSourceMap),
        })
    }
}

/// Bounds the length of quoted string literals before line splitting, so
/// giant packed-bytecode strings don't blow up the prompt. Lossy on purpose;
/// must run before line numbers are assigned.
pub fn truncate_string_literals(code: &str, char_limit: usize) -> String {
    if char_limit == 0 {
        return code.to_string();
    }

    let mut out = String::with_capacity(code.len());
    let mut chars = code.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            // Comments pass through untouched; an apostrophe in one is not a
            // literal opener.
            '/' if chars.peek() == Some(&'/') => {
                out.push(c);
                for next in chars.by_ref() {
                    out.push(next);
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                out.push(c);
                if let Some(star) = chars.next() {
                    out.push(star);
                }
                let mut prev = ' ';
                for next in chars.by_ref() {
                    out.push(next);
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '"' | '\'' | '`' => {
                let quote = c;
                out.push(quote);
                let mut literal = String::new();
                let mut escaped = false;
                let mut closed = false;

                for next in chars.by_ref() {
                    if escaped {
                        literal.push(next);
                        escaped = false;
                        continue;
                    }
                    match next {
                        '\\' => {
                            literal.push(next);
                            escaped = true;
                        }
                        n if n == quote => {
                            closed = true;
                            break;
                        }
                        // Template literals may span lines; keep them intact
                        // so line numbering stays stable.
                        '\n' if quote != '`' => {
                            closed = true;
                            literal.push('\n');
                            break;
                        }
                        n => literal.push(n),
                    }
                }

                if literal.chars().count() > char_limit && !literal.contains('\n') {
                    let kept: String = literal.chars().take(char_limit).collect();
                    out.push_str(&kept);
                    out.push_str("...");
                } else {
                    out.push_str(&literal);
                }
                if closed && !literal.ends_with('\n') {
                    out.push(quote);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Produces one [`FormattedLine`] per input line, 1-indexed, lossless and
/// order preserving.
pub fn format_lines(code: &str, resolver: &dyn SourceMapResolver) -> Vec<FormattedLine> {
    code.lines()
        .enumerate()
        .map(|(idx, line)| {
            let line_number = idx as u32 + 1;
            let resolved = resolver.resolve(line_number, 0);
            FormattedLine {
                line_number,
                source_line: resolved.map(|p| p.line),
                source_column: resolved.map(|p| p.column),
                code: line.to_string(),
            }
        })
        .collect()
}

/// Like [`format_lines`] but restricted to an inclusive line range. `start`
/// is clamped into `[1, total]` first, then `end` is clamped to
/// `[start, total]`.
pub fn format_line_range(
    code: &str,
    resolver: &dyn SourceMapResolver,
    start: u32,
    end: u32,
) -> Vec<FormattedLine> {
    let all = format_lines(code, resolver);
    if all.is_empty() {
        return all;
    }

    let total = all.len() as u32;
    let start = start.clamp(1, total);
    let end = end.clamp(start, total);

    all.into_iter()
        .filter(|l| l.line_number >= start && l.line_number <= end)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lines_is_lossless_and_ordered() {
        let code = "var a = 1;\nwhile (true) {\n  a++;\n}";
        let lines = format_lines(code, &NoSourceMap);

        assert_eq!(lines.len(), 4);
        for (idx, line) in lines.iter().enumerate() {
            assert_eq!(line.line_number, idx as u32 + 1);
            assert!(line.source_line.is_none());
            assert!(line.source_column.is_none());
        }
        assert_eq!(lines[1].code, "while (true) {");
    }

    #[test]
    fn test_format_lines_resolves_source_positions() {
        let resolver = LineTableResolver::new(vec![
            Some(SourcePosition { line: 1, column: 0 }),
            None,
            Some(SourcePosition { line: 1, column: 87 }),
        ]);
        let lines = format_lines("a;\nb;\nc;", &resolver);

        assert_eq!(lines[0].source_line, Some(1));
        assert_eq!(lines[0].source_column, Some(0));
        assert!(lines[1].source_line.is_none());
        assert_eq!(lines[2].source_column, Some(87));
    }

    #[test]
    fn test_render_embeds_line_number() {
        let plain = FormattedLine {
            line_number: 12,
            source_line: None,
            source_column: None,
            code: "var x = 0;".to_string(),
        };
        assert_eq!(plain.render(), "12: var x = 0;");

        let mapped = FormattedLine {
            line_number: 12,
            source_line: Some(1),
            source_column: Some(340),
            code: "var x = 0;".to_string(),
        };
        assert_eq!(mapped.render(), "12 [src 1:340]: var x = 0;");
    }

    #[test]
    fn test_format_line_range_clamps() {
        let code = "a;\nb;\nc;\nd;\ne;";

        let mid = format_line_range(code, &NoSourceMap, 2, 4);
        assert_eq!(mid.len(), 3);
        assert_eq!(mid[0].line_number, 2);
        assert_eq!(mid[2].line_number, 4);

        // start below 1 and end past the file clamp to the full range
        let all = format_line_range(code, &NoSourceMap, 0, 100);
        assert_eq!(all.len(), 5);

        // end before start clamps to a single line
        let single = format_line_range(code, &NoSourceMap, 3, 1);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].line_number, 3);
    }

    #[test]
    fn test_truncate_string_literals() {
        let code = r#"var bytecode = "AAAAAAAAAA"; var short = "ok";"#;
        let out = truncate_string_literals(code, 4);
        assert!(out.contains(r#""AAAA...""#));
        assert!(out.contains(r#""ok""#));
    }

    #[test]
    fn test_truncate_preserves_line_count() {
        let code = "var a = \"AAAAAAAAAAAA\";\nvar b = 'BBBBBBBBBBBB';\nvar c = 1;";
        let out = truncate_string_literals(code, 4);
        assert_eq!(out.lines().count(), code.lines().count());
    }

    #[test]
    fn test_truncate_ignores_apostrophes_in_line_comments() {
        let code = "// don't worry, it isn't a literal\nvar bc = \"AAAAAAAAAA\";";
        let out = truncate_string_literals(code, 4);
        assert!(out.contains("// don't worry, it isn't a literal"));
        assert!(out.contains("\"AAAA...\""));
    }

    #[test]
    fn test_truncate_ignores_quotes_in_block_comments() {
        let code = "/* it's \"quoted\" here\n   and spans lines */\nvar s = 'BBBBBBBBBB';";
        let out = truncate_string_literals(code, 4);
        assert!(out.contains("it's \"quoted\" here"));
        assert!(out.contains("'BBBB...'"));
        assert_eq!(out.lines().count(), code.lines().count());
    }

    #[test]
    fn test_truncate_respects_escapes() {
        let code = r#"var s = "ab\"cdefgh";"#;
        let out = truncate_string_literals(code, 20);
        assert_eq!(out, code);
    }
}
