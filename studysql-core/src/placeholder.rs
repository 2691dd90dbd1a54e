//! Placeholder rewriting
//!
//! Call sites write `%s` for every bound parameter. Each engine rewrites the
//! markers to its own syntax before execution: `?` for SQLite, `$1..$n` for
//! PostgreSQL. Markers inside single-quoted literals, double-quoted
//! identifiers and comments are left alone, so console text such as
//! `LIKE '%sample%'` survives untouched.

/// Positional marker style of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`
    Question,
    /// `$1`, `$2`, ...
    Numbered,
}

/// Span of text that markers cannot appear in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    Code,
    /// `'...'`, with `''` as an escaped quote
    Literal,
    /// `"..."`
    Identifier,
    /// `-- ...` up to the end of the line
    LineComment,
    /// `/* ... */`
    BlockComment,
}

/// Rewrite `%s` markers outside literals, identifiers and comments into
/// `style`.
///
/// Already-native text is returned unchanged, so the rewrite is idempotent.
pub fn rewrite(sql: &str, style: PlaceholderStyle) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut span = Span::Code;
    let mut index = 0usize;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match (span, c) {
            (Span::Code, '%') if chars.peek() == Some(&'s') => {
                chars.next();
                index += 1;
                match style {
                    PlaceholderStyle::Question => out.push('?'),
                    PlaceholderStyle::Numbered => {
                        out.push('$');
                        out.push_str(&index.to_string());
                    }
                }
                continue;
            }
            // '' inside a literal closes and reopens it, which is equivalent
            (Span::Code, '\'') => span = Span::Literal,
            (Span::Literal, '\'') => span = Span::Code,
            (Span::Code, '"') => span = Span::Identifier,
            (Span::Identifier, '"') => span = Span::Code,
            (Span::Code, '-') if chars.peek() == Some(&'-') => {
                span = Span::LineComment;
            }
            (Span::LineComment, '\n') => span = Span::Code,
            (Span::Code, '/') if chars.peek() == Some(&'*') => {
                out.push(c);
                if let Some(star) = chars.next() {
                    out.push(star);
                }
                span = Span::BlockComment;
                continue;
            }
            (Span::BlockComment, '*') if chars.peek() == Some(&'/') => {
                out.push(c);
                if let Some(slash) = chars.next() {
                    out.push(slash);
                }
                span = Span::Code;
                continue;
            }
            _ => {}
        }
        out.push(c);
    }

    out
}
