//! Forward-only scanning over raw source text.
//!
//! A [`Cursor`] is a `Copy` position into the source plus an exclusive
//! `limit`. Scanning methods take the cursor by value and hand back a new
//! one on success, so a failed attempt never moves the caller's cursor.

use crate::diagnostic::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor<'src> {
    src: &'src str,
    pos: usize,
    limit: usize,
}

pub fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

pub fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

impl<'src> Cursor<'src> {
    pub fn new(src: &'src str) -> Self {
        Self { src, pos: 0, limit: src.len() }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Same cursor, scanning no further than `limit`.
    pub fn with_limit(self, limit: usize) -> Self {
        Self { limit: limit.min(self.limit).max(self.pos), ..self }
    }

    /// Cursor at `pos`, keeping this cursor's limit.
    pub fn at(self, pos: usize) -> Self {
        Self { pos: pos.min(self.limit), ..self }
    }

    pub fn rest(&self) -> &'src str {
        &self.src[self.pos..self.limit]
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.limit
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn starts_with(&self, lit: &str) -> bool {
        self.rest().starts_with(lit)
    }

    pub fn advance(self, bytes: usize) -> Self {
        self.at(self.pos + bytes)
    }

    pub fn span_from(&self, start: Cursor<'_>) -> Span {
        Span::new(start.pos, self.pos)
    }

    pub fn span(&self) -> Span {
        Span::point(self.pos)
    }

    /// Skips whitespace, `// line` comments and `/* block */` comments.
    pub fn skip_ws(self) -> Self {
        let mut c = self;
        loop {
            let rest = c.rest();
            let trimmed = rest.trim_start();
            c = c.advance(rest.len() - trimmed.len());
            if c.starts_with("//") {
                let end = c.rest().find('\n').unwrap_or(c.rest().len());
                c = c.advance(end);
            } else if c.starts_with("/*") {
                match c.rest()[2..].find("*/") {
                    Some(end) => c = c.advance(end + 4),
                    None => return c.at(c.limit),
                }
            } else {
                return c;
            }
        }
    }

    /// Matches a literal after leading whitespace.
    pub fn eat(self, lit: &str) -> Option<Self> {
        let c = self.skip_ws();
        c.starts_with(lit).then(|| c.advance(lit.len()))
    }

    /// Matches an operator that must not be directly followed by any of
    /// `forbidden` (so `<` does not match the start of `<=`).
    pub fn eat_op(self, op: &str, forbidden: &[char]) -> Option<Self> {
        let after = self.eat(op)?;
        match after.peek() {
            Some(ch) if forbidden.contains(&ch) => None,
            _ => Some(after),
        }
    }

    /// Matches a keyword ending at an identifier boundary.
    pub fn eat_keyword(self, keyword: &str) -> Option<Self> {
        let after = self.eat(keyword)?;
        match after.peek() {
            Some(ch) if is_ident_char(ch) => None,
            _ => Some(after),
        }
    }

    pub fn ident(self) -> Option<(&'src str, Self)> {
        let c = self.skip_ws();
        let rest = c.rest();
        let first = rest.chars().next()?;
        if !is_ident_start(first) {
            return None;
        }
        let len = rest
            .char_indices()
            .find(|(_, ch)| !is_ident_char(*ch))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        Some((&rest[..len], c.advance(len)))
    }

    /// Dotted name such as `Shapes.Circle`.
    pub fn dotted_name(self) -> Option<(String, Self)> {
        let (first, mut c) = self.ident()?;
        let mut name = first.to_string();
        while c.starts_with(".") {
            match c.advance(1).ident() {
                Some((part, next)) if !c.advance(1).rest().starts_with(char::is_whitespace) => {
                    name.push('.');
                    name.push_str(part);
                    c = next;
                }
                _ => break,
            }
        }
        Some((name, c))
    }

    /// Unsigned decimal literal; the flag reports a fractional part.
    pub fn number(self) -> Option<(f64, bool, Self)> {
        let c = self.skip_ws();
        let bytes = c.rest().as_bytes();
        let mut len = 0;
        while len < bytes.len() && bytes[len].is_ascii_digit() {
            len += 1;
        }
        if len == 0 {
            return None;
        }
        let mut is_float = false;
        if len + 1 < bytes.len() && bytes[len] == b'.' && bytes[len + 1].is_ascii_digit() {
            is_float = true;
            len += 1;
            while len < bytes.len() && bytes[len].is_ascii_digit() {
                len += 1;
            }
        }
        if len < bytes.len() && is_ident_char(bytes[len] as char) {
            return None;
        }
        let value = c.rest()[..len].parse().ok()?;
        Some((value, is_float, c.advance(len)))
    }

    /// Quoted string with `"` or `'`; `None` when absent or unterminated.
    pub fn string_literal(self) -> Option<(String, Self)> {
        let c = self.skip_ws();
        let quote = c.peek().filter(|q| *q == '"' || *q == '\'')?;
        let mut out = String::new();
        let mut chars = c.rest().char_indices().skip(1);
        while let Some((i, ch)) = chars.next() {
            match ch {
                '\\' => {
                    let (_, escaped) = chars.next()?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                ch if ch == quote => return Some((out, c.advance(i + ch.len_utf8()))),
                ch => out.push(ch),
            }
        }
        None
    }

    /// Byte offset of the bracket closing the one under the cursor.
    ///
    /// Only brackets of the same type nest; brackets inside string
    /// literals and comments are ignored. `None` when unmatched.
    pub fn matching_bracket(self) -> Option<usize> {
        let open = self.peek()?;
        let close = match open {
            '(' => ')',
            '[' => ']',
            '{' => '}',
            _ => return None,
        };
        let mut depth = 0usize;
        let mut c = self;
        while let Some(ch) = c.peek() {
            match ch {
                '"' | '\'' => {
                    c = c.string_literal().map(|(_, next)| next)?;
                    continue;
                }
                '/' if c.starts_with("//") || c.starts_with("/*") => {
                    let next = c.skip_ws();
                    if next == c {
                        return None;
                    }
                    c = next;
                    continue;
                }
                ch if ch == open => depth += 1,
                ch if ch == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(c.pos);
                    }
                }
                _ => {}
            }
            c = c.advance(ch.len_utf8());
        }
        None
    }
}
