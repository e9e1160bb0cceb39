use crate::ast::SourcePos;
use crate::error::{CtmlError, CtmlResult};

// ── Scanner ───────────────────────────────────────────────────────────────

/// Character cursor over the raw markup text, tracking byte offset plus
/// 1-based line and column for diagnostics.
pub(crate) struct Scanner<'a> {
    src: &'a str,
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            src,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    pub(crate) fn pos(&self) -> SourcePos {
        SourcePos {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.offset >= self.src.len()
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.src[self.offset..].chars().next()
    }

    pub(crate) fn starts_with(&self, prefix: &str) -> bool {
        self.src[self.offset..].starts_with(prefix)
    }

    pub(crate) fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Consumes `expected` if it is next. Returns whether it did.
    pub(crate) fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, expected: char) -> CtmlResult<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.err(format!(
                "expected '{}', found {}",
                expected,
                match self.peek() {
                    Some(ch) => format!("'{ch}'"),
                    None => "end of input".to_string(),
                }
            )))
        }
    }

    pub(crate) fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
    }

    /// Skips past the given terminator, consuming it. Errors at EOF.
    pub(crate) fn skip_until(&mut self, terminator: &str, what: &str) -> CtmlResult<()> {
        while !self.is_eof() {
            if self.starts_with(terminator) {
                for _ in 0..terminator.chars().count() {
                    self.advance();
                }
                return Ok(());
            }
            self.advance();
        }
        Err(self.err(format!("unterminated {what}")))
    }

    /// Reads a tag or attribute name: everything up to whitespace or a
    /// markup delimiter. Spread braces and the bind prefix stay in the raw
    /// name; classification happens later.
    pub(crate) fn read_name(&mut self) -> String {
        let start = self.offset;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || matches!(ch, '=' | '>' | '/' | '<' | '"' | '\'') {
                break;
            }
            self.advance();
        }
        self.src[start..self.offset].to_string()
    }

    /// Reads a quoted attribute value, decoding the basic entities.
    pub(crate) fn read_quoted(&mut self) -> CtmlResult<String> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.err("expected a quoted value")),
        };
        self.advance();
        let start = self.offset;
        while let Some(ch) = self.peek() {
            if ch == quote {
                let raw = &self.src[start..self.offset];
                self.advance();
                return Ok(decode_entities(raw));
            }
            self.advance();
        }
        Err(self.err("unterminated quoted value"))
    }

    /// Reads an unquoted attribute value: up to whitespace or tag end.
    pub(crate) fn read_unquoted(&mut self) -> String {
        let start = self.offset;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || matches!(ch, '>' | '/') {
                break;
            }
            self.advance();
        }
        decode_entities(&self.src[start..self.offset])
    }

    /// Reads raw text up to the next `<` (or EOF), decoding entities.
    pub(crate) fn read_text(&mut self) -> String {
        let start = self.offset;
        while let Some(ch) = self.peek() {
            if ch == '<' {
                break;
            }
            self.advance();
        }
        decode_entities(&self.src[start..self.offset])
    }

    pub(crate) fn err(&self, message: impl Into<String>) -> CtmlError {
        CtmlError::Markup {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }
}

// ── Entities ──────────────────────────────────────────────────────────────

/// Decodes the five predefined entities. Anything else passes through.
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        let mut replaced = false;
        for (entity, ch) in [
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&apos;", '\''),
            ("&amp;", '&'),
        ] {
            if rest.starts_with(entity) {
                out.push(ch);
                rest = &rest[entity.len()..];
                replaced = true;
                break;
            }
        }
        if !replaced {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}
