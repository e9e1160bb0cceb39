use crate::ast::{
    AstAttribute, AstAttributeKind, AstChildren, AstElement, ParserConfig,
};
use crate::error::CtmlResult;
use crate::lexer::Scanner;

// ── Public parse entry points ─────────────────────────────────────────────

/// Parse template markup with the default dialect configuration.
pub fn parse_template(src: &str) -> CtmlResult<Vec<AstElement>> {
    parse_template_with_config(src, &ParserConfig::default())
}

/// Parse template markup into a flat list of root elements.
///
/// Parsing is pure: the same text always yields a structurally equal tree
/// and never mutates anything outside the returned value.
pub fn parse_template_with_config(
    src: &str,
    config: &ParserConfig,
) -> CtmlResult<Vec<AstElement>> {
    TemplateParser::new(src, config).parse_root()
}

// ── Parser ────────────────────────────────────────────────────────────────

struct TemplateParser<'a, 'c> {
    scanner: Scanner<'a>,
    config: &'c ParserConfig,
}

impl<'a, 'c> TemplateParser<'a, 'c> {
    fn new(src: &'a str, config: &'c ParserConfig) -> Self {
        Self {
            scanner: Scanner::new(src),
            config,
        }
    }

    /// Parses every top-level element. Text between root elements carries
    /// no meaning and is dropped.
    fn parse_root(&mut self) -> CtmlResult<Vec<AstElement>> {
        let mut elements = Vec::new();
        loop {
            self.scanner.read_text();
            if self.scanner.is_eof() {
                return Ok(elements);
            }
            if self.scanner.starts_with("<!--") {
                self.scanner.skip_until("-->", "comment")?;
                continue;
            }
            if self.scanner.starts_with("</") {
                return Err(self.scanner.err("closing tag without a matching open tag"));
            }
            elements.push(self.parse_element()?);
        }
    }

    fn parse_element(&mut self) -> CtmlResult<AstElement> {
        let position = self.scanner.pos();
        self.scanner.expect('<')?;
        let tag = self.scanner.read_name();
        if tag.is_empty() {
            return Err(self.scanner.err("expected a tag name after '<'"));
        }

        let mut attributes = Vec::new();
        loop {
            self.scanner.skip_whitespace();
            if self.scanner.eat('/') {
                self.scanner.expect('>')?;
                return Ok(AstElement {
                    tag,
                    attributes,
                    children: AstChildren::Empty,
                    position,
                });
            }
            if self.scanner.eat('>') {
                break;
            }
            if self.scanner.is_eof() {
                return Err(self.scanner.err(format!("unterminated tag '{tag}'")));
            }
            attributes.push(self.parse_attribute(&tag)?);
        }

        let children = self.parse_content(&tag)?;
        Ok(AstElement {
            tag,
            attributes,
            children,
            position,
        })
    }

    fn parse_attribute(&mut self, tag: &str) -> CtmlResult<AstAttribute> {
        let raw_name = self.scanner.read_name();
        if raw_name.is_empty() {
            return Err(self
                .scanner
                .err(format!("unexpected character in tag '{tag}'")));
        }

        self.scanner.skip_whitespace();
        let value = if self.scanner.eat('=') {
            self.scanner.skip_whitespace();
            Some(match self.scanner.peek() {
                Some('"' | '\'') => self.scanner.read_quoted()?,
                _ => self.scanner.read_unquoted(),
            })
        } else {
            None
        };

        Ok(self.classify_attribute(raw_name, value))
    }

    /// Classification rules, in order: bind prefix, spread braces,
    /// valueless boolean flag, plain literal.
    fn classify_attribute(&self, raw_name: String, value: Option<String>) -> AstAttribute {
        if let Some(stripped) = raw_name.strip_prefix(self.config.bind_prefix) {
            return AstAttribute {
                name: stripped.trim().to_string(),
                kind: AstAttributeKind::ScriptBind,
                value,
            };
        }

        if let Some(inner) = raw_name
            .strip_prefix(self.config.spread_open)
            .and_then(|rest| rest.strip_suffix(self.config.spread_close))
        {
            return AstAttribute {
                name: inner.trim().to_string(),
                kind: AstAttributeKind::Spread,
                value: None,
            };
        }

        match value {
            None => AstAttribute {
                name: raw_name,
                kind: AstAttributeKind::BooleanFlag,
                value: None,
            },
            Some(value) => AstAttribute {
                name: raw_name,
                kind: AstAttributeKind::Literal,
                value: Some(value),
            },
        }
    }

    /// Parses element content up to the matching close tag, then settles
    /// the child kind: elements win over text, whitespace-only is empty.
    fn parse_content(&mut self, tag: &str) -> CtmlResult<AstChildren> {
        let mut elements = Vec::new();
        let mut text = String::new();

        loop {
            text.push_str(&self.scanner.read_text());
            if self.scanner.is_eof() {
                return Err(self.scanner.err(format!("missing closing tag for '{tag}'")));
            }
            if self.scanner.starts_with("<!--") {
                self.scanner.skip_until("-->", "comment")?;
                continue;
            }
            if self.scanner.starts_with("</") {
                self.scanner.advance();
                self.scanner.advance();
                self.scanner.skip_whitespace();
                let closing = self.scanner.read_name();
                if !closing.eq_ignore_ascii_case(tag) {
                    return Err(self.scanner.err(format!(
                        "mismatched closing tag: expected '</{tag}>', found '</{closing}>'"
                    )));
                }
                self.scanner.skip_whitespace();
                self.scanner.expect('>')?;
                break;
            }
            elements.push(self.parse_element()?);
        }

        if !elements.is_empty() {
            Ok(AstChildren::Elements(elements))
        } else if text.trim().is_empty() {
            Ok(AstChildren::Empty)
        } else {
            Ok(AstChildren::Text(text))
        }
    }
}
