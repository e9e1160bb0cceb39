use serde::Serialize;

/// Where an element started in the source text. Line and column are
/// 1-based; offset is the byte position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourcePos {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// How an attribute was written in the markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AstAttributeKind {
    /// `name="value"`, a plain literal.
    Literal,
    /// `:name="expr"`, the value is a script expression.
    ScriptBind,
    /// `{name}`, expands into multiple logical attributes at evaluation time.
    Spread,
    /// `name` with no value at all, shorthand for a true flag.
    BooleanFlag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AstAttribute {
    pub name: String,
    pub kind: AstAttributeKind,
    pub value: Option<String>,
}

impl AstAttribute {
    /// The literal or expression text, empty when absent.
    pub fn value_str(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

/// What an element contains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AstChildren {
    Elements(Vec<AstElement>),
    Text(String),
    Empty,
}

/// A parsed markup node, before type binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AstElement {
    pub tag: String,
    pub attributes: Vec<AstAttribute>,
    pub children: AstChildren,
    pub position: SourcePos,
}

impl AstElement {
    /// First attribute with the given name, case-insensitive.
    pub fn attribute(&self, name: &str) -> Option<&AstAttribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// The text content, if the element holds text.
    pub fn text(&self) -> Option<&str> {
        match &self.children {
            AstChildren::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Child elements, empty for text or empty content.
    pub fn child_elements(&self) -> &[AstElement] {
        match &self.children {
            AstChildren::Elements(children) => children,
            _ => &[],
        }
    }
}

/// Syntax knobs for the markup dialect.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Leading character marking an attribute as script-bound.
    pub bind_prefix: char,
    /// Opening character of a spread attribute name.
    pub spread_open: char,
    /// Closing character of a spread attribute name.
    pub spread_close: char,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            bind_prefix: ':',
            spread_open: '{',
            spread_close: '}',
        }
    }
}
