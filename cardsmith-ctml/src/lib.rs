//! # Card Template Markup Language (CTML)
//!
//! The markup dialect behind cardsmith card templates: a tag tree with
//! script-bindable attributes, CSS-like measurement units, and a closed,
//! statically known element vocabulary.
//!
//! ## Features
//! - Measurement units (`px`, `cm`, `mm`, `q`, `in`, `pc`, `pt`, `%`, `em`,
//!   `vw`, `vh`, `rp`) resolved against a hierarchical size context
//! - Markup parsing with source positions, bind-prefixed attributes
//!   (`:value="expr"`), spread attributes (`{props}`) and boolean flags
//! - An explicit element registry binding AST elements into typed elements
//!   with literal-or-script-bound attribute values
//!
//! ## Example
//! ```ignore
//! use cardsmith_ctml::{bind_template, parse_template};
//!
//! let markup = r#"
//! <rectangle color="#1a1a2e" radius="4px">
//!   <text x="10px" y="10px" :value="card.title" />
//! </rectangle>
//! "#;
//!
//! let ast = parse_template(markup)?;
//! let elements = bind_template(&ast, true)?;
//! # Ok::<(), cardsmith_ctml::CtmlError>(())
//! ```

pub mod ast;
pub mod bind;
pub mod context;
pub mod elements;
pub mod error;
mod lexer;
pub mod parser;
pub mod unit;

// --- Core types ---
pub use ast::{AstAttribute, AstAttributeKind, AstChildren, AstElement, ParserConfig, SourcePos};
pub use context::SizeContext;
pub use elements::{
    BoundElement, BoundValue, ClearElement, ForeachDirective, IfDirective, ImageElement,
    Placement, RangeDirective, RectangleElement, TextElement,
};
pub use error::{CtmlError, CtmlResult};
pub use unit::{Axis, CardUnit, UnitKind};

/// Parse template markup with the default dialect configuration.
pub fn parse_template(src: &str) -> CtmlResult<Vec<AstElement>> {
    parser::parse_template(src)
}

/// Parse template markup with a custom dialect configuration.
pub fn parse_template_with_config(src: &str, config: &ParserConfig) -> CtmlResult<Vec<AstElement>> {
    parser::parse_template_with_config(src, config)
}

/// Bind parsed elements against the registry. Strict mode aborts on the
/// first problem; lenient mode logs and skips where recoverable.
pub fn bind_template(elements: &[AstElement], strict: bool) -> CtmlResult<Vec<BoundElement>> {
    bind::bind_template(elements, strict)
}
