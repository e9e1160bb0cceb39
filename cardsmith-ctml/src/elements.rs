use crate::ast::AstAttribute;
use crate::unit::CardUnit;

/// A value that is either a converted literal or a script expression to be
/// evaluated later. Keeps the originating attribute for diagnostics.
///
/// Both halves can end up set when duplicate attributes target the same
/// field; evaluation prefers the expression.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue<T> {
    pub literal: Option<T>,
    pub expression: Option<String>,
    pub source: Option<AstAttribute>,
}

impl<T> BoundValue<T> {
    pub fn literal(value: T) -> Self {
        Self {
            literal: Some(value),
            expression: None,
            source: None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.expression.is_some()
    }

    pub fn is_set(&self) -> bool {
        self.literal.is_some() || self.expression.is_some()
    }
}

impl<T> Default for BoundValue<T> {
    fn default() -> Self {
        Self {
            literal: None,
            expression: None,
            source: None,
        }
    }
}

/// Positional fields shared by every drawable element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placement {
    pub x: BoundValue<CardUnit>,
    pub y: BoundValue<CardUnit>,
    pub width: BoundValue<CardUnit>,
    pub height: BoundValue<CardUnit>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextElement {
    pub placement: Placement,
    pub value: BoundValue<String>,
    pub font_size: BoundValue<CardUnit>,
    pub color: BoundValue<String>,
    pub vertical_align: BoundValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageElement {
    pub placement: Placement,
    pub src: BoundValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RectangleElement {
    pub placement: Placement,
    pub radius: BoundValue<CardUnit>,
    pub color: BoundValue<String>,
    pub border_color: BoundValue<String>,
    pub border_width: BoundValue<CardUnit>,
    pub children: Vec<BoundElement>,
}

/// Fills the whole surface with one color.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClearElement {
    pub color: BoundValue<String>,
}

/// Renders its children only when the condition holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IfDirective {
    pub condition: BoundValue<bool>,
    pub children: Vec<BoundElement>,
}

/// Repeats its children once per item of a script-provided collection.
/// The loop variable name is a plain literal, never script-bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForeachDirective {
    pub each: BoundValue<String>,
    pub var_name: Option<String>,
    pub children: Vec<BoundElement>,
}

/// Repeats its children over a numeric range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeDirective {
    pub start: BoundValue<f64>,
    pub end: BoundValue<f64>,
    pub step: BoundValue<f64>,
    pub var_name: Option<String>,
    pub children: Vec<BoundElement>,
}

/// A typed element produced by binding an AST element.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundElement {
    Text(TextElement),
    Image(ImageElement),
    Rectangle(RectangleElement),
    Clear(ClearElement),
    If(IfDirective),
    Foreach(ForeachDirective),
    Range(RangeDirective),
}

impl BoundElement {
    pub fn tag(&self) -> &'static str {
        match self {
            BoundElement::Text(_) => "text",
            BoundElement::Image(_) => "image",
            BoundElement::Rectangle(_) => "rectangle",
            BoundElement::Clear(_) => "clear",
            BoundElement::If(_) => "if",
            BoundElement::Foreach(_) => "foreach",
            BoundElement::Range(_) => "range",
        }
    }

    /// Child elements for container variants, empty otherwise.
    pub fn children(&self) -> &[BoundElement] {
        match self {
            BoundElement::Rectangle(el) => &el.children,
            BoundElement::If(el) => &el.children,
            BoundElement::Foreach(el) => &el.children,
            BoundElement::Range(el) => &el.children,
            _ => &[],
        }
    }

    /// Every script expression bound in this element and its descendants,
    /// in document order. Lets callers validate or precompile the lot.
    pub fn bound_expressions(&self) -> Vec<&str> {
        let mut sources = Vec::new();
        self.collect_expressions(&mut sources);
        sources
    }

    fn collect_expressions<'a>(&'a self, sources: &mut Vec<&'a str>) {
        fn push<'a, T>(sources: &mut Vec<&'a str>, value: &'a BoundValue<T>) {
            if let Some(expression) = value.expression.as_deref() {
                sources.push(expression);
            }
        }
        fn push_placement<'a>(sources: &mut Vec<&'a str>, placement: &'a Placement) {
            push(sources, &placement.x);
            push(sources, &placement.y);
            push(sources, &placement.width);
            push(sources, &placement.height);
        }

        match self {
            BoundElement::Text(el) => {
                push_placement(sources, &el.placement);
                push(sources, &el.value);
                push(sources, &el.font_size);
                push(sources, &el.color);
                push(sources, &el.vertical_align);
            }
            BoundElement::Image(el) => {
                push_placement(sources, &el.placement);
                push(sources, &el.src);
            }
            BoundElement::Rectangle(el) => {
                push_placement(sources, &el.placement);
                push(sources, &el.radius);
                push(sources, &el.color);
                push(sources, &el.border_color);
                push(sources, &el.border_width);
            }
            BoundElement::Clear(el) => push(sources, &el.color),
            BoundElement::If(el) => push(sources, &el.condition),
            BoundElement::Foreach(el) => push(sources, &el.each),
            BoundElement::Range(el) => {
                push(sources, &el.start);
                push(sources, &el.end);
                push(sources, &el.step);
            }
        }
        for child in self.children() {
            child.collect_expressions(sources);
        }
    }
}
