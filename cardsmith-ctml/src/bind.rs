use log::warn;
use once_cell::sync::Lazy;

use crate::ast::{AstAttribute, AstAttributeKind, AstChildren, AstElement};
use crate::elements::*;
use crate::error::{CtmlError, CtmlResult};
use crate::unit::CardUnit;

// ── Descriptor table ──────────────────────────────────────────────────────

type ApplyFn = fn(&mut BoundElement, &AstElement, &AstAttribute) -> CtmlResult<()>;
type ChildrenFn = fn(&mut BoundElement, Vec<BoundElement>);
type TextFn = fn(&mut BoundElement, String);

/// One bindable attribute of an element variant.
pub struct AttributeDescriptor {
    pub names: &'static [&'static str],
    /// Whether the target field accepts a script expression.
    pub bindable: bool,
    apply: ApplyFn,
}

/// Registry entry for one element variant.
pub struct ElementDescriptor {
    pub tags: &'static [&'static str],
    construct: fn() -> BoundElement,
    attributes: &'static [AttributeDescriptor],
    set_children: Option<ChildrenFn>,
    set_text: Option<TextFn>,
}

macro_rules! unit_slot {
    ($variant:ident, $($field:ident).+) => {
        |element: &mut BoundElement, ast: &AstElement, attr: &AstAttribute| match element {
            BoundElement::$variant(inner) => bind_unit(&mut inner.$($field).+, ast, attr),
            _ => Ok(()),
        }
    };
}

macro_rules! string_slot {
    ($variant:ident, $($field:ident).+) => {
        |element: &mut BoundElement, ast: &AstElement, attr: &AstAttribute| match element {
            BoundElement::$variant(inner) => bind_string(&mut inner.$($field).+, ast, attr),
            _ => Ok(()),
        }
    };
}

macro_rules! bool_slot {
    ($variant:ident, $($field:ident).+) => {
        |element: &mut BoundElement, ast: &AstElement, attr: &AstAttribute| match element {
            BoundElement::$variant(inner) => bind_bool(&mut inner.$($field).+, ast, attr),
            _ => Ok(()),
        }
    };
}

macro_rules! number_slot {
    ($variant:ident, $($field:ident).+) => {
        |element: &mut BoundElement, ast: &AstElement, attr: &AstAttribute| match element {
            BoundElement::$variant(inner) => bind_number(&mut inner.$($field).+, ast, attr),
            _ => Ok(()),
        }
    };
}

macro_rules! plain_slot {
    ($variant:ident, $($field:ident).+) => {
        |element: &mut BoundElement, ast: &AstElement, attr: &AstAttribute| match element {
            BoundElement::$variant(inner) => bind_plain_string(&mut inner.$($field).+, ast, attr),
            _ => Ok(()),
        }
    };
}

macro_rules! placement_attrs {
    ($variant:ident) => {
        [
            AttributeDescriptor { names: &["x"], bindable: true, apply: unit_slot!($variant, placement.x) },
            AttributeDescriptor { names: &["y"], bindable: true, apply: unit_slot!($variant, placement.y) },
            AttributeDescriptor { names: &["width"], bindable: true, apply: unit_slot!($variant, placement.width) },
            AttributeDescriptor { names: &["height"], bindable: true, apply: unit_slot!($variant, placement.height) },
        ]
    };
}

macro_rules! children_slot {
    ($variant:ident) => {
        |element: &mut BoundElement, children: Vec<BoundElement>| {
            if let BoundElement::$variant(inner) = element {
                inner.children = children;
            }
        }
    };
}

static TEXT_ATTRS: Lazy<Vec<AttributeDescriptor>> = Lazy::new(|| {
    let mut attrs = Vec::from(placement_attrs!(Text));
    attrs.push(AttributeDescriptor { names: &["value"], bindable: true, apply: string_slot!(Text, value) });
    attrs.push(AttributeDescriptor { names: &["font-size"], bindable: true, apply: unit_slot!(Text, font_size) });
    attrs.push(AttributeDescriptor { names: &["color"], bindable: true, apply: string_slot!(Text, color) });
    attrs.push(AttributeDescriptor { names: &["vertical-align"], bindable: true, apply: string_slot!(Text, vertical_align) });
    attrs
});

static IMAGE_ATTRS: Lazy<Vec<AttributeDescriptor>> = Lazy::new(|| {
    let mut attrs = Vec::from(placement_attrs!(Image));
    attrs.push(AttributeDescriptor { names: &["src", "source"], bindable: true, apply: string_slot!(Image, src) });
    attrs
});

static RECTANGLE_ATTRS: Lazy<Vec<AttributeDescriptor>> = Lazy::new(|| {
    let mut attrs = Vec::from(placement_attrs!(Rectangle));
    attrs.push(AttributeDescriptor { names: &["radius"], bindable: true, apply: unit_slot!(Rectangle, radius) });
    attrs.push(AttributeDescriptor { names: &["color"], bindable: true, apply: string_slot!(Rectangle, color) });
    attrs.push(AttributeDescriptor { names: &["border-color"], bindable: true, apply: string_slot!(Rectangle, border_color) });
    attrs.push(AttributeDescriptor { names: &["border-width"], bindable: true, apply: unit_slot!(Rectangle, border_width) });
    attrs
});

static CLEAR_ATTRS: [AttributeDescriptor; 1] = [
    AttributeDescriptor { names: &["color"], bindable: true, apply: string_slot!(Clear, color) },
];

static IF_ATTRS: [AttributeDescriptor; 1] = [
    AttributeDescriptor { names: &["con", "condition"], bindable: true, apply: bool_slot!(If, condition) },
];

static FOREACH_ATTRS: [AttributeDescriptor; 2] = [
    AttributeDescriptor { names: &["each"], bindable: true, apply: string_slot!(Foreach, each) },
    AttributeDescriptor { names: &["let"], bindable: false, apply: plain_slot!(Foreach, var_name) },
];

static RANGE_ATTRS: [AttributeDescriptor; 4] = [
    AttributeDescriptor { names: &["start"], bindable: true, apply: number_slot!(Range, start) },
    AttributeDescriptor { names: &["end"], bindable: true, apply: number_slot!(Range, end) },
    AttributeDescriptor { names: &["step"], bindable: true, apply: number_slot!(Range, step) },
    AttributeDescriptor { names: &["let"], bindable: false, apply: plain_slot!(Range, var_name) },
];

/// The closed element vocabulary, built once per process.
static REGISTRY: Lazy<Vec<ElementDescriptor>> = Lazy::new(|| {
    let descriptors = vec![
        ElementDescriptor {
            tags: &["text"],
            construct: || BoundElement::Text(TextElement::default()),
            attributes: &TEXT_ATTRS,
            set_children: None,
            set_text: Some(|element, text| {
                if let BoundElement::Text(inner) = element {
                    inner.value.literal = Some(text);
                }
            }),
        },
        ElementDescriptor {
            tags: &["image"],
            construct: || BoundElement::Image(ImageElement::default()),
            attributes: &IMAGE_ATTRS,
            set_children: None,
            set_text: None,
        },
        ElementDescriptor {
            tags: &["rectangle"],
            construct: || BoundElement::Rectangle(RectangleElement::default()),
            attributes: &RECTANGLE_ATTRS,
            set_children: Some(children_slot!(Rectangle)),
            set_text: None,
        },
        ElementDescriptor {
            tags: &["clear"],
            construct: || BoundElement::Clear(ClearElement::default()),
            attributes: &CLEAR_ATTRS,
            set_children: None,
            set_text: None,
        },
        ElementDescriptor {
            tags: &["if"],
            construct: || BoundElement::If(IfDirective::default()),
            attributes: &IF_ATTRS,
            set_children: Some(children_slot!(If)),
            set_text: None,
        },
        ElementDescriptor {
            tags: &["foreach"],
            construct: || BoundElement::Foreach(ForeachDirective::default()),
            attributes: &FOREACH_ATTRS,
            set_children: Some(children_slot!(Foreach)),
            set_text: None,
        },
        ElementDescriptor {
            tags: &["range"],
            construct: || BoundElement::Range(RangeDirective::default()),
            attributes: &RANGE_ATTRS,
            set_children: Some(children_slot!(Range)),
            set_text: None,
        },
    ];

    // An element may accept child elements or text content, never both.
    for descriptor in &descriptors {
        assert!(
            descriptor.set_children.is_none() || descriptor.set_text.is_none(),
            "element '{}' declares both element children and text content",
            descriptor.tags[0]
        );
    }

    descriptors
});

pub fn registry() -> &'static [ElementDescriptor] {
    &REGISTRY
}

// ── Value conversion ──────────────────────────────────────────────────────

/// The literal text of an attribute; a bare boolean flag reads as "true".
fn literal_text(attr: &AstAttribute) -> &str {
    match attr.kind {
        AstAttributeKind::BooleanFlag => "true",
        _ => attr.value_str(),
    }
}

fn invalid_value(ast: &AstElement, attr: &AstAttribute, reason: &str) -> CtmlError {
    CtmlError::InvalidAttributeValue {
        attribute: attr.name.clone(),
        tag: ast.tag.clone(),
        value: literal_text(attr).to_string(),
        reason: reason.to_string(),
    }
}

/// Attaches the expression half when the attribute is script-bound.
/// Returns whether the attribute was consumed.
fn attach_expression<T>(slot: &mut BoundValue<T>, attr: &AstAttribute) -> bool {
    slot.source = Some(attr.clone());
    if attr.kind != AstAttributeKind::ScriptBind {
        return false;
    }
    let expression = attr.value_str().trim();
    if !expression.is_empty() {
        slot.expression = Some(expression.to_string());
    }
    true
}

fn bind_unit(slot: &mut BoundValue<CardUnit>, _ast: &AstElement, attr: &AstAttribute) -> CtmlResult<()> {
    if attach_expression(slot, attr) {
        return Ok(());
    }
    slot.literal = Some(CardUnit::parse(literal_text(attr))?);
    Ok(())
}

fn bind_string(slot: &mut BoundValue<String>, _ast: &AstElement, attr: &AstAttribute) -> CtmlResult<()> {
    if attach_expression(slot, attr) {
        return Ok(());
    }
    slot.literal = Some(literal_text(attr).to_string());
    Ok(())
}

fn bind_bool(slot: &mut BoundValue<bool>, ast: &AstElement, attr: &AstAttribute) -> CtmlResult<()> {
    if attach_expression(slot, attr) {
        return Ok(());
    }
    let text = literal_text(attr).trim().to_ascii_lowercase();
    let value = text
        .parse::<bool>()
        .map_err(|_| invalid_value(ast, attr, "expected 'true' or 'false'"))?;
    slot.literal = Some(value);
    Ok(())
}

fn bind_number(slot: &mut BoundValue<f64>, ast: &AstElement, attr: &AstAttribute) -> CtmlResult<()> {
    if attach_expression(slot, attr) {
        return Ok(());
    }
    let value = literal_text(attr)
        .trim()
        .parse::<f64>()
        .map_err(|_| invalid_value(ast, attr, "expected a number"))?;
    slot.literal = Some(value);
    Ok(())
}

/// Literal-only fields reject script bindings outright.
fn bind_plain_string(slot: &mut Option<String>, ast: &AstElement, attr: &AstAttribute) -> CtmlResult<()> {
    if attr.kind == AstAttributeKind::ScriptBind {
        return Err(CtmlError::CannotBindLiteralField {
            attribute: attr.name.clone(),
            tag: ast.tag.clone(),
        });
    }
    *slot = Some(literal_text(attr).to_string());
    Ok(())
}

// ── Binder ────────────────────────────────────────────────────────────────

/// Binds a whole template, dropping elements the lenient mode skipped.
pub fn bind_template(elements: &[AstElement], strict: bool) -> CtmlResult<Vec<BoundElement>> {
    let mut bound = Vec::with_capacity(elements.len());
    for element in elements {
        if let Some(b) = bind_element(element, strict)? {
            bound.push(b);
        }
    }
    Ok(bound)
}

/// Binds one AST element against the registry.
///
/// In strict mode every problem aborts the bind. In lenient mode unknown
/// or ambiguous elements and bad attribute values are logged and skipped;
/// a script binding onto a literal-only field stays fatal either way.
/// Duplicate attributes targeting one field are last-write-wins.
pub fn bind_element(ast: &AstElement, strict: bool) -> CtmlResult<Option<BoundElement>> {
    let matches: Vec<&ElementDescriptor> = registry()
        .iter()
        .filter(|d| d.tags.iter().any(|t| t.eq_ignore_ascii_case(&ast.tag)))
        .collect();

    let descriptor = match matches.len() {
        1 => matches[0],
        0 => {
            let err = CtmlError::UnknownElement {
                tag: ast.tag.clone(),
                line: ast.position.line,
                column: ast.position.column,
            };
            if strict {
                return Err(err);
            }
            warn!("skipping element: {err}");
            return Ok(None);
        }
        _ => {
            let err = CtmlError::AmbiguousElement {
                tag: ast.tag.clone(),
                line: ast.position.line,
                column: ast.position.column,
            };
            if strict {
                return Err(err);
            }
            warn!("skipping element: {err}");
            return Ok(None);
        }
    };

    let mut element = (descriptor.construct)();

    match (&ast.children, descriptor.set_text, descriptor.set_children) {
        (AstChildren::Text(text), Some(set_text), _) => {
            set_text(&mut element, text.trim().to_string());
        }
        (AstChildren::Elements(kids), _, Some(set_children)) => {
            let mut children = Vec::with_capacity(kids.len());
            for kid in kids {
                // A skipped child is omitted, never a placeholder.
                if let Some(bound) = bind_element(kid, strict)? {
                    children.push(bound);
                }
            }
            set_children(&mut element, children);
        }
        _ => {}
    }

    for attr in &ast.attributes {
        // Spreads expand into logical attributes at evaluation time.
        if attr.kind == AstAttributeKind::Spread {
            continue;
        }

        let found: Vec<&AttributeDescriptor> = descriptor
            .attributes
            .iter()
            .filter(|d| d.names.iter().any(|n| n.eq_ignore_ascii_case(&attr.name)))
            .collect();

        match found.len() {
            // Unmatched attributes are validated elsewhere, not here.
            0 => continue,
            1 => {
                if let Err(err) = (found[0].apply)(&mut element, ast, attr) {
                    match &err {
                        CtmlError::CannotBindLiteralField { .. } => return Err(err),
                        _ if strict => return Err(err),
                        _ => warn!("skipping attribute '{}' on '{}': {err}", attr.name, ast.tag),
                    }
                }
            }
            _ => {
                let err = CtmlError::AmbiguousAttribute {
                    attribute: attr.name.clone(),
                    tag: ast.tag.clone(),
                    line: ast.position.line,
                    column: ast.position.column,
                };
                if strict {
                    return Err(err);
                }
                warn!("skipping attribute: {err}");
            }
        }
    }

    Ok(Some(element))
}
