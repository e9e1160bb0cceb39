use thiserror::Error;

pub type CtmlResult<T> = Result<T, CtmlError>;

#[derive(Error, Debug, Clone)]
pub enum CtmlError {
    #[error("Markup error at line {line}, column {column}: {message}")]
    Markup {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Invalid unit value '{value}': the numeric portion is missing or unparsable")]
    InvalidUnitFormat { value: String },

    #[error("Cannot resolve '{unit}': {reason}")]
    MissingContext { unit: String, reason: String },

    #[error("Unknown element '{tag}' at line {line}, column {column}")]
    UnknownElement {
        tag: String,
        line: usize,
        column: usize,
    },

    #[error("Tag '{tag}' matches more than one element at line {line}, column {column}")]
    AmbiguousElement {
        tag: String,
        line: usize,
        column: usize,
    },

    #[error("Attribute '{attribute}' matches more than one field of '{tag}' at line {line}, column {column}")]
    AmbiguousAttribute {
        attribute: String,
        tag: String,
        line: usize,
        column: usize,
    },

    #[error("Attribute '{attribute}' of '{tag}' only accepts literal values, not script bindings")]
    CannotBindLiteralField { attribute: String, tag: String },

    #[error("Invalid value '{value}' for attribute '{attribute}' of '{tag}': {reason}")]
    InvalidAttributeValue {
        attribute: String,
        tag: String,
        value: String,
        reason: String,
    },
}
