//! # Schema Kinds
//!
//! Every [`Domain`](crate::Domain) carries a [`SchemaKind`] describing the primitive shape of
//! the values it accepts. The schema answers two questions for the rest of the crate:
//!
//! - **Type checking**: does a JSON value have the right shape for this domain?
//! - **Text round-tripping**: how does a text-based input widget convert what the
//!   user typed into a typed value, and back?
//!
//! ```rust
//! use focus4::{SchemaKind, schema_output_to_string, string_to_schema_output};
//! use serde_json::json;
//!
//! assert_eq!(string_to_schema_output(Some("true"), &SchemaKind::Boolean), Some(json!(true)));
//! assert_eq!(string_to_schema_output(Some("maybe"), &SchemaKind::Boolean), None);
//! assert_eq!(string_to_schema_output(Some("123.45"), &SchemaKind::Number), Some(json!(123.45)));
//! assert_eq!(schema_output_to_string(&json!(42), &SchemaKind::Integer), Some("42".to_string()));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

const TYPE_NULL: &str = "null";
const TYPE_BOOLEAN: &str = "boolean";
const TYPE_INTEGER: &str = "integer";
const TYPE_NUMBER: &str = "number";
const TYPE_STRING: &str = "string";
const TYPE_ARRAY: &str = "array";
const TYPE_OBJECT: &str = "object";

/// The primitive shape of a domain's values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    /// Any JSON value; never fails a type check.
    Any,
    /// A string.
    String,
    /// Any number, integral or not.
    Number,
    /// A number without a fractional part.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// A homogeneous array of values of the inner kind.
    Array(Box<SchemaKind>),
}

impl SchemaKind {
    /// Name of the kind as used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            SchemaKind::Any => "any".to_string(),
            SchemaKind::String => TYPE_STRING.to_string(),
            SchemaKind::Number => TYPE_NUMBER.to_string(),
            SchemaKind::Integer => TYPE_INTEGER.to_string(),
            SchemaKind::Boolean => TYPE_BOOLEAN.to_string(),
            SchemaKind::Array(item) => format!("{}<{}>", TYPE_ARRAY, item.type_name()),
        }
    }

    /// Type-checks a value against this kind.
    ///
    /// `null` stands for "no value" throughout the crate and is accepted by every
    /// kind; required-ness is the validation engine's concern, not the schema's.
    pub fn check(&self, value: &Value) -> Result<(), SchemaError> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            SchemaKind::Any => Ok(()),
            SchemaKind::String => match value {
                Value::String(_) => Ok(()),
                _ => Err(self.mismatch(value)),
            },
            SchemaKind::Number => match value {
                Value::Number(_) => Ok(()),
                _ => Err(self.mismatch(value)),
            },
            SchemaKind::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(()),
                _ => Err(self.mismatch(value)),
            },
            SchemaKind::Boolean => match value {
                Value::Bool(_) => Ok(()),
                _ => Err(self.mismatch(value)),
            },
            SchemaKind::Array(item_kind) => {
                let items = match value {
                    Value::Array(items) => items,
                    _ => return Err(self.mismatch(value)),
                };
                for (index, item) in items.iter().enumerate() {
                    if item.is_null() {
                        return Err(SchemaError::ArrayItemError {
                            index,
                            source: Box::new(item_kind.mismatch(item)),
                        });
                    }
                    item_kind
                        .check(item)
                        .map_err(|e| SchemaError::ArrayItemError {
                            index,
                            source: Box::new(e),
                        })?;
                }
                Ok(())
            }
        }
    }

    fn mismatch(&self, value: &Value) -> SchemaError {
        SchemaError::TypeMismatch {
            expected: self.type_name(),
            actual: value_type(value).to_string(),
        }
    }
}

/// Errors raised when a value does not have the shape its schema expects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The value type doesn't match what the schema expects.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The type that was expected by the schema.
        expected: String,
        /// The actual type of the value.
        actual: String,
    },
    /// An array item failed its check.
    #[error("Array item error at index {index}: {source}")]
    ArrayItemError {
        /// The index of the array item that failed.
        index: usize,
        /// The underlying error for the item.
        source: Box<SchemaError>,
    },
}

/// JSON type name of a value.
pub fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => TYPE_NULL,
        Value::Bool(_) => TYPE_BOOLEAN,
        Value::Number(n) if n.is_i64() || n.is_u64() => TYPE_INTEGER,
        Value::Number(_) => TYPE_NUMBER,
        Value::String(_) => TYPE_STRING,
        Value::Array(_) => TYPE_ARRAY,
        Value::Object(_) => TYPE_OBJECT,
    }
}

/// Converts the text representation of a value into the typed output of `kind`.
///
/// Empty or unparsable input yields `None`, which the rest of the crate treats as
/// "no value".
pub fn string_to_schema_output(text: Option<&str>, kind: &SchemaKind) -> Option<Value> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }
    match kind {
        SchemaKind::Any | SchemaKind::String => Some(Value::String(text.to_string())),
        SchemaKind::Boolean => match text {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        SchemaKind::Integer => text.parse::<i64>().ok().map(Value::from),
        SchemaKind::Number => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        SchemaKind::Array(item_kind) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| string_to_schema_output(Some(item), item_kind))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
    }
}

/// Renders a typed value back to the text a text-based input would display.
///
/// Returns `None` for `null` and for values that do not match `kind`.
pub fn schema_output_to_string(value: &Value, kind: &SchemaKind) -> Option<String> {
    match (kind, value) {
        (_, Value::Null) => None,
        (SchemaKind::Array(item_kind), Value::Array(items)) => items
            .iter()
            .map(|item| schema_output_to_string(item, item_kind))
            .collect::<Option<Vec<_>>>()
            .map(|items| items.join(", ")),
        (SchemaKind::Any, Value::String(s)) | (SchemaKind::String, Value::String(s)) => {
            Some(s.clone())
        }
        (SchemaKind::Any, other) => Some(other.to_string()),
        (SchemaKind::Boolean, Value::Bool(b)) => Some(b.to_string()),
        (SchemaKind::Integer | SchemaKind::Number, Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
