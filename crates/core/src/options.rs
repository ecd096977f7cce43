//! Experiment option schemas and option validation.
//!
//! A project declares the option fields its experiments accept as an
//! ordered map of field name to [`FieldSpec`]. Submitted options are
//! checked field by field in declaration order, and the first violation is
//! reported. Options that the schema does not mention are passed through
//! untouched.
//!
//! Values may arrive either as typed JSON (`{"trials": 5}`) or as strings
//! from form submissions (`trials=5`), so numeric and boolean checks accept
//! both representations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Options supplied for one experiment.
pub type OptionMap = serde_json::Map<String, Value>;

/// Field name -> field spec, in declaration order.
pub type OptionSchema = IndexMap<String, FieldSpec>;

/// Separator for multi-select enum values (`"adam,sgd"`).
const ENUM_SEPARATOR: char = ',';

// ---------------------------------------------------------------------------
// Schema types
// ---------------------------------------------------------------------------

/// Accepted type of a single option field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int,
    Float,
    Bool,
    String,
    Enum,
}

impl FieldType {
    /// Schema name of the type.
    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Enum => "enum",
        }
    }
}

/// Declaration of one option field.
///
/// Keys other than `type` and `values` (defaults, descriptions, UI hints)
/// are preserved in `extra` so schemas round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Allowed values; required for `enum` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            values: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_type: FieldType::Enum,
            values: Some(values.into_iter().map(Into::into).collect()),
            extra: serde_json::Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Schema validation
// ---------------------------------------------------------------------------

/// Check that a schema is usable for option validation.
///
/// Every `enum` field must list at least one allowed value.
pub fn validate_schema(schema: &OptionSchema) -> Result<(), CoreError> {
    for (name, spec) in schema {
        if name.trim().is_empty() {
            return Err(CoreError::Validation(
                "Schema field names must not be empty".to_string(),
            ));
        }
        if spec.field_type == FieldType::Enum
            && spec.values.as_ref().map_or(true, |v| v.is_empty())
        {
            return Err(CoreError::Validation(format!(
                "Enum field {name} must list its allowed values"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Option validation
// ---------------------------------------------------------------------------

/// Validate `options` against `schema`, reporting the first offending field.
pub fn validate_options(schema: &OptionSchema, options: &OptionMap) -> Result<(), CoreError> {
    for (name, spec) in schema {
        let value = match options.get(name) {
            None | Some(Value::Null) => {
                return Err(CoreError::Validation(format!("Field {name} missing")));
            }
            Some(v) => v,
        };

        if !value_conforms(spec, value) {
            return Err(CoreError::Validation(format!(
                "Field {name} of type {} is invalid",
                spec.field_type.name()
            )));
        }
    }
    Ok(())
}

/// Validate a list of option sets, reporting the first failure with its index.
pub fn validate_all(schema: &OptionSchema, items: &[OptionMap]) -> Result<(), CoreError> {
    for (index, options) in items.iter().enumerate() {
        validate_options(schema, options).map_err(|e| match e {
            CoreError::Validation(msg) => CoreError::Validation(format!("Item {index}: {msg}")),
            other => other,
        })?;
    }
    Ok(())
}

fn value_conforms(spec: &FieldSpec, value: &Value) -> bool {
    match spec.field_type {
        FieldType::Int => numeric(value).is_some_and(|n| n.fract() == 0.0),
        FieldType::Float => numeric(value).is_some(),
        FieldType::Bool => match value {
            Value::Bool(_) => true,
            Value::String(s) => s == "true" || s == "false",
            _ => false,
        },
        FieldType::String => matches!(value, Value::String(s) if !s.is_empty()),
        FieldType::Enum => {
            let allowed = spec.values.as_deref().unwrap_or_default();
            match value {
                Value::String(s) => s
                    .split(ENUM_SEPARATOR)
                    .all(|selected| allowed.iter().any(|a| a == selected)),
                _ => false,
            }
        }
    }
}

/// Numeric value of a JSON number or numeric string.
fn numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
