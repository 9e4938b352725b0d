//! Static field schema for configuration change requests
//!
//! Each nesting level of a request maps field names to an expected type.
//! Validation walks the request, rejects the first key that is unknown at
//! its level or whose value cannot be coerced to the declared type, and
//! produces a normalised copy (canonical key casing, coerced values) that
//! deserialises directly into the partial config types.

use serde_json::{Map, Number, Value};

/// Declared type of a config field
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    Bool,
    /// Any finite number
    Number,
    /// Number with no fractional part
    Integer,
    String,
    /// One of a fixed set of names, or the index of one
    Enum(&'static [&'static str]),
    Object(&'static Schema),
}

/// One known field at a nesting level
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

/// Known fields at one nesting level
#[derive(Debug)]
pub struct Schema {
    pub fields: &'static [FieldSpec],
}

impl Schema {
    /// Field lookup; keys match case-insensitively
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(key))
    }
}

const fn field(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec { name, ty }
}

pub static VECTOR_SCHEMA: Schema = Schema {
    fields: &[
        field("X", FieldType::Number),
        field("Y", FieldType::Number),
        field("Z", FieldType::Number),
    ],
};

pub static HOVER_AND_HOLD_SCHEMA: Schema = Schema {
    fields: &[
        field("HoverStartTimeS", FieldType::Number),
        field("HoverCompleteTimeS", FieldType::Number),
    ],
};

pub static TOUCH_PLANE_SCHEMA: Schema = Schema {
    fields: &[
        field("TouchPlaneActivationDistanceCm", FieldType::Number),
        field(
            "TouchPlaneTrackedPosition",
            FieldType::Enum(super::types::TrackedPosition::NAMES),
        ),
    ],
};

pub static INTERACTION_SCHEMA: Schema = Schema {
    fields: &[
        field("UseScrollingOrDragging", FieldType::Bool),
        field("DeadzoneRadius", FieldType::Number),
        field("InteractionZoneEnabled", FieldType::Bool),
        field("InteractionMinDistanceCm", FieldType::Number),
        field("InteractionMaxDistanceCm", FieldType::Number),
        field(
            "InteractionType",
            FieldType::Enum(super::types::InteractionType::NAMES),
        ),
        field("HoverAndHold", FieldType::Object(&HOVER_AND_HOLD_SCHEMA)),
        field("TouchPlane", FieldType::Object(&TOUCH_PLANE_SCHEMA)),
    ],
};

pub static PHYSICAL_SCHEMA: Schema = Schema {
    fields: &[
        field("ScreenHeightM", FieldType::Number),
        field(
            "LeapPositionRelativeToScreenBottomM",
            FieldType::Object(&VECTOR_SCHEMA),
        ),
        field("LeapRotationD", FieldType::Object(&VECTOR_SCHEMA)),
        field("ScreenRotationD", FieldType::Number),
        field("ScreenWidthPX", FieldType::Integer),
        field("ScreenHeightPX", FieldType::Integer),
    ],
};

/// Root of a config change request
pub static CONFIG_REQUEST_SCHEMA: Schema = Schema {
    fields: &[
        field("requestID", FieldType::String),
        field("interaction", FieldType::Object(&INTERACTION_SCHEMA)),
        field("physical", FieldType::Object(&PHYSICAL_SCHEMA)),
    ],
};

/// Why a change request was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// `requestID` absent, empty or not a string
    MissingRequestId,
    /// The named key is unknown at its level or has the wrong type
    InvalidField(String),
    /// The request itself is not a JSON object
    NotAnObject,
}

/// Validate a config change request against the root schema.
///
/// Returns the normalised request on success.
pub fn validate_config_request(request: &Value) -> Result<Value, SchemaError> {
    let obj = request.as_object().ok_or(SchemaError::NotAnObject)?;

    let has_request_id = obj
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("requestID"))
        .and_then(|(_, v)| v.as_str())
        .map(|id| !id.is_empty())
        .unwrap_or(false);
    if !has_request_id {
        return Err(SchemaError::MissingRequestId);
    }

    validate_object(obj, &CONFIG_REQUEST_SCHEMA).map(Value::Object)
}

/// Validate an object against a schema, stopping at the first bad key
pub fn validate_object(obj: &Map<String, Value>, schema: &Schema) -> Result<Map<String, Value>, SchemaError> {
    let mut normalised = Map::with_capacity(obj.len());

    for (key, value) in obj {
        let field = schema
            .field(key)
            .ok_or_else(|| SchemaError::InvalidField(key.clone()))?;
        let coerced = match field.ty {
            FieldType::Object(inner) => {
                let child = value
                    .as_object()
                    .ok_or_else(|| SchemaError::InvalidField(key.clone()))?;
                Value::Object(validate_object(child, inner)?)
            }
            ty => coerce(value, ty).ok_or_else(|| SchemaError::InvalidField(key.clone()))?,
        };
        normalised.insert(field.name.to_string(), coerced);
    }

    Ok(normalised)
}

/// Coerce a scalar value to a field type. Numeric strings and `"true"` are
/// accepted; `null` never is.
fn coerce(value: &Value, ty: FieldType) -> Option<Value> {
    match ty {
        FieldType::Bool => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) => s.trim().parse::<bool>().ok().map(Value::Bool),
            _ => None,
        },
        FieldType::Number => {
            let n = match value {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                _ => return None,
            };
            if !n.is_finite() {
                return None;
            }
            Number::from_f64(n).map(Value::Number)
        }
        FieldType::Integer => {
            let n = match value {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                _ => return None,
            };
            if n.fract() != 0.0 || n < i32::MIN as f64 || n > i32::MAX as f64 {
                return None;
            }
            Some(Value::from(n as i64))
        }
        FieldType::String => value.as_str().map(|s| Value::String(s.to_string())),
        FieldType::Enum(names) => match value {
            Value::String(s) => names
                .iter()
                .find(|n| n.eq_ignore_ascii_case(s))
                .map(|n| Value::String(n.to_string())),
            Value::Number(n) => n
                .as_u64()
                .and_then(|i| names.get(i as usize))
                .map(|n| Value::String(n.to_string())),
            _ => None,
        },
        FieldType::Object(_) => None,
    }
}
