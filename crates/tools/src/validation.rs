//! Input validation against a tool's parameter schema
//!
//! Only the subset of JSON Schema that tools actually declare is checked:
//! required presence, primitive `type`, and `enum` membership. Unknown
//! properties pass through untouched.

use orchestrator_core::{errors::ToolError, tool::ToolSchema};
use serde_json::{Map, Value};

/// Validate `input` against `schema`, returning the (possibly coerced) input.
///
/// A `null` input is treated as an empty object. A number supplied for a
/// `string` property is replaced by its string form.
pub fn validate_input(schema: &ToolSchema, input: Value) -> Result<Value, ToolError> {
    let mut object = match input {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(ToolError::InvalidArguments(format!(
                "expected an object, got {}",
                type_name(&other)
            )))
        }
    };

    for field in schema.required_fields() {
        match object.get(field) {
            None | Some(Value::Null) => {
                return Err(ToolError::InvalidArguments(format!(
                    "missing required field '{}'",
                    field
                )))
            }
            Some(_) => {}
        }
    }

    let properties = match schema.parameters.get("properties").and_then(Value::as_object) {
        Some(properties) => properties,
        None => return Ok(Value::Object(object)),
    };

    for (name, property) in properties {
        let Some(value) = object.get_mut(name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        if let Some(expected) = property.get("type").and_then(Value::as_str) {
            if expected == "string" && value.is_number() {
                *value = Value::String(value.to_string());
            }
            if !matches_type(expected, value) {
                return Err(ToolError::InvalidArguments(format!(
                    "field '{}' should be {}, got {}",
                    name,
                    expected,
                    type_name(value)
                )));
            }
        }

        if let Some(allowed) = property.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
                return Err(ToolError::InvalidArguments(format!(
                    "field '{}' must be one of [{}], got {}",
                    name,
                    options.join(", "),
                    value
                )));
            }
        }
    }

    Ok(Value::Object(object))
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        // Non-primitive or unknown declarations are not checked
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
