//! Structural JSON Schema checks for tool arguments
//!
//! Covers the subset tool providers actually declare: `type`, `enum`,
//! `required`, `properties`, `additionalProperties: false` and `items`.
//! Unknown keywords are ignored.

use serde_json::Value;

/// Validate `value` against `schema`, collecting every violation
pub fn validate(schema: &Value, value: &Value) -> Result<(), Vec<String>> {
    let mut violations = Vec::new();
    check(schema, value, "$", &mut violations);
    if violations.is_empty() { Ok(()) } else { Err(violations) }
}

fn check(schema: &Value, value: &Value, path: &str, out: &mut Vec<String>) {
    let Some(schema) = schema.as_object() else {
        // `true`, `{}` or anything non-object accepts everything
        return;
    };

    if let Some(expected) = schema.get("type")
        && !type_matches(expected, value)
    {
        out.push(format!("{path}: expected {}, got {}", describe_type(expected), json_type(value)));
        return;
    }

    if let Some(Value::Array(allowed)) = schema.get("enum")
        && !allowed.contains(value)
    {
        out.push(format!("{path}: value {value} is not one of {}", Value::Array(allowed.clone())));
    }

    if let Value::Object(fields) = value {
        if let Some(Value::Array(required)) = schema.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(name) {
                    out.push(format!("{path}: missing required property '{name}'"));
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        if let Some(properties) = properties {
            for (name, sub_schema) in properties {
                if let Some(field) = fields.get(name) {
                    check(sub_schema, field, &format!("{path}.{name}"), out);
                }
            }
        }

        if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
            for name in fields.keys() {
                if !properties.is_some_and(|p| p.contains_key(name)) {
                    out.push(format!("{path}: unexpected property '{name}'"));
                }
            }
        }
    }

    if let (Value::Array(items), Some(item_schema)) = (value, schema.get("items")) {
        for (i, item) in items.iter().enumerate() {
            check(item_schema, item, &format!("{path}[{i}]"), out);
        }
    }
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(name) => single_type_matches(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| single_type_matches(name, value)),
        _ => true,
    }
}

fn single_type_matches(name: &str, value: &Value) -> bool {
    match name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => true,
    }
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::String(name) => name.clone(),
        Value::Array(names) => names.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(" | "),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
