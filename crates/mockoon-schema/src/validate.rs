use crate::environment::{Environment, RawEnvironment};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid environment field '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

const REQUIRED_FIELDS: [&str; 2] = ["name", "port"];

/// Validate a migrated definition and convert it to the typed model.
///
/// Optional fields that are `null` are dropped so their defaults apply
/// (auto-repair). `name` must be a string and `port` an integer.
pub fn validate(raw: RawEnvironment) -> Result<Environment, ValidationError> {
    let mut map = raw.into_map();
    repair_nulls(&mut map);

    match map.get("name") {
        Some(Value::String(_)) => {}
        Some(other) => return Err(invalid("name", format!("expected a string, got {other}"))),
        None => return Err(invalid("name", "missing".to_owned())),
    }
    match map.get("port") {
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => {}
        Some(other) => {
            return Err(invalid(
                "port",
                format!("expected an integer, got {other}"),
            ))
        }
        None => return Err(invalid("port", "missing".to_owned())),
    }

    serde_json::from_value(Value::Object(map)).map_err(|e| invalid("environment", e.to_string()))
}

fn repair_nulls(map: &mut Map<String, Value>) {
    map.retain(|key, value| !value.is_null() || REQUIRED_FIELDS.contains(&key.as_str()));
    if let Some(Value::Array(routes)) = map.get_mut("routes") {
        for route in routes.iter_mut().filter_map(Value::as_object_mut) {
            route.retain(|_, v| !v.is_null());
            if let Some(Value::Array(responses)) = route.get_mut("responses") {
                for response in responses.iter_mut().filter_map(Value::as_object_mut) {
                    response.retain(|_, v| !v.is_null());
                }
            }
        }
    }
}

fn invalid(field: &str, reason: String) -> ValidationError {
    ValidationError::Invalid {
        field: field.to_owned(),
        reason,
    }
}
