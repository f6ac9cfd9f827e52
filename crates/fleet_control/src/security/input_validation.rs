//! Structural checks on inbound JSON before it is decoded into a request.

use super::GuardError;
use crate::config::SecurityConfig;
use serde_json::Value;

/// Validates a raw message against the configured limits.
///
/// Returns the parsed JSON so the caller does not have to parse it twice.
pub fn validate_json_message(message: &str, config: &SecurityConfig) -> Result<Value, GuardError> {
    if message.len() > config.max_message_size {
        return Err(GuardError::MessageTooLarge(message.len()));
    }

    let json: Value = serde_json::from_str(message)
        .map_err(|e| GuardError::InvalidMessageFormat(e.to_string()))?;

    validate_json_value(&json, 0, config)?;
    Ok(json)
}

fn validate_json_value(value: &Value, depth: usize, config: &SecurityConfig) -> Result<(), GuardError> {
    if depth > config.max_json_depth {
        return Err(GuardError::InvalidMessageFormat(
            "JSON nesting too deep".to_string(),
        ));
    }

    match value {
        Value::String(s) => validate_string(s, config)?,
        Value::Array(items) => {
            if items.len() > config.max_collection_size {
                return Err(GuardError::InvalidMessageFormat(format!(
                    "Array too large: {} elements",
                    items.len()
                )));
            }
            for item in items {
                validate_json_value(item, depth + 1, config)?;
            }
        }
        Value::Object(fields) => {
            if fields.len() > config.max_collection_size {
                return Err(GuardError::InvalidMessageFormat(format!(
                    "Object too large: {} keys",
                    fields.len()
                )));
            }
            for (key, field) in fields {
                validate_string(key, config)?;
                validate_json_value(field, depth + 1, config)?;
            }
        }
        Value::Number(_) | Value::Bool(_) | Value::Null => {}
    }

    Ok(())
}

fn validate_string(s: &str, config: &SecurityConfig) -> Result<(), GuardError> {
    if s.len() > config.max_string_length {
        return Err(GuardError::InvalidMessageFormat(format!(
            "String too long: {} characters",
            s.len()
        )));
    }
    // Commands are forwarded to instance consoles verbatim.
    if s.contains('\0') {
        return Err(GuardError::ForbiddenContent);
    }
    Ok(())
}
