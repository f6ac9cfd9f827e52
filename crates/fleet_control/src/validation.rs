//! Field validators shared by every request operation.
//!
//! All validators are pure. On failure they return a structured
//! [`RequestError`]; on success they hand back the unwrapped value so callers
//! can chain them with `?`. An omitted `name` falls back to `"Value"`.

use crate::error::RequestError;
use crate::messaging::payload::Payload;
use crate::state::ProxyChooseStrategy;
use serde_json::Value;

const DEFAULT_NAME: &str = "Value";

fn display_name(name: Option<&str>) -> &str {
    name.unwrap_or(DEFAULT_NAME)
}

/// Fails with code 1 when `value` is absent.
pub fn not_null<T>(value: Option<T>, name: Option<&str>) -> Result<T, RequestError> {
    value.ok_or_else(|| RequestError::MissingValue {
        name: display_name(name).to_string(),
    })
}

/// Fails with code 2 when `value < floor`. The floor itself passes.
pub fn minimum<T>(value: Option<T>, floor: T, name: Option<&str>) -> Result<T, RequestError>
where
    T: PartialOrd + Copy + Into<Value>,
{
    let value = not_null(value, name)?;
    if value < floor {
        return Err(RequestError::BelowMinimum {
            name: display_name(name).to_string(),
            value: value.into(),
            minimum: floor.into(),
        });
    }
    Ok(value)
}

/// Fails with code 3 when `value > ceiling`.
pub fn maximum<T>(value: Option<T>, ceiling: T, name: Option<&str>) -> Result<T, RequestError>
where
    T: PartialOrd + Copy + Into<Value>,
{
    let value = not_null(value, name)?;
    if value > ceiling {
        return Err(RequestError::AboveMaximum {
            name: display_name(name).to_string(),
            value: value.into(),
            maximum: ceiling.into(),
        });
    }
    Ok(value)
}

/// Fails with code 4 when `value` lies outside `[floor, ceiling]`.
pub fn range<T>(value: Option<T>, floor: T, ceiling: T, name: Option<&str>) -> Result<T, RequestError>
where
    T: PartialOrd + Copy + Into<Value>,
{
    let value = not_null(value, name)?;
    if value < floor || value > ceiling {
        return Err(RequestError::OutOfRange {
            name: display_name(name).to_string(),
            value: value.into(),
            minimum: floor.into(),
            maximum: ceiling.into(),
        });
    }
    Ok(value)
}

/// Fails with code 5 when the payload lacks `key` entirely.
///
/// A key that is present with a null value passes.
pub fn require_field(payload: &Payload, key: &str, field: &str) -> Result<(), RequestError> {
    if payload.contains_key(key) {
        Ok(())
    } else {
        Err(RequestError::MissingField {
            field: field.to_string(),
        })
    }
}

/// Validates a non-negative amount that must fit a `u32`.
pub fn amount(value: Option<i64>, floor: i64, name: &str) -> Result<u32, RequestError> {
    let value = minimum(value, floor, Some(name))?;
    let value = maximum(Some(value), i64::from(u32::MAX), Some(name))?;
    // bounds checked above
    Ok(value as u32)
}

/// Validates a priority, which may be negative but must fit an `i32`.
pub fn priority(value: Option<i64>, name: &str) -> Result<i32, RequestError> {
    let value = range(
        value,
        i64::from(i32::MIN),
        i64::from(i32::MAX),
        Some(name),
    )?;
    Ok(value as i32)
}

/// Resolves a strategy name, failing with code 1 when absent and code 10 when
/// it matches none of the known strategies.
pub fn parse_proxy_choose_strategy(
    value: Option<String>,
    name: &str,
) -> Result<ProxyChooseStrategy, RequestError> {
    not_null(value, Some(name))?.parse()
}
