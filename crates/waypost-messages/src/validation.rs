//! Boundary validation for inbound payloads.
//!
//! Every function takes an untyped payload and returns either a typed,
//! fully-constrained value or a [`ValidationError`] naming the first
//! violated field. Fields are checked in a fixed order, so the reported
//! field is deterministic for a given payload.
//!
//! The HTTP and WebSocket surfaces collapse all validation failures into
//! the same client-facing outcome (400 / connection termination); the
//! field name exists for logging, not for responses.

use crate::store::{NewMessage, QueryFilter};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

use waypost_types::InterestFilter;

/// A payload failed validation. Carries the first field that violated
/// its constraint.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid or missing field: {field}")]
pub struct ValidationError {
    /// Name of the first failing field, as it appears on the wire.
    pub field: &'static str,
}

impl ValidationError {
    fn new(field: &'static str) -> Self {
        Self { field }
    }
}

/// Checks that a JSON value is a non-negative integer representable in
/// `u32`: numeric, finite, equal to its truncation toward zero, and
/// `>= 0`. Fractional values, negatives, non-numbers, and values beyond
/// the 32-bit range all fail.
fn non_negative_int(value: &Value, field: &'static str) -> Result<u32, ValidationError> {
    if let Some(u) = value.as_u64() {
        return u32::try_from(u).map_err(|_| ValidationError::new(field));
    }
    // Negative integers and floats both land here; `as_f64` covers every
    // JSON number representation.
    match value.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.trunc() == f && f <= f64::from(u32::MAX) => {
            Ok(f as u32)
        }
        _ => Err(ValidationError::new(field)),
    }
}

/// Checks that a JSON value is a number and returns it as `f64`. Sign
/// and fraction are unconstrained.
fn number(value: &Value, field: &'static str) -> Result<f64, ValidationError> {
    value.as_f64().ok_or(ValidationError::new(field))
}

/// Looks up a required field on a JSON object. A non-object payload or a
/// missing key fails with that field's name.
fn required<'a>(payload: &'a Value, field: &'static str) -> Result<&'a Value, ValidationError> {
    payload.get(field).ok_or(ValidationError::new(field))
}

/// Validates a message-creation payload.
///
/// Field order is fixed: `worldID`, `content` (then each element),
/// `teri`, `x`, `y`, `z`. The first violation wins.
pub fn validate_create(payload: &Value) -> Result<NewMessage, ValidationError> {
    let world_id = non_negative_int(required(payload, "worldID")?, "worldID")?;

    let content = required(payload, "content")?
        .as_array()
        .ok_or(ValidationError::new("content"))?
        .iter()
        .map(|v| non_negative_int(v, "content"))
        .collect::<Result<Vec<u32>, _>>()?;

    let teri = non_negative_int(required(payload, "teri")?, "teri")?;
    let x = number(required(payload, "x")?, "x")?;
    let y = number(required(payload, "y")?, "y")?;
    let z = number(required(payload, "z")?, "z")?;

    Ok(NewMessage {
        content,
        world_id,
        teri,
        x,
        y,
        z,
    })
}

/// Validates a subscription-filter declaration: `teri` plus a `filter`
/// array of world ids. Duplicate world ids collapse into the set.
pub fn validate_filter(payload: &Value) -> Result<InterestFilter, ValidationError> {
    let teri = non_negative_int(required(payload, "teri")?, "teri")?;

    let world_ids = required(payload, "filter")?
        .as_array()
        .ok_or(ValidationError::new("filter"))?
        .iter()
        .map(|v| non_negative_int(v, "filter"))
        .collect::<Result<HashSet<u32>, _>>()?;

    Ok(InterestFilter { teri, world_ids })
}

/// Parses the text parameters of a history query. `teri` must be a
/// non-negative integer; `filter` is a comma-separated list of them.
/// Any parse failure — including an empty list element — is a
/// validation failure.
pub fn parse_query(teri: &str, filter: &str) -> Result<QueryFilter, ValidationError> {
    let teri: u32 = teri.parse().map_err(|_| ValidationError::new("teri"))?;

    let world_ids = filter
        .split(',')
        .map(|part| part.parse::<u32>().map_err(|_| ValidationError::new("filter")))
        .collect::<Result<Vec<u32>, _>>()?;

    Ok(QueryFilter { teri, world_ids })
}
