use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use tracing::debug;

use crate::errors::{FailureKind, ValidationFailure};
use crate::schema::{DialogueSchema, FieldDescriptor, FieldKind};
use crate::state::{DialogueState, FieldValue, RawUpdate, SCRIPT_LOCATION_KEY};

/// A candidate update after coercion and validation.
///
/// `values` holds only fields that passed every rule; the decision
/// engine commits from here and nowhere else. `failures` holds the
/// rejected fields, and `skipped` the keys that were dropped without
/// validation (unknown, protected, or the location control field).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedUpdate {
    pub values: BTreeMap<String, FieldValue>,
    pub failures: Vec<ValidationFailure>,
    pub skipped: Vec<String>,
}

impl StagedUpdate {
    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failing fields that are flagged for the normalization round trip.
    pub fn fields_to_normalize(&self, schema: &DialogueSchema) -> Vec<String> {
        self.failures
            .iter()
            .filter(|failure| {
                schema.field(&failure.field).map(|field| field.normalize).unwrap_or(false)
            })
            .map(|failure| failure.field.clone())
            .collect()
    }
}

/// Validate a raw extracted update against the schema and the current
/// state. Pure: neither input is mutated.
///
/// Coercion runs over the whole update first, so the semantic checks
/// see the full candidate set: a time arriving in the same update as
/// its paired date is checked against that date, not just against
/// whatever the committed state holds.
pub fn stage_update(
    schema: &DialogueSchema,
    state: &DialogueState,
    update: &RawUpdate,
) -> StagedUpdate {
    let mut staged = StagedUpdate::default();
    let mut candidates: BTreeMap<String, FieldValue> = BTreeMap::new();

    for (key, raw) in update.iter() {
        if raw.is_null() {
            continue;
        }
        if key == SCRIPT_LOCATION_KEY || schema.protected_fields.contains(key) {
            staged.skipped.push(key.clone());
            continue;
        }
        let Some(field) = schema.field(key) else {
            debug!(field = %key, "dropping unknown field from extracted update");
            staged.skipped.push(key.clone());
            continue;
        };

        match coerce(field, raw) {
            Ok(value) => {
                candidates.insert(key.clone(), value);
            }
            Err(message) => {
                staged.failures.push(ValidationFailure::new(key, FailureKind::Type, message));
            }
        }
    }

    for (key, value) in &candidates {
        let Some(field) = schema.field(key) else {
            continue;
        };
        match check_value(field, value, &candidates, state, schema) {
            None => {
                staged.values.insert(key.clone(), value.clone());
            }
            Some(failure) => staged.failures.push(failure),
        }
    }

    if !staged.failures.is_empty() {
        debug!(failures = staged.failures.len(), "candidate update failed validation");
    }
    staged
}

/// Coerce a raw JSON value to the field's kind. Spoken-form strings
/// ("dva tisíce patnáct") fail here and become normalization input.
fn coerce(field: &FieldDescriptor, raw: &Value) -> Result<FieldValue, String> {
    match field.kind {
        FieldKind::Text | FieldKind::Enumeration => match raw {
            Value::String(text) => Ok(FieldValue::Text(text.clone())),
            Value::Number(number) => Ok(FieldValue::Text(number.to_string())),
            other => Err(format!("expected a string, got {other}")),
        },
        FieldKind::Integer => match raw {
            Value::Number(number) => number
                .as_i64()
                .map(FieldValue::Integer)
                .ok_or_else(|| format!("`{number}` is not a valid integer")),
            Value::String(text) => text
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| format!("`{text}` is not a valid integer")),
            other => Err(format!("expected an integer, got {other}")),
        },
        FieldKind::Boolean => match raw {
            Value::Bool(value) => Ok(FieldValue::Boolean(*value)),
            Value::String(text) => text
                .trim()
                .parse::<bool>()
                .map(FieldValue::Boolean)
                .map_err(|_| format!("`{text}` is not a valid boolean")),
            other => Err(format!("expected a boolean, got {other}")),
        },
        FieldKind::Date => match raw {
            Value::String(text) => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|_| format!("`{text}` is not an ISO date")),
            other => Err(format!("expected an ISO date string, got {other}")),
        },
        FieldKind::Time => match raw {
            Value::String(text) => parse_time(text.trim())
                .map(FieldValue::Time)
                .ok_or_else(|| format!("`{text}` is not an ISO time")),
            other => Err(format!("expected an ISO time string, got {other}")),
        },
    }
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
}

/// Semantic rules on an already-coerced value: bounds, enumeration
/// membership, and the temporal invariants for dates and times.
fn check_value(
    field: &FieldDescriptor,
    value: &FieldValue,
    candidates: &BTreeMap<String, FieldValue>,
    state: &DialogueState,
    schema: &DialogueSchema,
) -> Option<ValidationFailure> {
    match (field.kind, value) {
        (FieldKind::Integer, FieldValue::Integer(number)) => {
            let bounds = field.bounds?;
            if bounds.contains(*number) {
                None
            } else {
                Some(ValidationFailure::new(
                    &field.name,
                    FailureKind::Bounds,
                    format!("{number} is outside the declared bounds"),
                ))
            }
        }
        (FieldKind::Enumeration, FieldValue::Text(text)) => {
            let allowed = field.enumeration.as_ref()?;
            if allowed.iter().any(|member| member.as_str() == Some(text.as_str())) {
                None
            } else {
                Some(ValidationFailure::new(
                    &field.name,
                    FailureKind::Enumeration,
                    format!("`{text}` is not one of the allowed values"),
                ))
            }
        }
        (FieldKind::Date, FieldValue::Date(date)) => {
            let today = state.current_date()?;
            if *date < today {
                Some(ValidationFailure::new(
                    &field.name,
                    FailureKind::PastDate,
                    format!("{} must not be in the past", field.name),
                ))
            } else {
                None
            }
        }
        (FieldKind::Time, FieldValue::Time(time)) => {
            check_time(field, *time, candidates, state, schema)
        }
        _ => None,
    }
}

fn check_time(
    field: &FieldDescriptor,
    time: NaiveTime,
    candidates: &BTreeMap<String, FieldValue>,
    state: &DialogueState,
    schema: &DialogueSchema,
) -> Option<ValidationFailure> {
    if let Some(hours) = schema.business_hours {
        if !hours.contains(time) {
            return Some(ValidationFailure::new(
                &field.name,
                FailureKind::OutsideBusinessHours,
                format!(
                    "{} must be between {} and {}",
                    field.name,
                    hours.opens.format("%H:%M"),
                    hours.closes.format("%H:%M"),
                ),
            ));
        }
    }

    // Combined with its paired date, the appointment must not already
    // have passed. A date arriving in the same update wins over the
    // committed one.
    let paired = field.paired_date_field.as_deref()?;
    let appointment_date = candidates
        .get(paired)
        .and_then(FieldValue::as_date)
        .or_else(|| state.get(paired).and_then(FieldValue::as_date))?;
    let today = state.current_date()?;
    let now = state.current_time()?;
    if NaiveDateTime::new(appointment_date, time) < NaiveDateTime::new(today, now) {
        return Some(ValidationFailure::new(
            &field.name,
            FailureKind::PastTime,
            format!("{} must not be in the past", field.name),
        ));
    }
    None
}
