use thiserror::Error;

/// Fatal schema construction problems. Raised while a script variant is
/// being assembled, never at call time.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate field `{0}` in dialogue schema")]
    DuplicateField(String),
    #[error("field `{field}` references unknown paired date field `{paired}`")]
    UnknownPairedField { field: String, paired: String },
}

/// Why a single extracted value was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Type,
    Bounds,
    Enumeration,
    PastDate,
    PastTime,
    OutsideBusinessHours,
}

/// One rejected field from a candidate state update.
///
/// Validation failures are data, not errors: the decision engine turns
/// them into a normalization round trip or a re-ask, never a panic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationFailure {
    pub field: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self { field: field.into(), kind, message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::{FailureKind, ValidationFailure};

    #[test]
    fn failure_carries_field_and_kind() {
        let failure = ValidationFailure::new(
            "inspection_appointment_date",
            FailureKind::PastDate,
            "date must not be in the past",
        );
        assert_eq!(failure.field, "inspection_appointment_date");
        assert_eq!(failure.kind, FailureKind::PastDate);
    }
}
