use std::collections::BTreeSet;

use chrono::NaiveTime;
use serde_json::Value;

use crate::errors::SchemaError;
use crate::state::{FieldValue, INTENT_KEY, SCRIPT_LOCATION_KEY};

/// Semantic type of a dialogue-state field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
    Date,
    Time,
    /// Like `Text`, but values must be members of the declared set.
    Enumeration,
}

impl FieldKind {
    /// JSON-schema type name used in the function-calling contract.
    pub fn json_type(self) -> &'static str {
        match self {
            Self::Text | Self::Enumeration | Self::Date | Self::Time => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// An inclusive or exclusive endpoint of an integer range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Inclusive(i64),
    Exclusive(i64),
}

/// Declared numeric bounds for an integer field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bounds {
    pub min: Option<Bound>,
    pub max: Option<Bound>,
}

impl Bounds {
    pub fn contains(&self, value: i64) -> bool {
        let above_min = match self.min {
            Some(Bound::Inclusive(min)) => value >= min,
            Some(Bound::Exclusive(min)) => value > min,
            None => true,
        };
        let below_max = match self.max {
            Some(Bound::Inclusive(max)) => value <= max,
            Some(Bound::Exclusive(max)) => value < max,
            None => true,
        };
        above_min && below_max
    }
}

/// Opening window used to validate appointment times.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusinessHours {
    pub opens: NaiveTime,
    pub closes: NaiveTime,
}

impl BusinessHours {
    /// Half-open interval: opening time is admissible, closing time is not.
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.opens && time < self.closes
    }
}

/// Per-field metadata: type, bounds, examples, prompt text and flags.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub description: Option<String>,
    /// Scripted question used when a location asks for this field.
    pub ask: Option<String>,
    pub examples: Vec<Value>,
    pub enumeration: Option<Vec<Value>>,
    pub bounds: Option<Bounds>,
    /// Hidden fields never reach the language model's extraction schema.
    pub hidden: bool,
    /// Whether failed values for this field may be sent for normalization.
    pub normalize: bool,
    /// For time fields: the date field that anchors the past-time check.
    pub paired_date_field: Option<String>,
    pub default: Option<FieldValue>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            ask: None,
            examples: Vec::new(),
            enumeration: None,
            bounds: None,
            hidden: false,
            normalize: false,
            paired_date_field: None,
            default: None,
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn ask(mut self, question: impl Into<String>) -> Self {
        self.ask = Some(question.into());
        self
    }

    pub fn examples(mut self, examples: Vec<Value>) -> Self {
        self.examples = examples;
        self
    }

    pub fn enumeration(mut self, values: Vec<Value>) -> Self {
        self.enumeration = Some(values);
        self
    }

    pub fn bounds(mut self, min: Option<Bound>, max: Option<Bound>) -> Self {
        self.bounds = Some(Bounds { min, max });
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn normalize(mut self) -> Self {
        self.normalize = true;
        self
    }

    pub fn paired_date_field(mut self, field: impl Into<String>) -> Self {
        self.paired_date_field = Some(field.into());
        self
    }

    pub fn default_value(mut self, value: FieldValue) -> Self {
        self.default = Some(value);
        self
    }

    /// A field can seed template expansion only if the model has
    /// something to cycle over.
    pub fn is_enumerable(&self) -> bool {
        self.enumeration.as_ref().map(|e| !e.is_empty()).unwrap_or(false)
            || !self.examples.is_empty()
    }
}

/// Ordered collection of field descriptors for one script variant.
#[derive(Clone, Debug, PartialEq)]
pub struct DialogueSchema {
    fields: Vec<FieldDescriptor>,
    pub business_hours: Option<BusinessHours>,
    /// Fields the conversation owns; extracted updates never touch them.
    pub protected_fields: BTreeSet<String>,
}

impl DialogueSchema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self, SchemaError> {
        let mut seen = BTreeSet::new();
        for field in &fields {
            if !seen.insert(field.name.clone()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        for field in &fields {
            if let Some(paired) = &field.paired_date_field {
                if !seen.contains(paired) {
                    return Err(SchemaError::UnknownPairedField {
                        field: field.name.clone(),
                        paired: paired.clone(),
                    });
                }
            }
        }
        Ok(Self { fields, business_hours: None, protected_fields: BTreeSet::new() })
    }

    pub fn with_business_hours(mut self, opens: NaiveTime, closes: NaiveTime) -> Self {
        self.business_hours = Some(BusinessHours { opens, closes });
        self
    }

    pub fn with_protected_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_fields = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Fields flagged for the normalization round trip.
    pub fn normalizable_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|field| field.normalize).map(|field| field.name.as_str())
    }

    /// Build a fresh schema containing only the named fields, preserving
    /// declaration order. Never aliases this schema's containers.
    pub fn restricted_to(&self, keys: &BTreeSet<String>) -> DialogueSchema {
        let fields =
            self.fields.iter().filter(|field| keys.contains(&field.name)).cloned().collect();
        DialogueSchema {
            fields,
            business_hours: self.business_hours,
            protected_fields: self.protected_fields.clone(),
        }
    }

    /// Build a fresh schema whose `INTENT` field enumerates exactly the
    /// given intent names.
    pub fn with_intent_choices(&self, intent_names: &[String]) -> DialogueSchema {
        let mut schema = self.clone();
        if let Some(field) = schema.fields.iter_mut().find(|field| field.name == INTENT_KEY) {
            field.enumeration =
                Some(intent_names.iter().map(|name| Value::String(name.clone())).collect());
        }
        schema
    }
}

/// The two control fields every dialogue schema carries.
pub fn control_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new(SCRIPT_LOCATION_KEY, FieldKind::Text).hidden(),
        FieldDescriptor::new(INTENT_KEY, FieldKind::Text)
            .description("The user's intent based on the last turn.")
            .enumeration(Vec::new()),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveTime;
    use serde_json::json;

    use super::{Bound, BusinessHours, DialogueSchema, FieldDescriptor, FieldKind};
    use crate::errors::SchemaError;

    fn sample_schema() -> DialogueSchema {
        DialogueSchema::new(vec![
            FieldDescriptor::new("car_model_name", FieldKind::Text)
                .examples(vec![json!("Renault Megane"), json!("Škoda Superb")]),
            FieldDescriptor::new("car_fuel", FieldKind::Enumeration)
                .enumeration(vec![json!("benzín"), json!("diesel")])
                .normalize(),
            FieldDescriptor::new("car_mileage", FieldKind::Integer)
                .bounds(Some(Bound::Inclusive(0)), Some(Bound::Exclusive(4_828_032))),
        ])
        .expect("valid schema")
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let error = DialogueSchema::new(vec![
            FieldDescriptor::new("car_fuel", FieldKind::Text),
            FieldDescriptor::new("car_fuel", FieldKind::Text),
        ])
        .expect_err("duplicate must fail");
        assert_eq!(error, SchemaError::DuplicateField("car_fuel".to_string()));
    }

    #[test]
    fn unknown_paired_field_is_rejected() {
        let error = DialogueSchema::new(vec![FieldDescriptor::new(
            "appointment_time",
            FieldKind::Time,
        )
        .paired_date_field("appointment_date")])
        .expect_err("missing paired field must fail");
        assert!(matches!(error, SchemaError::UnknownPairedField { .. }));
    }

    #[test]
    fn bounds_honor_inclusivity() {
        let schema = sample_schema();
        let bounds = schema.field("car_mileage").unwrap().bounds.unwrap();
        assert!(bounds.contains(0));
        assert!(bounds.contains(4_828_031));
        assert!(!bounds.contains(4_828_032));
        assert!(!bounds.contains(-1));
    }

    #[test]
    fn business_hours_are_half_open() {
        let hours = BusinessHours {
            opens: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            closes: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        };
        assert!(hours.contains(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        assert!(hours.contains(NaiveTime::from_hms_opt(20, 59, 0).unwrap()));
        assert!(!hours.contains(NaiveTime::from_hms_opt(21, 0, 0).unwrap()));
        assert!(!hours.contains(NaiveTime::from_hms_opt(8, 59, 0).unwrap()));
    }

    #[test]
    fn restriction_preserves_order_and_copies() {
        let schema = sample_schema();
        let keys: BTreeSet<String> =
            ["car_mileage", "car_model_name"].iter().map(|s| s.to_string()).collect();
        let pruned = schema.restricted_to(&keys);
        let names: Vec<&str> = pruned.field_names().collect();
        assert_eq!(names, vec!["car_model_name", "car_mileage"]);
        assert!(schema.contains("car_fuel"), "source schema must stay intact");
    }

    #[test]
    fn enumerable_requires_enum_or_examples() {
        let schema = sample_schema();
        assert!(schema.field("car_fuel").unwrap().is_enumerable());
        assert!(schema.field("car_model_name").unwrap().is_enumerable());
        assert!(!schema.field("car_mileage").unwrap().is_enumerable());
    }
}
