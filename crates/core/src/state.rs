use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde_json::{Map, Value};

use crate::schema::DialogueSchema;

pub const SCRIPT_LOCATION_KEY: &str = "script_location";
pub const INTENT_KEY: &str = "INTENT";
pub const TEMPLATE_PROPERTY_KEY: &str = "template_property_name";

/// Sentinel location marking the end of a conversation.
pub const EXIT_LOCATION: &str = "EXIT";

/// Raw field→value mapping as returned by the language model's
/// function-calling response. Untrusted until staged.
pub type RawUpdate = BTreeMap<String, Value>;

/// A canonical, schema-typed field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl FieldValue {
    /// JSON rendering with dates and times as ISO-8601 strings, the flat
    /// shape used for persistence and for the prompt's state block.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Integer(value) => Value::Number((*value).into()),
            Self::Boolean(value) => Value::Bool(*value),
            Self::Date(date) => Value::String(date.format("%Y-%m-%d").to_string()),
            Self::Time(time) => Value::String(time.format("%H:%M").to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Self::Time(time) => Some(*time),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Time(time) => write!(f, "{}", time.format("%H:%M")),
        }
    }
}

/// The full set of field values tracked for one conversation.
///
/// Every schema field is always present, unset fields as `None`, so a
/// pruned view of the state and a pruned schema always carry the same
/// key set. Created once per conversation and mutated only through
/// [`DialogueState::commit`]-style setters driven by the decision
/// engine.
#[derive(Clone, Debug, PartialEq)]
pub struct DialogueState {
    values: BTreeMap<String, Option<FieldValue>>,
}

impl DialogueState {
    /// Initialize from a schema, applying declared field defaults.
    pub fn from_schema(schema: &DialogueSchema) -> Self {
        let values = schema
            .fields()
            .iter()
            .map(|field| (field.name.clone(), field.default.clone()))
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name).and_then(|value| value.as_ref())
    }

    pub fn is_unset(&self, name: &str) -> bool {
        self.get(name).is_none()
    }

    /// Set a field. Unknown fields are ignored so a stale update can
    /// never grow the state beyond its schema.
    pub fn set(&mut self, name: &str, value: FieldValue) {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = Some(value);
        }
    }

    pub fn clear(&mut self, name: &str) {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = None;
        }
    }

    pub fn script_location(&self) -> &str {
        self.get(SCRIPT_LOCATION_KEY).and_then(FieldValue::as_text).unwrap_or(EXIT_LOCATION)
    }

    pub fn set_script_location(&mut self, location: &str) {
        self.set(SCRIPT_LOCATION_KEY, FieldValue::Text(location.to_string()));
    }

    pub fn intent(&self) -> Option<&str> {
        self.get(INTENT_KEY).and_then(FieldValue::as_text)
    }

    pub fn template_property(&self) -> Option<&str> {
        self.get(TEMPLATE_PROPERTY_KEY).and_then(FieldValue::as_text)
    }

    pub fn set_template_property(&mut self, field: &str) {
        self.set(TEMPLATE_PROPERTY_KEY, FieldValue::Text(field.to_string()));
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.get("current_date").and_then(FieldValue::as_date)
    }

    pub fn current_time(&self) -> Option<NaiveTime> {
        self.get("current_time").and_then(FieldValue::as_time)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Fresh pruned view restricted to the given keys. The source state
    /// is left untouched; the view shares no containers with it.
    pub fn pruned(&self, keys: &BTreeSet<String>) -> BTreeMap<String, Option<FieldValue>> {
        self.values
            .iter()
            .filter(|(name, _)| keys.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Flat JSON-compatible rendering (ISO-8601 dates and times), used
    /// for persistence.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (name, value) in &self.values {
            map.insert(
                name.clone(),
                value.as_ref().map(FieldValue::to_json).unwrap_or(Value::Null),
            );
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{DialogueState, FieldValue, EXIT_LOCATION, SCRIPT_LOCATION_KEY};
    use crate::schema::{DialogueSchema, FieldDescriptor, FieldKind};

    fn schema() -> DialogueSchema {
        DialogueSchema::new(vec![
            FieldDescriptor::new(SCRIPT_LOCATION_KEY, FieldKind::Text)
                .hidden()
                .default_value(FieldValue::Text("introduction".to_string())),
            FieldDescriptor::new("current_date", FieldKind::Date),
            FieldDescriptor::new("car_model_name", FieldKind::Text),
        ])
        .expect("valid schema")
    }

    #[test]
    fn state_carries_every_schema_field() {
        let state = DialogueState::from_schema(&schema());
        let names: Vec<&str> = state.field_names().collect();
        assert_eq!(names, vec!["car_model_name", "current_date", SCRIPT_LOCATION_KEY]);
        assert_eq!(state.script_location(), "introduction");
        assert!(state.is_unset("car_model_name"));
    }

    #[test]
    fn unknown_fields_are_never_added() {
        let mut state = DialogueState::from_schema(&schema());
        state.set("bogus", FieldValue::Integer(1));
        assert!(state.get("bogus").is_none());
        assert_eq!(state.field_names().count(), 3);
    }

    #[test]
    fn json_rendering_uses_iso_dates_and_nulls() {
        let mut state = DialogueState::from_schema(&schema());
        state.set(
            "current_date",
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 10, 27).unwrap()),
        );
        let rendered = state.to_json();
        assert_eq!(rendered["current_date"], json!("2024-10-27"));
        assert_eq!(rendered["car_model_name"], json!(null));
    }

    #[test]
    fn missing_location_field_reads_as_exit() {
        let empty = DialogueState::from_schema(&DialogueSchema::new(vec![]).unwrap());
        assert_eq!(empty.script_location(), EXIT_LOCATION);
    }
}
