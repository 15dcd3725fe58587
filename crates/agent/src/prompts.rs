//! Prompt assembly for the language model.
//!
//! Two layers of templating are in play. The named templates
//! (`call_script.tera`, `normalization.tera`) shape the whole prompt and
//! are compiled once per script. Snippet templates are the short Czech
//! texts inside the script definition (goals, responses, match
//! examples); each is rendered against the current dialogue state
//! through a throwaway engine so rendering stays a pure function of its
//! inputs.

use std::collections::{BTreeMap, HashMap};

use callscript_core::speech::{date_to_words, time_to_words};
use callscript_core::{DialogueSchema, DialogueState, FieldValue};
use chrono::{Days, NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tera::{Context, Tera};

use crate::errors::{PromptError, ScriptDefinitionError};

pub const CALL_SCRIPT_TEMPLATE: &str = "call_script.tera";
pub const NORMALIZATION_TEMPLATE: &str = "normalization.tera";

/// Build the shared engine holding the named prompt templates.
pub fn template_engine() -> Result<Tera, ScriptDefinitionError> {
    let mut tera = Tera::default();
    register_template_filters(&mut tera);
    tera.add_raw_template(
        CALL_SCRIPT_TEMPLATE,
        include_str!("../templates/call_script.tera"),
    )?;
    tera.add_raw_template(
        NORMALIZATION_TEMPLATE,
        include_str!("../templates/normalization.tera"),
    )?;
    Ok(tera)
}

/// Register the value-to-speech filters used by script texts.
///
/// - `date_to_tts`: ISO date to spoken Czech, e.g.
///   `{{ inspection_appointment_date | date_to_tts(today=current_date) }}`
/// - `time_to_tts`: `HH:MM` to spoken Czech.
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("date_to_tts", tera_date_to_tts_filter);
    tera.register_filter("time_to_tts", tera_time_to_tts_filter);
}

fn tera_date_to_tts_filter(
    value: &Value,
    args: &HashMap<String, Value>,
) -> tera::Result<Value> {
    let Some(raw) = value.as_str() else {
        return Ok(Value::String("neznámé datum".to_string()));
    };
    let today = args
        .get("today")
        .and_then(Value::as_str)
        .and_then(|iso| NaiveDate::parse_from_str(iso, "%Y-%m-%d").ok());
    let spoken = match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date_to_words(date, today),
        Err(_) => "neznámé datum".to_string(),
    };
    Ok(Value::String(spoken))
}

fn tera_time_to_tts_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let Some(raw) = value.as_str() else {
        return Ok(Value::String("neznámý čas".to_string()));
    };
    let spoken = match NaiveTime::parse_from_str(raw, "%H:%M") {
        Ok(time) => time_to_words(time),
        Err(_) => "neznámý čas".to_string(),
    };
    Ok(Value::String(spoken))
}

/// Render one snippet template against the given context.
///
/// A fresh engine per call keeps snippet rendering free of any shared
/// mutable template registry.
pub fn render_snippet(source: &str, context: &Context) -> Result<String, PromptError> {
    let mut tera = Tera::default();
    register_template_filters(&mut tera);
    tera.add_raw_template("snippet", source)?;
    Ok(tera.render("snippet", context)?)
}

/// Tera context carrying every dialogue-state field plus the derived
/// variables script texts rely on.
pub fn state_context(schema: &DialogueSchema, state: &DialogueState) -> Context {
    let mut context = Context::new();
    for name in state.field_names() {
        match state.get(name) {
            Some(value) => context.insert(name, &value.to_json()),
            None => context.insert(name, &Value::Null),
        }
    }

    if let Some(today) = state.current_date() {
        if let Some(tomorrow) = today.checked_add_days(Days::new(1)) {
            context.insert("tomorrow", &tomorrow.format("%Y-%m-%d").to_string());
        }
    }

    if let Some(bound_field) = state.template_property() {
        if let Some(field) = schema.field(bound_field) {
            if let Some(ask) = &field.ask {
                context.insert("template_property_ask", ask);
            }
            let choices = enumeration_or_examples(field.enumeration.as_deref(), &field.examples);
            if !choices.is_empty() {
                context.insert("template_property_choices", &choices.join(", "));
            }
        }
    }

    context
}

/// Enumeration wins over examples when both are declared.
pub(crate) fn enumeration_or_examples(
    enumeration: Option<&[Value]>,
    examples: &[Value],
) -> Vec<String> {
    let source = match enumeration {
        Some(values) if !values.is_empty() => values,
        _ => examples,
    };
    source.iter().map(display_value).collect()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Which wire shape a function schema is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaMode {
    /// Sent to the model as the function-calling contract:
    /// `{type, enum?, examples?}` per property.
    Extraction,
    /// Embedded into the generation prompt for the model to read:
    /// `{type, enum?, description}` with examples folded into the
    /// description.
    Documentation,
}

/// The function-calling contract sent alongside the extraction prompt.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FunctionSchema {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: ObjectParameters,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObjectParameters {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

impl FunctionSchema {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.parameters.properties.keys().map(String::as_str).collect()
    }
}

/// Build the object schema over every non-hidden field of the pruned
/// schema. The location control field never reaches the model.
pub fn function_schema(schema: &DialogueSchema, mode: SchemaMode) -> FunctionSchema {
    let (name, description) = match mode {
        SchemaMode::Extraction => (
            "get_argument_values".to_string(),
            Some("Get values for arguments mentioned in the current turn.".to_string()),
        ),
        SchemaMode::Documentation => ("dialog_state_schema".to_string(), None),
    };

    let mut properties = Map::new();
    for field in schema.fields() {
        if field.hidden || field.name == callscript_core::SCRIPT_LOCATION_KEY {
            continue;
        }

        let mut property = Map::new();
        property.insert("type".to_string(), json!(field.kind.json_type()));
        if let Some(enumeration) = &field.enumeration {
            property.insert("enum".to_string(), Value::Array(enumeration.clone()));
        }
        match mode {
            SchemaMode::Extraction => {
                if !field.examples.is_empty() {
                    property.insert("examples".to_string(), Value::Array(field.examples.clone()));
                }
            }
            SchemaMode::Documentation => {
                let mut description = field.description.clone().unwrap_or_default();
                if !field.examples.is_empty() {
                    let examples = format!(
                        "Examples: {}.",
                        field
                            .examples
                            .iter()
                            .map(format_schema_example)
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                    if description.is_empty() {
                        description = examples;
                    } else {
                        description = format!("{description} {examples}");
                    }
                }
                if !description.is_empty() {
                    property.insert("description".to_string(), json!(description));
                }
            }
        }
        properties.insert(field.name.clone(), Value::Object(property));
    }

    FunctionSchema {
        name,
        description,
        parameters: ObjectParameters {
            kind: "object".to_string(),
            properties,
            required: Vec::new(),
        },
    }
}

fn format_schema_example(example: &Value) -> String {
    match example {
        Value::String(text) => format!("\"{text}\""),
        other => other.to_string(),
    }
}

/// Pretty JSON of the pruned state for the prompt's "current known
/// state" block. Hidden fields are kept out of the model's sight.
pub fn state_json_block(
    schema: &DialogueSchema,
    state_view: &BTreeMap<String, Option<FieldValue>>,
) -> String {
    let mut visible = Map::new();
    for (name, value) in state_view {
        let hidden = schema.field(name).map(|field| field.hidden).unwrap_or(false);
        if hidden {
            continue;
        }
        visible.insert(
            name.clone(),
            value.as_ref().map(FieldValue::to_json).unwrap_or(Value::Null),
        );
    }
    serde_json::to_string_pretty(&Value::Object(visible)).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use callscript_core::{DialogueSchema, DialogueState, FieldDescriptor, FieldKind, FieldValue};
    use chrono::NaiveDate;
    use serde_json::json;
    use tera::Context;

    use super::{function_schema, render_snippet, state_context, state_json_block, SchemaMode};

    fn schema() -> DialogueSchema {
        DialogueSchema::new(vec![
            FieldDescriptor::new("script_location", FieldKind::Text).hidden(),
            FieldDescriptor::new("current_date", FieldKind::Date),
            FieldDescriptor::new("template_property_name", FieldKind::Text).hidden(),
            FieldDescriptor::new("car_fuel", FieldKind::Enumeration)
                .description("The fuel type of the user's car.")
                .enumeration(vec![json!("benzín"), json!("diesel")])
                .examples(vec![json!("nafta"), json!("dýzl")])
                .ask("Jaké pohonné palivo používá váš vůz?"),
            FieldDescriptor::new("car_mileage", FieldKind::Integer)
                .examples(vec![json!(40_000), json!(250_000)]),
        ])
        .expect("valid schema")
    }

    fn state() -> DialogueState {
        let mut state = DialogueState::from_schema(&schema());
        state.set(
            "current_date",
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 10, 27).unwrap()),
        );
        state.set_template_property("car_fuel");
        state
    }

    #[test]
    fn extraction_schema_skips_hidden_and_location_fields() {
        let function = function_schema(&schema(), SchemaMode::Extraction);
        assert_eq!(function.name, "get_argument_values");
        assert_eq!(function.property_names(), vec!["car_fuel", "car_mileage", "current_date"]);

        let fuel = &function.parameters.properties["car_fuel"];
        assert_eq!(fuel["type"], json!("string"));
        assert_eq!(fuel["enum"], json!(["benzín", "diesel"]));
        assert_eq!(fuel["examples"], json!(["nafta", "dýzl"]));
        assert!(function.parameters.required.is_empty());
    }

    #[test]
    fn documentation_schema_folds_examples_into_descriptions() {
        let function = function_schema(&schema(), SchemaMode::Documentation);
        let fuel = &function.parameters.properties["car_fuel"];
        assert_eq!(
            fuel["description"],
            json!("The fuel type of the user's car. Examples: \"nafta\", \"dýzl\".")
        );
        assert!(fuel.get("examples").is_none());

        let mileage = &function.parameters.properties["car_mileage"];
        assert_eq!(mileage["description"], json!("Examples: 40000, 250000."));
    }

    #[test]
    fn context_carries_derived_template_variables() {
        let context = state_context(&schema(), &state());
        let rendered = render_snippet(
            "{{ template_property_ask }} ({{ template_property_choices }}) zítra {{ tomorrow }}",
            &context,
        )
        .expect("snippet renders");
        assert_eq!(
            rendered,
            "Jaké pohonné palivo používá váš vůz? (benzín, diesel) zítra 2024-10-28"
        );
    }

    #[test]
    fn date_filter_uses_spoken_shortcuts() {
        let mut context = Context::new();
        context.insert("current_date", "2024-10-27");
        context.insert("appointment", "2024-10-28");
        let rendered = render_snippet(
            "{{ appointment | date_to_tts(today=current_date) }} v {{ \"10:15\" | time_to_tts }}",
            &context,
        )
        .expect("snippet renders");
        assert_eq!(rendered, "zítra v v deset patnáct dopoledne");
    }

    #[test]
    fn state_block_serializes_visible_fields_only() {
        let state = state();
        let view: BTreeMap<_, _> = state
            .field_names()
            .map(|name| (name.to_string(), state.get(name).cloned()))
            .collect();
        let block = state_json_block(&schema(), &view);
        assert!(block.contains("\"current_date\": \"2024-10-27\""));
        assert!(block.contains("\"car_fuel\": null"));
        assert!(!block.contains("script_location"));
        assert!(!block.contains("template_property_name"));
    }
}
