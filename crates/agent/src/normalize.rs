//! Few-shot canonicalization of spoken-form values.
//!
//! When extraction returns something like "dva tisíce patnáct" for an
//! integer field, the value fails validation and gets one more round
//! trip through the model with examples of correct normalizations for
//! exactly the failing fields.

use callscript_core::DialogueSchema;

use crate::errors::ScriptDefinitionError;

/// Few-shot examples mapping spoken forms of one field's values to
/// their canonical forms, plus the field's enumeration if it has one.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizationExamples {
    pub field: String,
    pub examples: Vec<(String, String)>,
    pub enumeration: Vec<String>,
}

impl NormalizationExamples {
    /// Look the field up in the schema so enum-constrained fields list
    /// their allowed values in the prompt.
    pub fn from_schema(
        schema: &DialogueSchema,
        field: impl Into<String>,
        examples: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ScriptDefinitionError> {
        let field = field.into();
        let descriptor = schema
            .field(&field)
            .ok_or_else(|| ScriptDefinitionError::UnknownNormalizationField(field.clone()))?;
        let enumeration = descriptor
            .enumeration
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect();
        Ok(Self { field, examples: examples.into_iter().collect(), enumeration })
    }

    /// The prompt block for this field: an optional allowed-value list
    /// followed by fenced `spoken -> canonical` example lines.
    pub fn render(&self) -> String {
        let examples_heading =
            format!("Here are some examples of correct normalizations for {} values:", self.field);
        let example_lines = self
            .examples
            .iter()
            .map(|(spoken, canonical)| format!("{spoken} -> {canonical}"))
            .collect::<Vec<_>>()
            .join("\n");
        let examples = format!("```\n{example_lines}\n```");

        if self.enumeration.is_empty() {
            format!("{examples_heading}\n\n{examples}")
        } else {
            let value_list_heading =
                format!("For {}, normalize the input to one of the following values:", self.field);
            let value_list = self
                .enumeration
                .iter()
                .map(|value| format!("* {value}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("{value_list_heading}\n\n{value_list}\n\n{examples_heading}\n\n{examples}")
        }
    }
}

#[cfg(test)]
mod tests {
    use callscript_core::{DialogueSchema, FieldDescriptor, FieldKind};
    use serde_json::json;

    use super::NormalizationExamples;
    use crate::errors::ScriptDefinitionError;

    fn schema() -> DialogueSchema {
        DialogueSchema::new(vec![
            FieldDescriptor::new("users_car_price", FieldKind::Integer),
            FieldDescriptor::new("car_fuel", FieldKind::Enumeration)
                .enumeration(vec![json!("benzín"), json!("diesel"), json!("LPG")]),
        ])
        .expect("valid schema")
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(spoken, canonical)| (spoken.to_string(), canonical.to_string())).collect()
    }

    #[test]
    fn plain_field_renders_examples_only() {
        let examples = NormalizationExamples::from_schema(
            &schema(),
            "users_car_price",
            pairs(&[("třicet tisíc", "30000"), ("milión", "1000000")]),
        )
        .expect("known field");
        assert_eq!(
            examples.render(),
            "Here are some examples of correct normalizations for users_car_price values:\n\n\
             ```\ntřicet tisíc -> 30000\nmilión -> 1000000\n```"
        );
    }

    #[test]
    fn enum_field_lists_allowed_values_first() {
        let examples = NormalizationExamples::from_schema(
            &schema(),
            "car_fuel",
            pairs(&[("nafta", "diesel")]),
        )
        .expect("known field");
        let rendered = examples.render();
        assert!(rendered.starts_with(
            "For car_fuel, normalize the input to one of the following values:\n\n\
             * benzín\n* diesel\n* LPG\n\n"
        ));
        assert!(rendered.ends_with("```\nnafta -> diesel\n```"));
    }

    #[test]
    fn unknown_field_is_a_definition_error() {
        let error = NormalizationExamples::from_schema(&schema(), "bogus", pairs(&[]))
            .expect_err("unknown field must fail");
        assert!(matches!(error, ScriptDefinitionError::UnknownNormalizationField(field) if field == "bogus"));
    }
}
