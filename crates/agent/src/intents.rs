//! Intent templates: what a caller might say at a location and what it
//! does to the dialogue state.

use std::collections::BTreeMap;

use callscript_core::{DialogueSchema, DialogueState, INTENT_KEY};
use serde::Serialize;
use tera::Context;

use crate::errors::{PromptError, ScriptDefinitionError};
use crate::prompts::{enumeration_or_examples, render_snippet};

/// How an intent's match examples are produced.
#[derive(Clone, Debug, PartialEq)]
pub enum IntentExamples {
    /// A fixed list of utterance templates, optionally with one update
    /// template per utterance.
    Literal {
        utterances: Vec<String>,
        per_example_updates: Option<Vec<BTreeMap<String, String>>>,
    },
    /// Seed patterns cycled across every value of the field currently
    /// bound as the template property. One example and one update per
    /// value.
    Expanding { seed_patterns: Vec<String> },
}

/// A recognizable class of caller utterance with a response template
/// and a state-update template. Matching an intent always records the
/// intent's name under `INTENT`.
#[derive(Clone, Debug, PartialEq)]
pub struct Intent {
    pub name: String,
    pub examples: IntentExamples,
    pub response: String,
    pub update: BTreeMap<String, String>,
}

impl Intent {
    pub fn literal(
        name: impl Into<String>,
        utterances: impl IntoIterator<Item = &'static str>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            examples: IntentExamples::Literal {
                utterances: utterances.into_iter().map(str::to_string).collect(),
                per_example_updates: None,
            },
            response: response.into(),
            update: BTreeMap::new(),
        }
    }

    pub fn expanding(
        name: impl Into<String>,
        seed_patterns: impl IntoIterator<Item = &'static str>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            examples: IntentExamples::Expanding {
                seed_patterns: seed_patterns.into_iter().map(str::to_string).collect(),
            },
            response: response.into(),
            update: BTreeMap::new(),
        }
    }

    /// Attach the state-update template applied when this intent
    /// matches.
    pub fn with_update(
        mut self,
        update: impl IntoIterator<Item = (&'static str, &'static str)>,
    ) -> Self {
        self.update =
            update.into_iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        self
    }

    /// Attach one update template per match example.
    pub fn with_example_updates(
        mut self,
        updates: impl IntoIterator<Item = Vec<(&'static str, &'static str)>>,
    ) -> Self {
        let updates = updates
            .into_iter()
            .map(|pairs| {
                pairs.into_iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
            })
            .collect();
        if let IntentExamples::Literal { per_example_updates, .. } = &mut self.examples {
            *per_example_updates = Some(updates);
        }
        self
    }

    /// Definition-time checks, run once when the script is assembled.
    pub fn validate(&self) -> Result<(), ScriptDefinitionError> {
        match &self.examples {
            IntentExamples::Literal { utterances, per_example_updates: Some(updates) } => {
                if utterances.len() != updates.len() {
                    return Err(ScriptDefinitionError::ExampleUpdateCountMismatch {
                        intent: self.name.clone(),
                        examples: utterances.len(),
                        updates: updates.len(),
                    });
                }
                Ok(())
            }
            IntentExamples::Literal { .. } => Ok(()),
            IntentExamples::Expanding { seed_patterns } => {
                if seed_patterns.is_empty() {
                    return Err(ScriptDefinitionError::NoSeedPatterns {
                        intent: self.name.clone(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Render this intent against a concrete dialogue state: expand
    /// seed patterns, substitute state values into utterances and
    /// updates. The intent itself is never mutated.
    pub fn render(
        &self,
        schema: &DialogueSchema,
        state: &DialogueState,
        context: &Context,
    ) -> Result<RenderedIntent, PromptError> {
        let response = render_snippet(&self.response, context)?;
        match &self.examples {
            IntentExamples::Literal { utterances, per_example_updates } => {
                let match_examples = utterances
                    .iter()
                    .map(|utterance| render_snippet(utterance, context))
                    .collect::<Result<Vec<_>, _>>()?;

                let example_updates = match per_example_updates {
                    Some(updates) => updates
                        .iter()
                        .map(|update| self.render_update(update, context))
                        .collect::<Result<Vec<_>, _>>()?,
                    None => vec![self.render_update(&self.update, context)?],
                };

                Ok(RenderedIntent { name: self.name.clone(), match_examples, response, example_updates })
            }
            IntentExamples::Expanding { seed_patterns } => {
                let bound_field = state
                    .template_property()
                    .ok_or_else(|| PromptError::MissingTemplateProperty(self.name.clone()))?;
                let field = schema
                    .field(bound_field)
                    .ok_or_else(|| PromptError::MissingTemplateProperty(self.name.clone()))?;
                let values = enumeration_or_examples(field.enumeration.as_deref(), &field.examples);
                if values.is_empty() {
                    return Err(PromptError::NothingToExpand {
                        intent: self.name.clone(),
                        field: bound_field.to_string(),
                    });
                }

                let mut match_examples = Vec::with_capacity(values.len());
                let mut example_updates = Vec::with_capacity(values.len());
                for (value, pattern) in values.iter().zip(seed_patterns.iter().cycle()) {
                    let mut example_context = context.clone();
                    example_context.insert("template_property_example", value);
                    match_examples.push(render_snippet(pattern, &example_context)?);

                    let mut update = BTreeMap::new();
                    update.insert(INTENT_KEY.to_string(), self.name.clone());
                    update.insert(bound_field.to_string(), value.clone());
                    example_updates.push(update);
                }

                Ok(RenderedIntent { name: self.name.clone(), match_examples, response, example_updates })
            }
        }
    }

    fn render_update(
        &self,
        update: &BTreeMap<String, String>,
        context: &Context,
    ) -> Result<BTreeMap<String, String>, PromptError> {
        let mut rendered = BTreeMap::new();
        rendered.insert(INTENT_KEY.to_string(), self.name.clone());
        for (key, value) in update {
            rendered.insert(render_snippet(key, context)?, render_snippet(value, context)?);
        }
        Ok(rendered)
    }
}

/// A fully concrete intent view for one rendered location: no templates
/// left, every example paired with the update it demonstrates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderedIntent {
    pub name: String,
    pub match_examples: Vec<String>,
    pub response: String,
    pub example_updates: Vec<BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use callscript_core::{
        DialogueSchema, DialogueState, FieldDescriptor, FieldKind, FieldValue,
    };
    use serde_json::json;

    use super::{Intent, IntentExamples};
    use crate::errors::ScriptDefinitionError;
    use crate::prompts::state_context;

    fn schema() -> DialogueSchema {
        DialogueSchema::new(vec![
            FieldDescriptor::new("template_property_name", FieldKind::Text).hidden(),
            FieldDescriptor::new("user_salutation", FieldKind::Text),
            FieldDescriptor::new("car_transmission", FieldKind::Enumeration)
                .enumeration(vec![json!("automat"), json!("manuál")]),
            FieldDescriptor::new("car_model_name", FieldKind::Text)
                .examples(vec![json!("Renault Megane"), json!("Škoda Superb")]),
        ])
        .expect("valid schema")
    }

    fn state() -> DialogueState {
        let mut state = DialogueState::from_schema(&schema());
        state.set("user_salutation", FieldValue::Text("pane Nováku".to_string()));
        state
    }

    #[test]
    fn literal_intent_substitutes_state_into_examples_and_response() {
        let intent = Intent::literal(
            "user_greeting",
            ["s kým mluvím?", "Kdo volá?"],
            "Dobrý den ještě jednou, {{ user_salutation }}.",
        );
        let schema = schema();
        let state = state();
        let rendered =
            intent.render(&schema, &state, &state_context(&schema, &state)).expect("renders");

        assert_eq!(rendered.match_examples, vec!["s kým mluvím?", "Kdo volá?"]);
        assert_eq!(rendered.response, "Dobrý den ještě jednou, pane Nováku.");
        assert_eq!(rendered.example_updates.len(), 1);
        assert_eq!(rendered.example_updates[0]["INTENT"], "user_greeting");
    }

    #[test]
    fn expanding_intent_cycles_seed_patterns_over_the_enumeration() {
        let intent = Intent::expanding(
            "user_answered_the_question",
            ["{{ template_property_example }}.", "Je to {{ template_property_example }}."],
            "Děkuji.",
        );
        let schema = schema();
        let mut state = state();
        state.set_template_property("car_transmission");
        let rendered =
            intent.render(&schema, &state, &state_context(&schema, &state)).expect("renders");

        assert_eq!(rendered.match_examples, vec!["automat.", "Je to manuál."]);
        assert_eq!(rendered.example_updates.len(), 2);
        assert_eq!(rendered.example_updates[0]["car_transmission"], "automat");
        assert_eq!(rendered.example_updates[1]["car_transmission"], "manuál");
        assert_eq!(rendered.example_updates[1]["INTENT"], "user_answered_the_question");
    }

    #[test]
    fn expanding_intent_falls_back_to_field_examples() {
        let intent = Intent::expanding(
            "user_answered_the_question",
            ["Mám {{ template_property_example }}."],
            "Děkuji.",
        );
        let schema = schema();
        let mut state = state();
        state.set_template_property("car_model_name");
        let rendered =
            intent.render(&schema, &state, &state_context(&schema, &state)).expect("renders");
        assert_eq!(
            rendered.match_examples,
            vec!["Mám Renault Megane.", "Mám Škoda Superb."]
        );
    }

    #[test]
    fn per_example_update_count_must_match() {
        let intent = Intent::literal(
            "user_answered_the_question",
            ["No asi tak dvestě tisíc", "milión"],
            "Děkuji.",
        )
        .with_example_updates([vec![("users_car_price", "200000")]]);
        assert!(matches!(
            intent.validate(),
            Err(ScriptDefinitionError::ExampleUpdateCountMismatch { examples: 2, updates: 1, .. })
        ));
    }

    #[test]
    fn per_example_updates_always_carry_the_intent_name() {
        let intent = Intent::literal(
            "user_answered_the_question",
            ["No asi tak dvestě tisíc"],
            "Děkuji.",
        )
        .with_example_updates([vec![("users_car_price", "200000")]]);
        intent.validate().expect("valid");

        let schema = schema();
        let state = state();
        let rendered =
            intent.render(&schema, &state, &state_context(&schema, &state)).expect("renders");
        assert_eq!(rendered.example_updates[0]["users_car_price"], "200000");
        assert_eq!(rendered.example_updates[0]["INTENT"], "user_answered_the_question");
    }

    #[test]
    fn seedless_expanding_intent_is_rejected_at_definition_time() {
        let intent = Intent {
            name: "user_answered_the_question".to_string(),
            examples: IntentExamples::Expanding { seed_patterns: Vec::new() },
            response: String::new(),
            update: Default::default(),
        };
        assert!(matches!(intent.validate(), Err(ScriptDefinitionError::NoSeedPatterns { .. })));
    }
}
