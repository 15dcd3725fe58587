//! The script location graph and its rendering into prompts.

use std::collections::{BTreeMap, BTreeSet};

use callscript_core::{
    DialogueSchema, DialogueState, FieldValue, INTENT_KEY, SCRIPT_LOCATION_KEY,
};
use tera::{Context, Tera};
use tracing::debug;

use crate::errors::{PromptError, ScriptDefinitionError};
use crate::intents::{Intent, RenderedIntent};
use crate::normalize::NormalizationExamples;
use crate::prompts::{
    function_schema, render_snippet, state_context, state_json_block, template_engine,
    FunctionSchema, SchemaMode, CALL_SCRIPT_TEMPLATE, NORMALIZATION_TEMPLATE,
};

pub const USER_ANSWERED_THE_QUESTION: &str = "user_answered_the_question";
pub const USER_ASKED_GENERAL_QUESTION: &str = "user_asked_general_question";
pub const USER_ASKED_FAQ_QUESTION: &str = "user_asked_frequent_question";

/// A named node in the conversation graph.
///
/// Regular locations carry intents for the model to classify against.
/// Forced-prompt locations carry a single fixed utterance instead;
/// the agent says it verbatim and waits.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptLocation {
    pub name: String,
    pub goal: String,
    pub knowledge: String,
    pub intents: Vec<Intent>,
    pub input_states: Vec<String>,
    pub forced_prompt: Option<String>,
    binds_template_property: bool,
}

impl ScriptLocation {
    /// A location the model converses at. The two general-question
    /// intents every conversational node needs are appended
    /// automatically.
    pub fn new(
        name: impl Into<String>,
        goal: impl Into<String>,
        knowledge: impl Into<String>,
        mut intents: Vec<Intent>,
    ) -> Self {
        intents.extend(question_intents());
        Self {
            name: name.into(),
            goal: goal.into(),
            knowledge: knowledge.into(),
            intents,
            input_states: Vec::new(),
            forced_prompt: None,
            binds_template_property: false,
        }
    }

    /// A location whose only output is a fixed scripted sentence.
    pub fn print(
        name: impl Into<String>,
        goal: impl Into<String>,
        knowledge: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            goal: goal.into(),
            knowledge: knowledge.into(),
            intents: Vec::new(),
            input_states: Vec::new(),
            forced_prompt: Some(output.into()),
            binds_template_property: false,
        }
    }

    pub fn with_input_states(
        mut self,
        fields: impl IntoIterator<Item = &'static str>,
    ) -> Self {
        self.input_states = fields.into_iter().map(str::to_string).collect();
        self
    }

    /// Expose the dynamically bound field (and the binding itself) to
    /// the model at this location.
    pub fn binding_template_property(mut self) -> Self {
        self.binds_template_property = true;
        self
    }

    /// Build a fresh, fully concrete view of this location for the
    /// given state. Neither the location nor the state is touched.
    pub fn render(
        &self,
        schema: &DialogueSchema,
        state: &DialogueState,
        global_inputs: &BTreeSet<String>,
    ) -> Result<LocationView, PromptError> {
        let context = state_context(schema, state);

        let intents = self
            .intents
            .iter()
            .map(|intent| intent.render(schema, state, &context))
            .collect::<Result<Vec<_>, _>>()?;

        let intent_names: Vec<String> = intents.iter().map(|intent| intent.name.clone()).collect();
        let choice_schema = schema.with_intent_choices(&intent_names);

        let mut keys: BTreeSet<String> = global_inputs.clone();
        keys.extend(self.input_states.iter().cloned());
        if self.binds_template_property {
            let bound = state
                .template_property()
                .ok_or_else(|| PromptError::MissingTemplateProperty(self.name.clone()))?;
            keys.insert(bound.to_string());
            keys.insert(callscript_core::TEMPLATE_PROPERTY_KEY.to_string());
        }
        keys.retain(|key| choice_schema.contains(key));

        let pruned_schema = choice_schema.restricted_to(&keys);
        let pruned_state = state.pruned(&keys);
        debug_assert_eq!(
            pruned_schema.field_names().collect::<BTreeSet<_>>(),
            pruned_state.keys().map(String::as_str).collect::<BTreeSet<_>>(),
        );

        let forced_prompt = self
            .forced_prompt
            .as_deref()
            .map(|prompt| render_snippet(prompt, &context))
            .transpose()?;

        Ok(LocationView {
            location: RenderedLocation {
                name: self.name.clone(),
                goal: render_snippet(&self.goal, &context)?,
                knowledge: render_snippet(&self.knowledge, &context)?,
                intents,
                forced_prompt,
            },
            schema: pruned_schema,
            state: pruned_state,
        })
    }
}

fn question_intents() -> Vec<Intent> {
    vec![
        Intent::literal(
            USER_ASKED_GENERAL_QUESTION,
            [
                "A jak se jmenujete?",
                "Kde jste mě našli?",
                "Odkud máte moje číslo?",
                "Proč?",
                "Kde?",
                "Co?",
                "Kdo volá?",
                "Proč bych to měl udělat?",
            ],
            "Odpověď je, {answer to the question based on the knowledge or the dialog state}.",
        ),
        Intent::literal(
            USER_ASKED_FAQ_QUESTION,
            [
                "Kde máte pobočky?",
                "Můžete mi poradit?",
                "Jak to pomůže?",
                "Jaké jsou podmínky?",
                "Jaké jsou výhody?",
            ],
            "Odpověď je, {answer to the question based on the knowledge and FAQ and don't ask questions}.",
        ),
    ]
}

/// One location rendered to concrete text.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedLocation {
    pub name: String,
    pub goal: String,
    pub knowledge: String,
    pub intents: Vec<RenderedIntent>,
    pub forced_prompt: Option<String>,
}

/// A rendered location together with the schema and state views the
/// model is allowed to see there. The schema's field set and the state
/// view's key set are always identical.
#[derive(Clone, Debug)]
pub struct LocationView {
    pub location: RenderedLocation,
    pub schema: DialogueSchema,
    pub state: BTreeMap<String, Option<FieldValue>>,
}

/// One script variant: the location graph, the full field schema, the
/// global input fields and the normalization example sets.
#[derive(Debug)]
pub struct Script {
    pub goal: String,
    pub schema: DialogueSchema,
    global_inputs: BTreeSet<String>,
    locations: Vec<ScriptLocation>,
    normalization_examples: Vec<NormalizationExamples>,
    engine: Tera,
}

impl Script {
    pub fn new(
        goal: impl Into<String>,
        schema: DialogueSchema,
        global_inputs: impl IntoIterator<Item = &'static str>,
        locations: Vec<ScriptLocation>,
        normalization_examples: Vec<NormalizationExamples>,
    ) -> Result<Self, ScriptDefinitionError> {
        let mut global: BTreeSet<String> =
            global_inputs.into_iter().map(str::to_string).collect();
        global.insert(INTENT_KEY.to_string());
        global.insert(SCRIPT_LOCATION_KEY.to_string());

        let mut seen = BTreeSet::new();
        for location in &locations {
            if !seen.insert(location.name.clone()) {
                return Err(ScriptDefinitionError::DuplicateLocation(location.name.clone()));
            }
            for field in &location.input_states {
                if !schema.contains(field) {
                    return Err(ScriptDefinitionError::UnknownInputState {
                        location: location.name.clone(),
                        field: field.clone(),
                    });
                }
            }
            for intent in &location.intents {
                intent.validate()?;
            }
        }

        let engine = template_engine()?;
        Ok(Self {
            goal: goal.into(),
            schema,
            global_inputs: global,
            locations,
            normalization_examples,
            engine,
        })
    }

    pub fn location(&self, name: &str) -> Option<&ScriptLocation> {
        self.locations.iter().find(|location| location.name == name)
    }

    pub fn global_inputs(&self) -> &BTreeSet<String> {
        &self.global_inputs
    }

    pub fn normalization_examples(&self) -> &[NormalizationExamples] {
        &self.normalization_examples
    }

    /// Render the state's current location into a concrete view.
    pub fn render_location(&self, state: &DialogueState) -> Result<LocationView, PromptError> {
        let name = state.script_location();
        let location = self
            .location(name)
            .ok_or_else(|| PromptError::UnknownLocation(name.to_string()))?;
        location.render(&self.schema, state, &self.global_inputs)
    }

    /// The prompt asking the model to produce the agent's next
    /// utterance.
    pub fn render_generation_prompt(&self, state: &DialogueState) -> Result<String, PromptError> {
        let view = self.render_location(state)?;
        let context = self.prompt_context(state, &view, SchemaMode::Documentation, false);
        debug!(location = %view.location.name, "rendering generation prompt");
        Ok(self.engine.render(CALL_SCRIPT_TEMPLATE, &context)?)
    }

    /// The prompt plus function-calling schema asking the model to
    /// classify the caller's utterance and extract field values.
    pub fn render_extraction_prompt(
        &self,
        state: &DialogueState,
    ) -> Result<(String, FunctionSchema), PromptError> {
        let view = self.render_location(state)?;
        let context = self.prompt_context(state, &view, SchemaMode::Documentation, true);
        debug!(location = %view.location.name, "rendering extraction prompt");
        let prompt = self.engine.render(CALL_SCRIPT_TEMPLATE, &context)?;
        Ok((prompt, function_schema(&view.schema, SchemaMode::Extraction)))
    }

    /// The few-shot re-prompt for exactly the failing fields.
    pub fn render_normalization_prompt(
        &self,
        state: &DialogueState,
        fields: &[String],
    ) -> Result<String, PromptError> {
        let examples = self
            .normalization_examples
            .iter()
            .filter(|examples| fields.contains(&examples.field))
            .map(NormalizationExamples::render)
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut context = Context::new();
        context.insert("examples", &examples);
        context.insert(
            "current_date",
            &state.current_date().map(|date| date.format("%Y-%m-%d").to_string()),
        );
        context.insert(
            "current_time",
            &state.current_time().map(|time| time.format("%H:%M").to_string()),
        );
        debug!(fields = ?fields, "rendering normalization prompt");
        Ok(self.engine.render(NORMALIZATION_TEMPLATE, &context)?)
    }

    /// The fixed utterance of a forced-prompt location, rendered
    /// against the current state. `None` for conversational locations.
    pub fn forced_utterance(
        &self,
        state: &DialogueState,
        location_name: &str,
    ) -> Result<Option<String>, PromptError> {
        let location = self
            .location(location_name)
            .ok_or_else(|| PromptError::UnknownLocation(location_name.to_string()))?;
        let Some(prompt) = location.forced_prompt.as_deref() else {
            return Ok(None);
        };
        let context = state_context(&self.schema, state);
        Ok(Some(render_snippet(prompt, &context)?))
    }

    fn prompt_context(
        &self,
        state: &DialogueState,
        view: &LocationView,
        schema_mode: SchemaMode,
        extraction: bool,
    ) -> Context {
        let snippet_context = state_context(&self.schema, state);
        let script_goal =
            render_snippet(&self.goal, &snippet_context).unwrap_or_else(|_| self.goal.clone());

        let mut context = Context::new();
        context.insert("extraction", &extraction);
        context.insert("script_goal", &script_goal);
        context.insert("location_name", &view.location.name);
        context.insert("location_goal", &view.location.goal);
        context.insert("location_knowledge", &view.location.knowledge);
        context.insert("intents", &view.location.intents);
        context.insert("forced_prompt", &view.location.forced_prompt);
        context.insert("dialog_state_json", &state_json_block(&view.schema, &view.state));
        let schema_json = function_schema(&view.schema, schema_mode).to_json();
        context.insert(
            "schema_json",
            &serde_json::to_string_pretty(&schema_json).unwrap_or_else(|_| "{}".to_string()),
        );
        context
    }
}
