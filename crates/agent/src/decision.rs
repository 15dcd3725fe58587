//! Turn-level decision making: validate the extracted update, commit it,
//! and let the script's policy pick the next location.

use callscript_core::{stage_update, DialogueState, RawUpdate};
use tracing::debug;

use crate::script::Script;

/// Outcome of one decision step, handed back to the conversation loop.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decision {
    /// Location the conversation continues at.
    pub next_location: String,
    /// A scripted utterance to say immediately, bypassing generation.
    pub forced_utterance: Option<String>,
    /// Re-issue the current location's prompt instead of advancing.
    pub retry: bool,
    /// The update needs a normalization round trip before it can be
    /// committed; nothing was applied to the state.
    pub normalize: bool,
    pub fields_to_normalize: Vec<String>,
}

impl Decision {
    pub fn advance(location: impl Into<String>) -> Self {
        Self { next_location: location.into(), ..Self::default() }
    }

    pub fn stay(location: impl Into<String>) -> Self {
        Self { next_location: location.into(), retry: true, ..Self::default() }
    }

    pub fn say(location: impl Into<String>, utterance: impl Into<String>) -> Self {
        Self {
            next_location: location.into(),
            forced_utterance: Some(utterance.into()),
            ..Self::default()
        }
    }

    pub fn request_normalization(location: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            next_location: location.into(),
            normalize: true,
            fields_to_normalize: fields,
            ..Self::default()
        }
    }

    pub fn with_utterance(mut self, utterance: impl Into<String>) -> Self {
        self.forced_utterance = Some(utterance.into());
        self
    }
}

/// The deterministic transition function of one script variant.
///
/// Called only after the update has been validated and committed; the
/// state already carries the new values and the matched `INTENT`.
/// Implementations must resolve every reachable state to a decision,
/// defaulting to [`Decision::stay`] on the current location.
pub trait ScriptPolicy {
    fn transition(&self, script: &Script, state: &mut DialogueState) -> Decision;
}

/// Run one full decision step: stage the extracted update, divert to
/// normalization if any flagged field failed, otherwise commit the
/// staged values atomically and apply the policy's transition.
///
/// Validation failures take precedence over intent transitions. When
/// normalization is requested, the state is left untouched so the same
/// step can be re-run with the normalized update.
pub fn decide(
    script: &Script,
    policy: &dyn ScriptPolicy,
    state: &mut DialogueState,
    update: &RawUpdate,
) -> Decision {
    let staged = stage_update(&script.schema, state, update);

    let fields_to_normalize = staged.fields_to_normalize(&script.schema);
    if !fields_to_normalize.is_empty() {
        debug!(fields = ?fields_to_normalize, "diverting to normalization");
        return Decision::request_normalization(state.script_location(), fields_to_normalize);
    }

    // Failures on non-normalizable fields are dropped for this turn;
    // the location's ask covers the re-request.
    for (field, value) in staged.values {
        state.set(&field, value);
    }

    let decision = policy.transition(script, state);
    state.set_script_location(&decision.next_location);
    decision
}
