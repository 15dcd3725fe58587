//! Scripted voice-call agent core.
//!
//! A conversation is a walk over a [`script::Script`]'s location graph.
//! Each turn, the caller's utterance is classified and field values are
//! extracted against the current location's pruned schema view, the
//! update is validated and committed atomically, and the script's
//! [`decision::ScriptPolicy`] picks the next location. Values that fail
//! validation in a recoverable way get one normalization round trip
//! through the model before the turn is retried.
//!
//! [`outbound_buy`] is the shipped script variant: an outbound call
//! buying a used car from its owner, in Czech.

pub mod decision;
pub mod errors;
pub mod intents;
pub mod llm;
pub mod normalize;
pub mod outbound_buy;
pub mod prompts;
pub mod response_check;
pub mod script;

pub use decision::{decide, Decision, ScriptPolicy};
pub use errors::{PromptError, ScriptDefinitionError};
pub use intents::{Intent, IntentExamples, RenderedIntent};
pub use llm::LlmClient;
pub use normalize::NormalizationExamples;
pub use outbound_buy::{
    outbound_buy_schema, outbound_buy_script, outbound_buy_state, state_from_form, CustomerForm,
    OutboundBuyPolicy,
};
pub use prompts::{function_schema, FunctionSchema, SchemaMode};
pub use response_check::{
    LengthCheck, ProhibitedPhraseCheck, ResponseCheck, ResponseValidator, SpecialCharacterCheck,
};
pub use script::{LocationView, RenderedLocation, Script, ScriptLocation};
