pub mod config;
pub mod errors;
pub mod schema;
pub mod speech;
pub mod state;
pub mod validate;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use errors::{FailureKind, SchemaError, ValidationFailure};
pub use schema::{
    control_fields, Bound, Bounds, BusinessHours, DialogueSchema, FieldDescriptor, FieldKind,
};
pub use speech::{
    date_to_words, find_values_to_rewrite, float_to_words, integer_to_words, next_weekday, speak,
    time_to_words, SpokenValue, ValueKind,
};
pub use state::{
    DialogueState, FieldValue, RawUpdate, EXIT_LOCATION, INTENT_KEY, SCRIPT_LOCATION_KEY,
    TEMPLATE_PROPERTY_KEY,
};
pub use validate::{stage_update, StagedUpdate};
