use callscript_core::SchemaError;
use thiserror::Error;

/// Fatal problems in a script definition. All of these are caught when
/// the script is assembled, before the first call is placed.
#[derive(Debug, Error)]
pub enum ScriptDefinitionError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("duplicate script location `{0}`")]
    DuplicateLocation(String),
    #[error("location `{location}` exposes unknown input state `{field}`")]
    UnknownInputState { location: String, field: String },
    #[error(
        "intent `{intent}` declares {updates} per-example updates for {examples} match examples"
    )]
    ExampleUpdateCountMismatch { intent: String, examples: usize, updates: usize },
    #[error("expanding intent `{intent}` needs at least one seed pattern")]
    NoSeedPatterns { intent: String },
    #[error("normalization examples reference unknown field `{0}`")]
    UnknownNormalizationField(String),
    #[error("template error in script definition: {0}")]
    Template(#[from] tera::Error),
}

/// Render-time failures. These depend on the concrete dialogue state,
/// so they can only surface once a conversation is running.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("unknown script location `{0}`")]
    UnknownLocation(String),
    #[error("location `{0}` binds a template property but none is set in the dialogue state")]
    MissingTemplateProperty(String),
    #[error("expanding intent `{intent}` targets field `{field}` with no enumeration or examples")]
    NothingToExpand { intent: String, field: String },
    #[error("template render failed: {0}")]
    Template(#[from] tera::Error),
}
