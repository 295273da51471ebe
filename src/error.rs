// Domain errors that callers (and tests) need to tell apart. Everything
// else travels as `anyhow::Error` with context attached.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("The environment variable RB_API_KEY needs to be set to a valid Rainbird API key")]
    MissingApiKey,

    /// The chosen candidate carries a number, bool or object instead of text.
    #[error("answer suggestion {index} is not a string")]
    NonTextConcept { index: usize },

    #[error("question offers no answer to choose from")]
    NoChoices,

    #[error("standard input closed before an answer was given")]
    InputClosed,

    #[error("Rainbird API error ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("engine returned neither a question nor an answer")]
    EmptyQuestion,
}
