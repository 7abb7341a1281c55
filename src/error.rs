use thiserror::Error;

/// Failures that abort a render.
///
/// Missing data never ends up here: unresolved references, bad literals and
/// non-sequence loop sources degrade to inline placeholders instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Datos JSON inválidos")]
    InvalidData(#[source] serde_json::Error),

    #[error("Datos JSON inválidos: the root value must be an object")]
    ContextNotObject,

    #[error("Syntax error at {line}:{column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Loop iteration limit of {0} exceeded")]
    IterationLimit(usize),
}

impl Error {
    /// True when the caller supplied bad input (maps to a 400-style answer).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Error::IterationLimit(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
