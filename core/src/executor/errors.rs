//! Runtime error taxonomy
//!
//! `RuntimeError` is what expression evaluation and database calls raise.
//! `ExecError` is the same failure after the statement executor has tagged
//! it with the position of the statement that raised it.

use crate::db::DbError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("unbound name '{0}'")]
    UnboundName(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("{0} is not callable")]
    NotCallable(String),

    #[error("cannot iterate over a value of type {0}")]
    NotIterable(String),

    #[error("no {entity} record matches {criteria}")]
    NotFound { entity: String, criteria: String },

    #[error("invalid argument to {func}: {message}")]
    InvalidArgument { func: String, message: String },

    #[error("division by zero")]
    DivisionByZero,
}

impl RuntimeError {
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch(message.into())
    }

    pub fn invalid_argument(func: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeError::InvalidArgument {
            func: func.into(),
            message: message.into(),
        }
    }
}

impl From<DbError> for RuntimeError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, criteria } => RuntimeError::NotFound { entity, criteria },
        }
    }
}

/// A runtime failure located at a statement
///
/// `path` holds one index per nesting level: `[2, 0]` is the first statement
/// inside the body of top-level statement 2.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("statement {} ({statement}): {source}", format_path(.path))]
pub struct ExecError {
    pub path: Vec<usize>,
    pub statement: String,
    #[source]
    pub source: RuntimeError,
}

impl ExecError {
    pub fn new(index: usize, statement: impl Into<String>, source: RuntimeError) -> Self {
        Self {
            path: vec![index],
            statement: statement.into(),
            source,
        }
    }

    /// Record the index of the enclosing statement
    pub fn nested_in(mut self, index: usize) -> Self {
        self.path.insert(0, index);
        self
    }

    pub fn kind(&self) -> &RuntimeError {
        &self.source
    }
}

fn format_path(path: &[usize]) -> String {
    path.iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
