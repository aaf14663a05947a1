use thiserror::Error;

/// Errors surfaced by the library to the timer and the converter.
#[derive(Debug, Error)]
pub enum CubeError {
    /// The csTimer export is missing a key or has the wrong shape.
    #[error("import format error: {0}")]
    ImportFormat(String),

    /// A solve was handed to the engine out of sequence.
    #[error("solve #{got} applied out of order (expected #{expected})")]
    OrderingViolation { expected: usize, got: usize },

    #[error("Invalid solve number: {0}")]
    InvalidSolveNumber(String),

    #[error("session \"{0}\" already exists")]
    DuplicateSession(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl CubeError {
    pub fn import(msg: impl Into<String>) -> Self {
        CubeError::ImportFormat(msg.into())
    }
}

pub type Result<T, E = CubeError> = std::result::Result<T, E>;
