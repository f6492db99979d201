use engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("xlsx: {0}")]
    Xlsx(#[from] calamine::XlsxError),
    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("pattern: {0}")]
    Pattern(#[from] regex::Error),
    /// `row` is the 1-based row, or message, number within the payload.
    #[error("row {row}: {message}")]
    Row { row: usize, message: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unknown import source \"{0}\"")]
    UnknownSource(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ImportError {
    pub(crate) fn row(row: usize, message: impl Into<String>) -> Self {
        Self::Row {
            row,
            message: message.into(),
        }
    }
}
