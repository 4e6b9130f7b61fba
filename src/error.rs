use thiserror::Error;

/// Fatal error kinds. A run either produces a complete descriptor and all
/// buffer artifacts or it aborts with one of these; there is no partial
/// output mode.
#[derive(Debug, Error)]
pub enum Error {
    #[error("expected a {expected} file, got {path}")]
    FormatMismatch { expected: String, path: String },

    #[error("column '{name}' not found in source schema")]
    MissingColumn { name: String },

    #[error("invalid bounds: [[{xmin}, {xmax}], [{ymin}, {ymax}]]")]
    DegenerateBounds {
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
    },

    #[error("unknown projection '{name}'")]
    UnknownProjection { name: String },

    #[error("failed to parse '{value}' as number in column '{column}' at row {row}")]
    BadNumber {
        value: String,
        column: String,
        row: usize,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
