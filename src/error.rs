use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("manifest CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("malformed content stream: {0}")]
    MalformedContent(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("invalid category config: {0}")]
    InvalidConfig(String),

    #[error("input ended before a target was selected")]
    NoTargetSelected,
}
