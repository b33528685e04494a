// crates/trafikk-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Input discovery failed: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Station metadata table unusable ({path}): {message}")]
    StationTable { path: String, message: String },

    #[error("no valid observations remained after validation")]
    NoValidObservations,

    #[error("failed to publish artifact '{artifact}': {message}")]
    Publish { artifact: String, message: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
