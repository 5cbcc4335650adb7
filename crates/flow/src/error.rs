//! Error types for flows

use appdrive_driver::DriverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Flow spec parse error: {0}")]
    SpecParse(String),

    #[error("Invalid flow '{flow}': {reason}")]
    Invalid { flow: String, reason: String },

    #[error("Flow not found: {0}")]
    NotFound(String),

    #[error("Unknown variable: ${{{0}}}")]
    UnknownVariable(String),

    #[error("Generator error: {0}")]
    Generator(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type FlowResult<T> = Result<T, FlowError>;
