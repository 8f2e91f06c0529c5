use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForecastError {
    #[error("No periods available")]
    NoPeriodsAvailable,

    #[error("Expected {expected} percentages, got {got}")]
    PercentageCountMismatch { expected: usize, got: usize },

    #[error("Percentages must sum to 100%, got {0}%")]
    PercentageSumInvalid(f64),

    #[error("Budget fully consumed")]
    BudgetFullyConsumed,

    #[error("No remaining periods")]
    NoRemainingPeriods,

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Mapping template not found: {0}")]
    TemplateNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
