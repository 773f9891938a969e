// Error taxonomy for the prediction path
// Credential outcomes are plain values (see credentials.rs), not errors.

use thiserror::Error;

/// Errors raised between raw form input and a rendered verdict.
///
/// `InvalidInput` and `NonPositiveNumeric` are user-input errors: the
/// surface renders them inline and the session carries on. `SchemaMismatch`
/// and `UnexpectedLabel` are contract violations between the encoder and the
/// model artifact; they abort the single request only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("Invalid value '{value}' for {field}")]
    InvalidInput { field: &'static str, value: String },

    #[error("{label} must be greater than zero.")]
    NonPositiveNumeric {
        field: &'static str,
        label: &'static str,
        value: f64,
    },

    #[error("Model expects column '{column}' which the encoder does not produce")]
    SchemaMismatch { column: String },

    #[error("Model returned unexpected label {0}")]
    UnexpectedLabel(i64),

    #[error("Model failure: {0}")]
    Model(#[from] ModelError),
}

impl PredictionError {
    /// True for errors caused by what the user typed.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            PredictionError::InvalidInput { .. } | PredictionError::NonPositiveNumeric { .. }
        )
    }
}

/// Errors raised by a `Classifier` implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("Row column {position} is '{found}', model expects '{expected}'")]
    SchemaMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Row has {found} columns, model expects {expected}")]
    WidthMismatch { expected: usize, found: usize },
}

pub type PredictionResult<T> = Result<T, PredictionError>;
