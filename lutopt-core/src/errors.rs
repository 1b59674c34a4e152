use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug)]
pub enum LutoptError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Shape mismatch for `{field}`. Expected {expected:?}, got {actual:?}")]
    DataShape {
        field: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("Solver finished with status {status}. Active constraint families: [{}]", active_families.join(", "))]
    Infeasible {
        status: String,
        active_families: Vec<String>,
    },
    #[error("Contract violation: {0}")]
    ContractViolation(String),
    #[error("Invalid solver state: {0}")]
    InvalidState(String),
    #[error("Solve engine failed: {0}")]
    Solver(String),
}

impl LutoptError {
    pub(crate) fn shape(field: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        LutoptError::DataShape {
            field: field.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

/// Convenience type for `Result<T, LutoptError>`.
pub type LutoptResult<T> = Result<T, LutoptError>;
