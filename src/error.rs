use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EkfError {
    /// Innovation covariance could not be inverted even after regularization.
    #[error("innovation covariance still singular after {retries} regularization retries (epsilon {epsilon:e})")]
    NumericalInstability { retries: u32, epsilon: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, EkfError>;
