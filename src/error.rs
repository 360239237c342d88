use thiserror::Error;

#[derive(Debug, Error)]
pub enum JacobiError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Allocation failure: {0}")]
    Allocation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Out of range: x = {x} is outside [{lower}, {upper}]")]
    OutOfRange { x: f64, lower: f64, upper: f64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JacobiError>;
