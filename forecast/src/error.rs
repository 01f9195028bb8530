use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("insufficient data: need at least {required} values, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("index {index} is outside the defined range {first}..{len}")]
    OutOfRange {
        index: usize,
        first: usize,
        len: usize,
    },

    #[error("no period detected in the series")]
    NoPeriod,

    #[error("invalid period {0}: must be at least 2")]
    InvalidPeriod(usize),

    #[error("input contains a non-finite value at index {0}")]
    NonFinite(usize),

    #[error("models cover different inputs: {left} vs {right} values")]
    LengthMismatch { left: usize, right: usize },

    #[error("unknown forecast algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("confidence level must be in (0, 100), got {0}")]
    InvalidConfidence(f64),

    #[error("forecast horizon {requested} exceeds the limit of {max}")]
    HorizonTooLong { requested: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, ForecastError>;
