//! Error types.

use thiserror::Error;

/// Errors raised by the simulation engine.
///
/// Configuration errors are reported by the call that received the bad input.
/// Geometry errors indicate a vehicle or lane reference that does not exist in
/// the road network; they end the current episode, after which the simulation
/// must be reset.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("reward weight `{name}` is a cost and must be non-positive, got {value}")]
    PositiveCostWeight { name: &'static str, value: f64 },

    #[error("expected one action per controlled vehicle ({expected}), got {got}")]
    ActionCountMismatch { expected: usize, got: usize },

    #[error("action index {0} is outside the action space")]
    InvalidAction(usize),

    #[error("lane {0} does not exist in the road network")]
    UnknownLane(String),

    #[error("node `{0}` does not exist in the road network")]
    UnknownNode(String),

    #[error("vehicle is not on the road")]
    UnknownVehicle,

    #[error("the road network has no lanes")]
    EmptyNetwork,

    #[error("could not place a background vehicle after {0} attempts")]
    Placement(usize),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("the simulation must be reset before stepping")]
    NotReset,
}

/// Shorthand result type for the simulation engine.
pub type SimResult<T> = Result<T, SimError>;

/// Errors raised while exporting episode logs.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}

/// Alias for `Result<T, OutputError>`.
pub type OutputResult<T> = Result<T, OutputError>;
