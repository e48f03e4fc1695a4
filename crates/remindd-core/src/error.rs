use thiserror::Error;

/// Errors from configuration loading and other core helpers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors from the recurrence calculator.
#[derive(Debug, Error)]
pub enum RecurrenceError {
    /// The expression does not conform to the five-field cron grammar,
    /// or it can never produce a future occurrence (e.g. `0 0 31 2 *`).
    #[error("malformed recurrence expression: {0}")]
    Malformed(String),

    /// Plugin-defined schedules are a deliberate capability restriction,
    /// not a parse failure — callers must surface this distinctly.
    #[error("unsupported recurrence type: {0}")]
    Unsupported(String),
}

/// A delivery target that matches none of the accepted grammars.
#[derive(Debug, Error)]
#[error("invalid target: {target}")]
pub struct InvalidTargetError {
    pub target: String,
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
