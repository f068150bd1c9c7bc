use thiserror::Error;

/// Failures of the consensus pipeline.
///
/// A rubric that scores below its threshold is not an error: it is reported
/// through [`crate::RubricResult::passed`] and drives refinement instead.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// Bad input such as out-of-range coordinates.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Fewer providers survived than fusion needs.
    #[error("Only {available} weather source(s) returned data; at least {required} are required")]
    InsufficientSources { available: usize, required: usize },

    /// A provider or the text generator could not be reached.
    #[error("{party} is unreachable: {message}")]
    Transport { party: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConsensusError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn transport<P: Into<String>, M: Into<String>>(party: P, message: M) -> Self {
        Self::Transport { party: party.into(), message: message.into() }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }
}
