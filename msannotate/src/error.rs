use thiserror::Error;

/// Errors raised while building, processing or annotating spectra.
///
/// Every variant names the offending value so callers can report it without
/// re-deriving what went wrong.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectrumError {
    /// Raw data that cannot form a valid peak list or spectrum.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A processing or annotation parameter outside its valid domain.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown residue '{residue}' at position {position}")]
    UnknownResidue { residue: char, position: usize },

    #[error("unparsable structure '{input}' at offset {offset}: {reason}")]
    UnparsableStructure {
        input: String,
        offset: usize,
        reason: String,
    },

    /// Two configuration inputs contradict each other.
    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),

    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, SpectrumError>;

impl From<rayon::ThreadPoolBuildError> for SpectrumError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        SpectrumError::ThreadPool(err.to_string())
    }
}
