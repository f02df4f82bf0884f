/// Errors raised by the optimal filter core.
///
/// Every variant is raised at the point of detection; nothing is retried internally and a failed
/// fit never yields a partial result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OfError {
    /// Malformed or mismatched template / PSD / signal inputs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unknown template tag or a missing prerequisite (kernel, PSD, signal projection).
    #[error("not found: {0}")]
    NotFound(String),

    /// Empty or out-of-range delay search window.
    #[error("window error: {0}")]
    Window(String),

    /// Shape mismatch in multi-template fits.
    #[error("dimension error: {0}")]
    Dimension(String),

    /// Invalid enumerated or scalar argument (e.g. a direction constraint outside {-1, 0, 1}).
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Singular or numerically degenerate linear system.
    #[error("singular system: {0}")]
    Singular(String),
}

impl OfError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn window(message: impl Into<String>) -> Self {
        Self::Window(message.into())
    }

    pub fn dimension(message: impl Into<String>) -> Self {
        Self::Dimension(message.into())
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    pub fn singular(message: impl Into<String>) -> Self {
        Self::Singular(message.into())
    }
}

pub type Result<T> = std::result::Result<T, OfError>;
