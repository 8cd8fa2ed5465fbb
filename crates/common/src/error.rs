//! Error types shared across Framegrab crates.

/// Top-level error type for Framegrab operations.
///
/// The first four variants form the capture taxonomy: a target that went
/// away, a single failed capture, a strategy the platform cannot provide, and
/// a configuration that was rejected before anything started.
#[derive(Debug, thiserror::Error)]
pub enum FramegrabError {
    #[error("Capture target gone: {message}")]
    TargetGone { message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Platform error: {message}")]
    Platform { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using FramegrabError.
pub type FramegrabResult<T> = Result<T, FramegrabError>;

impl FramegrabError {
    pub fn target_gone(msg: impl Into<String>) -> Self {
        Self::TargetGone {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform {
            message: msg.into(),
        }
    }

    /// Whether the capture target no longer exists.
    pub fn is_target_gone(&self) -> bool {
        matches!(self, Self::TargetGone { .. })
    }

    /// Whether the caller can recover by reselecting a target or retrying.
    ///
    /// Unsupported strategies and rejected configurations are not
    /// recoverable without changing the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TargetGone { .. } | Self::Capture { .. } | Self::Platform { .. } | Self::Io(_)
        )
    }
}
