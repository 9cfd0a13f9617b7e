//! Error types for monodelta.

use thiserror::Error;

/// Errors produced by monodelta
#[derive(Error, Debug)]
pub enum DeltaError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The store refused a new series
    #[error("Previous-value store full: cannot track more than {limit} series")]
    StoreFull {
        /// Configured series bound
        limit: usize,
    },

    /// A data point could not be used
    #[error("Invalid data point: {0}")]
    InvalidPoint(String),

    /// Malformed OTLP input
    #[error("OTEL protocol error: {0}")]
    Protocol(String),

    /// Filesystem or socket failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// tonic server failure
    #[error("GRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Downstream channel closed
    #[error("Channel send error")]
    ChannelSend,
}

/// Result type alias for monodelta operations
pub type Result<T> = std::result::Result<T, DeltaError>;

impl DeltaError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new invalid point error
    pub fn invalid_point<S: Into<String>>(msg: S) -> Self {
        Self::InvalidPoint(msg.into())
    }

    /// Creates a new protocol error
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::Protocol(msg.into())
    }

    /// Returns true if the caller may retry the operation
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ChannelSend | Self::Transport(_))
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::StoreFull { .. } => "resource",
            Self::InvalidPoint(_) => "validation",
            Self::Protocol(_) => "protocol",
            Self::Io(_) => "io",
            Self::Transport(_) => "network",
            Self::ChannelSend => "channel",
        }
    }
}

impl From<DeltaError> for tonic::Status {
    fn from(err: DeltaError) -> Self {
        let message = err.to_string();
        match err {
            DeltaError::InvalidPoint(_) | DeltaError::Protocol(_) => {
                tonic::Status::invalid_argument(message)
            },
            DeltaError::StoreFull { .. } => tonic::Status::resource_exhausted(message),
            e if e.is_recoverable() => tonic::Status::unavailable(message),
            _ => tonic::Status::internal(message),
        }
    }
}
