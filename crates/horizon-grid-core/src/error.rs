//! Error types for Horizon Grid core.

/// Errors that can occur with the async runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsyncRuntimeError {
    /// Failed to build the runtime.
    #[error("Failed to create async runtime: {0}")]
    CreationFailed(String),
    /// No Tokio runtime is running on the current thread.
    #[error("No Tokio runtime is running on the current thread")]
    NoCurrentRuntime,
}

/// A specialized Result type for core operations.
pub type Result<T> = std::result::Result<T, AsyncRuntimeError>;
