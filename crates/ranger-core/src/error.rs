// Error types for audit capture and validated agent invocation

use thiserror::Error;

/// Result type alias for RANGER core operations
pub type Result<T> = std::result::Result<T, RangerError>;

/// Errors that can occur while invoking agents or configuring the audit layer
///
/// Tool failures are not represented here: they are absorbed by the error
/// hook and turned into a graceful tool response. Only invocation-level
/// failures surface as `RangerError`.
#[derive(Debug, Error)]
pub enum RangerError {
    /// The agent runtime failed to run the query (transport, framework bug)
    #[error("Agent invocation error: {0}")]
    AgentInvocation(String),

    /// The agent's response stream reported an error
    #[error("Agent stream error: {0}")]
    Stream(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RangerError {
    /// Create an agent invocation error
    pub fn invocation(msg: impl Into<String>) -> Self {
        RangerError::AgentInvocation(msg.into())
    }

    /// Create a stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        RangerError::Stream(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        RangerError::Configuration(msg.into())
    }

    /// Short name of the error kind, used in escalation reasons and logs
    pub fn kind(&self) -> &'static str {
        match self {
            RangerError::AgentInvocation(_) => "AgentInvocation",
            RangerError::Stream(_) => "Stream",
            RangerError::Configuration(_) => "Configuration",
            RangerError::Internal(_) => "Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_names() {
        assert_eq!(RangerError::invocation("boom").kind(), "AgentInvocation");
        assert_eq!(RangerError::stream("eof").kind(), "Stream");
        assert_eq!(RangerError::config("bad").kind(), "Configuration");
        assert_eq!(RangerError::from(anyhow::anyhow!("oops")).kind(), "Internal");
    }

    #[test]
    fn test_error_display() {
        let err = RangerError::invocation("connection reset");
        assert_eq!(err.to_string(), "Agent invocation error: connection reset");
    }
}
