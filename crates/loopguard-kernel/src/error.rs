//! Error types for the loopguard kernel
//!
//! Nothing in the guard stack panics across its public boundary. Guard
//! outcomes travel in [`crate::types::GuardedUpdateResult`]; the types here
//! cover the two places a real failure can originate: the wrapped setter and
//! diagnostic serialization.

/// Failure reported by a wrapped state setter.
///
/// Setters surface failure through `Result`; the guard converts any error
/// into a failed [`crate::types::GuardedUpdateResult`] and never re-throws.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SetterError {
    /// The setter rejected the value
    #[error("setter rejected value: {0}")]
    Rejected(String),

    /// The setter's target is gone (component torn down)
    #[error("setter target unavailable: {0}")]
    TargetUnavailable(String),

    /// Any other setter failure
    #[error("setter failed: {0}")]
    Other(String),
}

impl SetterError {
    /// Wrap an arbitrary error message
    #[inline]
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Diagnostics subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum DiagnosticsError {
    /// Export serialization failed
    #[error("diagnostic export serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setter_error_display() {
        let err = SetterError::Rejected("out of range".to_string());
        assert!(err.to_string().contains("rejected"));

        let err = SetterError::other("boom");
        assert!(err.to_string().contains("boom"));
    }
}
