//! Errors raised while obtaining policy decisions.

use weir_core::ErrorClass;

/// Every policy failure is transient: a pass that cannot obtain decisions
/// is retried, never turned into a deny.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PolicyError {
    #[error("policy engine '{engine}' unavailable: {message}")]
    Unavailable { engine: String, message: String },

    #[error("policy engine '{0}' timed out")]
    Timeout(String),

    #[error("policy engine '{engine}' returned an invalid response: {message}")]
    InvalidResponse { engine: String, message: String },
}

impl PolicyError {
    pub fn unavailable(engine: impl Into<String>, message: impl Into<String>) -> Self {
        PolicyError::Unavailable {
            engine: engine.into(),
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        ErrorClass::Transient
    }
}
