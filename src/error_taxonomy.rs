//! Error envelope the bridge answers with.

use crate::actions::ActionError;

/// Broad category for typed error handling and policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Backend,
    InvalidInput,
    NotFound,
    Internal,
}

/// Severity hint for UI and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Warning,
    Error,
}

/// Unified envelope used when crossing subsystem boundaries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEnvelope {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub recoverable: bool,
    pub code: String,
    pub message: String,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn new(
        category: ErrorCategory,
        severity: ErrorSeverity,
        recoverable: bool,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            recoverable,
            code: code.into(),
            message: message.into(),
        }
    }

    /// HTTP status the bridge answers with for this envelope.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self.category {
            ErrorCategory::InvalidInput => 400,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Backend => 502,
            ErrorCategory::Internal => 500,
        }
    }
}

impl From<ActionError> for ErrorEnvelope {
    fn from(value: ActionError) -> Self {
        match value {
            ActionError::InvalidInput { message } => Self::new(
                ErrorCategory::InvalidInput,
                ErrorSeverity::Error,
                false,
                "action_invalid_input",
                message,
            ),
            ActionError::MissingField { field } => Self::new(
                ErrorCategory::InvalidInput,
                ErrorSeverity::Error,
                false,
                "action_missing_field",
                format!("Missing required parameter: {field}"),
            ),
            ActionError::NotAvailable { message } => Self::new(
                ErrorCategory::NotFound,
                ErrorSeverity::Warning,
                false,
                "action_not_available",
                message,
            ),
            ActionError::ExecutionFailed { message } => Self::new(
                ErrorCategory::Backend,
                ErrorSeverity::Error,
                true,
                "action_execution_failed",
                message,
            ),
        }
    }
}
