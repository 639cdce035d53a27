//! Compiler failure taxonomy.

use thiserror::Error;

use crate::diagnostics::{DEFAULT_ERROR_CODE, Diagnostic, DiagnosticSource, UNKNOWN_ERROR_CODE};

/// A failure thrown by the compiler itself, as opposed to diagnostics it
/// reports about the input.
///
/// Either way the program that threw cannot be trusted as a seed for the
/// next incremental pass and is discarded by the engine.
#[derive(Debug, Error)]
pub enum CompilerFailure {
    /// Carries the recognized syntax-error marker: a well known failure
    /// class. Reported message-only, no stack detail.
    #[error("{0}")]
    Syntax(String),

    /// Anything else: the compiler may be in an unknown state. Full detail
    /// is captured for the diagnostic.
    #[error("{message}")]
    Internal {
        message: String,
        detail: Option<String>,
    },
}

impl CompilerFailure {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            detail: None,
        }
    }

    pub fn internal_with_detail(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Convert into the single synthetic error diagnostic surfaced to the
    /// caller in place of a crash.
    pub fn into_diagnostic(self) -> Diagnostic {
        match self {
            Self::Syntax(message) => {
                Diagnostic::error(DEFAULT_ERROR_CODE, message, DiagnosticSource::Global)
            }
            Self::Internal { message, detail } => {
                let diag =
                    Diagnostic::error(UNKNOWN_ERROR_CODE, message, DiagnosticSource::Global);
                match detail {
                    Some(detail) => diag.with_detail(detail),
                    None => diag,
                }
            }
        }
    }
}
