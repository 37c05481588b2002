use crate::fetcher::Phase;
use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for configuration and validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "API_RATE_MAX", "endpoint")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "fetcher_builder")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the fetcher.
///
/// Every variant is a distinct outcome the caller can match on. Upstream
/// throttling (`429`) has no variant: it is always waited out, and only shows
/// up as [`Error::Cancelled`] when the caller gives up during the wait.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Credential missing: environment variable {var} is not set")]
    CredentialMissing { var: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error after {attempts} attempt(s)")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Upstream error: HTTP {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    #[error("Malformed API reply: {reason}")]
    MalformedPayload { reason: String },

    #[error("Fetch cancelled during {phase}")]
    Cancelled { phase: Phase },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn credential_missing(var: impl Into<String>) -> Self {
        Error::CredentialMissing { var: var.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Validation { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// HTTP status of an upstream rejection, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::UpstreamHttp { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Startup-time failures: the process should not keep going.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            Error::CredentialMissing { .. } | Error::Configuration { .. }
        )
    }
}
