//! Error handling for the toolkit.
//!
//! This module provides:
//! - A single crate error, [`ToolkitError`], carrying a machine-readable code
//! - [`StoreError`], the failure type every collaborator store reports
//! - HTTP status mapping and an axum `IntoResponse` implementation
//! - Severity-aware logging and an error counter
//!
//! # Usage
//!
//! ```rust,ignore
//! use api_toolkit::error::{ToolkitError, Result};
//!
//! fn check_page(page: u64) -> Result<()> {
//!     if page == 0 {
//!         return Err(ToolkitError::invalid_argument("page must be at least 1"));
//!     }
//!     Ok(())
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for toolkit operations.
pub type Result<T> = std::result::Result<T, ToolkitError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed arguments, e.g. a zero page size.
    InvalidArgument,
    /// Generic store failure.
    StoreError,
    /// The store could not be reached.
    StoreUnavailable,
    /// The store rejected a write (unique key, foreign key, ...).
    ConstraintViolation,
    /// The caller cancelled the operation.
    Cancelled,
    NotFound,
    Forbidden,
    /// Startup configuration is inconsistent (policy collisions, bootstrap failures).
    ConfigurationError,
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::InvalidArgument => 1000,
            Self::NotFound => 1001,

            Self::StoreError => 2000,
            Self::StoreUnavailable => 2001,
            Self::ConstraintViolation => 2002,
            Self::Cancelled => 2003,

            Self::Forbidden => 3000,

            Self::ConfigurationError => 4000,
            Self::InternalError => 5000,
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ConstraintViolation => StatusCode::CONFLICT,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            // 499 is not a registered code; report cancellations as timeouts.
            Self::Cancelled => StatusCode::REQUEST_TIMEOUT,
            Self::StoreError | Self::ConfigurationError | Self::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether a caller may reasonably retry the operation.
    ///
    /// The toolkit itself never retries.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable)
    }

    /// Category name used in logs and metrics.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument | Self::NotFound => "request",
            Self::StoreError
            | Self::StoreUnavailable
            | Self::ConstraintViolation
            | Self::Cancelled => "store",
            Self::Forbidden => "authorization",
            Self::ConfigurationError => "configuration",
            Self::InternalError => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors (bad input, denied access)
    Low,
    /// Operational issues (cancellation, contention)
    Medium,
    /// Store and configuration failures
    High,
    /// Failures that indicate a bug
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::InvalidArgument | ErrorCode::NotFound | ErrorCode::Forbidden => Self::Low,
            ErrorCode::Cancelled | ErrorCode::ConstraintViolation => Self::Medium,
            ErrorCode::StoreError | ErrorCode::StoreUnavailable | ErrorCode::ConfigurationError => {
                Self::High
            }
            ErrorCode::InternalError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store Error
// ═══════════════════════════════════════════════════════════════════════════════

/// Failure reported by a persistence or identity collaborator.
///
/// The toolkit never inspects or retries these; they reach the caller as the
/// source of a [`ToolkitError`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl StoreError {
    /// Wrap an arbitrary backend error.
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(error))
    }

    /// The toolkit error code this failure maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable(_) => ErrorCode::StoreUnavailable,
            Self::Constraint(_) => ErrorCode::ConstraintViolation,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Backend(_) => ErrorCode::StoreError,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for the toolkit.
///
/// Carries a stable [`ErrorCode`], a message that is safe to show to clients,
/// an optional internal message for logs, and the underlying source error.
#[derive(Error, Debug)]
pub struct ToolkitError {
    code: ErrorCode,

    user_message: Cow<'static, str>,

    internal_message: Option<String>,

    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for ToolkitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl ToolkitError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    pub fn invalid_argument(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn not_found(entity_type: impl fmt::Display, entity_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("{} not found: {}", entity_type, entity_id),
        )
    }

    pub fn forbidden(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, message.into())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Attach a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    /// The collaborator failure this error was raised from, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        self.source
            .as_ref()
            .and_then(|source| source.downcast_ref::<StoreError>())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    source = ?self.source,
                    "Toolkit error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Toolkit error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Toolkit error"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "toolkit_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category(),
            "severity" => format!("{:?}", self.severity()),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Conversions
// ═══════════════════════════════════════════════════════════════════════════════

impl From<StoreError> for ToolkitError {
    fn from(err: StoreError) -> Self {
        let code = err.code();
        let user_message = match code {
            ErrorCode::StoreUnavailable => "The data store is unavailable",
            ErrorCode::ConstraintViolation => "The change conflicts with existing data",
            ErrorCode::Cancelled => "The operation was cancelled",
            _ => "A data store error occurred",
        };
        Self::with_internal(code, user_message, err.to_string()).with_source(err)
    }
}

impl From<config::ConfigError> for ToolkitError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_internal(
            ErrorCode::ConfigurationError,
            "Configuration error",
            err.to_string(),
        )
        .with_source(err)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error body returned to HTTP clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false for errors
    pub success: bool,

    pub error: ErrorInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,

    pub numeric_code: u32,

    pub message: String,

    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&ToolkitError> for ErrorResponse {
    fn from(error: &ToolkitError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

impl IntoResponse for ToolkitError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
