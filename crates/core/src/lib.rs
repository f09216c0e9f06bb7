//! Shared primitives for all Rust crates in Rendezvous.

#![forbid(unsafe_code)]

/// Permission denial payloads shared across layers.
pub mod denial;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use denial::{DenialReason, PermissionDenial};

/// Result type used across Rendezvous crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A `require` check denied access.
    #[error("insufficient permissions: {0}")]
    InsufficientPermissions(Box<PermissionDenial>),

    /// The persistence collaborator failed.
    #[error("permission service error: {0}")]
    PermissionService(String),
}

impl AppError {
    /// Returns a stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::InsufficientPermissions(_) => "INSUFFICIENT_PERMISSIONS",
            Self::PermissionService(_) => "PERMISSION_SERVICE_ERROR",
        }
    }

    /// Returns the denial payload when this is a permission denial.
    #[must_use]
    pub fn denial(&self) -> Option<&PermissionDenial> {
        match self {
            Self::InsufficientPermissions(denial) => Some(denial),
            _ => None,
        }
    }
}

impl From<PermissionDenial> for AppError {
    fn from(value: PermissionDenial) -> Self {
        Self::InsufficientPermissions(Box::new(value))
    }
}
