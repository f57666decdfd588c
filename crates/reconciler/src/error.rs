//! Error types for reconciliation.
//!
//! Errors are categorized so callers can render actionable messages. Every
//! variant carries the resource kind and, where one exists, the identifier
//! and attribute involved.

use crate::types::ResourceKind;
use thiserror::Error;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Desired attributes are missing or malformed
    Validation,
    /// A referenced principal or object does not exist
    Precondition,
    /// The server rejected a statement
    Remote,
    /// The change needs delete + create
    Irreplaceable,
    /// A multi-statement sequence stopped part way
    PartiallyApplied,
    /// The object to import does not exist
    NotFound,
    /// The kind does not support the operation
    Unsupported,
    /// Failure inside the engine itself
    Internal,
}

impl ErrorCategory {
    /// DDL failures are deterministic; nothing here is worth retrying blindly.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Short summary used as the diagnostic headline
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid resource attributes",
            Self::Precondition => "Precondition failed",
            Self::Remote => "Server rejected statement",
            Self::Irreplaceable => "Attribute cannot be updated in place",
            Self::PartiallyApplied => "Change partially applied",
            Self::NotFound => "Resource not found",
            Self::Unsupported => "Operation not supported",
            Self::Internal => "Internal error",
        }
    }

    /// Actionable advice for resolving this error category
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the attribute in the manifest and try again",
            Self::Precondition => "Create the referenced principal first, or remove the reference",
            Self::Remote => "Check the server message; the statement will not be retried",
            Self::Irreplaceable => "Delete and recreate the resource to change this attribute",
            Self::PartiallyApplied => {
                "The object exists on the server; import it and run apply again rather than recreating it"
            }
            Self::NotFound => "Verify the identifier and the database it lives in",
            Self::Unsupported => "This resource kind is read-only",
            Self::Internal => "Check the error details for more information",
        }
    }
}

/// Errors raised by a lifecycle call.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing, unknown or malformed desired attribute
    #[error("invalid {kind} attribute '{attribute}': {message}")]
    Validation {
        kind: ResourceKind,
        attribute: String,
        message: String,
    },

    /// A referenced principal does not exist on the server
    #[error("{kind} '{identifier}': {message}")]
    Precondition {
        kind: ResourceKind,
        identifier: String,
        attribute: String,
        message: String,
    },

    /// Statement rejected by the server; message is passed through verbatim
    #[error("{message}")]
    Remote {
        kind: ResourceKind,
        identifier: String,
        message: String,
    },

    /// Update attempted on an attribute that has no in-place or rename path
    #[error(
        "{kind} '{identifier}': attribute '{attribute}' cannot be changed in place; delete and recreate the resource"
    )]
    IrreplaceableAttribute {
        kind: ResourceKind,
        identifier: String,
        attribute: String,
    },

    /// The primary statement succeeded but a later one in the sequence failed
    #[error("{kind} '{identifier}' was {applied} but '{step}' failed: {message}")]
    PartiallyApplied {
        kind: ResourceKind,
        identifier: String,
        applied: &'static str,
        step: &'static str,
        message: String,
    },

    /// Import target does not exist
    #[error("{kind} '{identifier}' does not exist on the server")]
    NotFound {
        kind: ResourceKind,
        identifier: String,
    },

    /// Lifecycle operation not available for this kind
    #[error("{kind} does not support {operation}")]
    Unsupported {
        kind: ResourceKind,
        operation: &'static str,
    },

    /// Worker pool could not be created
    #[error("failed to create apply thread pool: {0}")]
    WorkerPool(String),

    /// The confirmation prompt could not be shown or read
    #[error("confirmation failed: {0}")]
    Confirm(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn validation(
        kind: ResourceKind,
        attribute: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            kind,
            attribute: attribute.to_string(),
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Precondition { .. } => ErrorCategory::Precondition,
            Self::Remote { .. } => ErrorCategory::Remote,
            Self::IrreplaceableAttribute { .. } => ErrorCategory::Irreplaceable,
            Self::PartiallyApplied { .. } => ErrorCategory::PartiallyApplied,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Unsupported { .. } => ErrorCategory::Unsupported,
            Self::WorkerPool(_) | Self::Confirm(_) => ErrorCategory::Internal,
        }
    }

    /// Resource kind the error belongs to, if any
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            Self::Validation { kind, .. }
            | Self::Precondition { kind, .. }
            | Self::Remote { kind, .. }
            | Self::IrreplaceableAttribute { kind, .. }
            | Self::PartiallyApplied { kind, .. }
            | Self::NotFound { kind, .. }
            | Self::Unsupported { kind, .. } => Some(*kind),
            Self::WorkerPool(_) | Self::Confirm(_) => None,
        }
    }

    /// Identifier of the resource instance, when known
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Precondition { identifier, .. }
            | Self::Remote { identifier, .. }
            | Self::IrreplaceableAttribute { identifier, .. }
            | Self::PartiallyApplied { identifier, .. }
            | Self::NotFound { identifier, .. } => Some(identifier),
            _ => None,
        }
    }

    /// Attribute the error is about, when there is one
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::Validation { attribute, .. }
            | Self::Precondition { attribute, .. }
            | Self::IrreplaceableAttribute { attribute, .. } => Some(attribute),
            _ => None,
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_is_retryable() {
        let err = Error::Remote {
            kind: ResourceKind::Login,
            identifier: "app".into(),
            message: "Cannot drop the login 'app', because it does not exist".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Remote);
        assert!(!err.category().is_retryable());
    }

    #[test]
    fn test_remote_message_is_verbatim() {
        let err = Error::Remote {
            kind: ResourceKind::Database,
            identifier: "app".into(),
            message: "Database 'app' already exists.".into(),
        };
        assert_eq!(err.to_string(), "Database 'app' already exists.");
    }

    #[test]
    fn test_partial_message_says_object_exists() {
        let err = Error::PartiallyApplied {
            kind: ResourceKind::Database,
            identifier: "app".into(),
            applied: "created",
            step: "set owner",
            message: "Cannot find the principal 'x'".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("was created"));
        assert!(msg.contains("set owner"));
    }

    #[test]
    fn test_context_accessors() {
        let err = Error::IrreplaceableAttribute {
            kind: ResourceKind::User,
            identifier: "app.bob".into(),
            attribute: "login".into(),
        };
        assert_eq!(err.kind(), Some(ResourceKind::User));
        assert_eq!(err.identifier(), Some("app.bob"));
        assert_eq!(err.attribute(), Some("login"));
    }
}
