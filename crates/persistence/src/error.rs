//! Error types for the persistence layer.
//!
//! Errors are split by concern: link resolution, persistence mappings and backends.
//! Metadata errors raised while looking up an operation are carried unchanged.

use thiserror::Error;
use trellis_metadata::MetadataError;

/// The primary error type for all persistence operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Link resolution errors
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Mapping errors
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Metadata resolution errors
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Errors raised while translating links into query predicates.
///
/// These are never recovered from: a wrong link would scope the query to the wrong
/// object graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// A relation link involves a composite identifier on either side.
    #[error(
        "Composite identifiers on a relation can not be handled automatically, implement your own query."
    )]
    CompositeIdentifier,

    /// No link connects the link class and the resource class.
    #[error("The class \"{resource_class}\" cannot be retrieved from \"{link_class}\".")]
    CannotBeRetrieved {
        resource_class: String,
        link_class: String,
    },

    /// The captured identifiers do not match what the links consume.
    #[error("expected {expected} identifier(s), got {actual}")]
    IdentifierCountMismatch { expected: usize, actual: usize },

    /// A captured identifier cannot be converted to the declared field type.
    #[error("invalid value '{value}' for identifier '{parameter}': expected {expected}")]
    InvalidIdentifier {
        parameter: String,
        value: String,
        expected: String,
    },

    /// The link names an association the mapping does not declare.
    #[error("unknown association '{property}' on class '{class}'")]
    UnknownAssociation { class: String, property: String },

    /// A same-class link targets a class that is not part of the current join chain.
    #[error("link on class '{class}' is not reachable from the current join chain")]
    UnreachableLink { class: String },
}

/// Errors related to persistence mappings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// No mapping is registered for the class.
    #[error("class not mapped: {class}")]
    ClassNotMapped { class: String },

    /// A mapping is already registered for the class.
    #[error("class already mapped: {class}")]
    DuplicateClass { class: String },

    /// The class has no such field.
    #[error("unknown field '{field}' on class '{class}'")]
    UnknownField { class: String, field: String },

    /// An alias used by a query is not bound to any class.
    #[error("unknown alias: {alias}")]
    UnknownAlias { alias: String },

    /// The mapping is structurally invalid.
    #[error("invalid mapping for '{class}': {message}")]
    InvalidMapping { class: String, message: String },

    /// A mapping file could not be read or parsed.
    #[error("failed to load mappings from '{path}': {message}")]
    LoadFailed { path: String, message: String },
}

/// Backend-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// A query was rejected or failed while running.
    #[error("query failed on {backend_name}: {message}")]
    QueryFailed {
        backend_name: String,
        message: String,
    },

    /// The backend cannot express the requested construct.
    #[error("'{capability}' not supported by {backend_name}")]
    Unsupported {
        backend_name: String,
        capability: String,
    },
}

impl BackendError {
    pub(crate) fn query_failed(backend_name: &str, message: impl Into<String>) -> Self {
        BackendError::QueryFailed {
            backend_name: backend_name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(backend_name: &str, capability: impl Into<String>) -> Self {
        BackendError::Unsupported {
            backend_name: backend_name.to_string(),
            capability: capability.into(),
        }
    }
}

/// Result type for persistence operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_messages() {
        let err = LinkError::CannotBeRetrieved {
            resource_class: "App\\Entity\\Employee".to_string(),
            link_class: "App\\Entity\\Dummy".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "The class \"App\\Entity\\Employee\" cannot be retrieved from \"App\\Entity\\Dummy\"."
        );
        assert_eq!(
            LinkError::CompositeIdentifier.to_string(),
            "Composite identifiers on a relation can not be handled automatically, implement your own query."
        );
    }

    #[test]
    fn test_storage_error_is_transparent() {
        let err: StorageError = MappingError::ClassNotMapped {
            class: "Company".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "class not mapped: Company");

        let err: StorageError = MetadataError::not_supported("Company").into();
        assert!(matches!(err, StorageError::Metadata(_)));
    }
}
