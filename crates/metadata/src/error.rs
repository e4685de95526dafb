//! Error types for metadata resolution.
//!
//! Every error in this module is raised while metadata is compiled (at boot or on the
//! first lookup of a class), never while a request is being served.

use thiserror::Error;

/// Errors raised while loading or resolving resource metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// No metadata source knows the class.
    #[error("resource class not supported: {class}")]
    ResourceClassNotSupported { class: String },

    /// The declared metadata is malformed.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The resource has no operation with the requested name.
    #[error("operation \"{operation}\" not found for resource class \"{class}\"")]
    OperationNotFound { class: String, operation: String },

    /// Two operations of the same resource share a name.
    #[error("duplicate operation name \"{name}\" on resource class \"{class}\"")]
    DuplicateOperation { class: String, name: String },

    /// A configuration file could not be read or parsed.
    #[error("failed to load metadata from '{path}': {message}")]
    ConfigLoadFailed { path: String, message: String },
}

impl MetadataError {
    /// Shorthand for [`MetadataError::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        MetadataError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Shorthand for [`MetadataError::ResourceClassNotSupported`].
    pub fn not_supported(class: impl Into<String>) -> Self {
        MetadataError::ResourceClassNotSupported {
            class: class.into(),
        }
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;
