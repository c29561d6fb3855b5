//! Error types and result types for document store operations.
//!
//! Every fallible operation in the store returns [`DocumentStoreResult<T>`]. Errors are
//! raised to the immediate caller, never retried, and never leave a partial write behind.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentStoreError {
    /// A write carried an `__op` tag the update engine does not know.
    /// The first argument is the field name, the second the offending tag.
    #[error("Unknown update operator {1} on field {0}")]
    UnknownOperator(String, String),
    /// An array-only operator (`Add`, `AddUnique`, `Remove`) targeted a field
    /// holding a non-array value.
    #[error("Can't perform array operation on non-array field {0}")]
    NotAnArray(String),
    /// An operand or stored value had an incompatible type (e.g. `Increment` on a string).
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// A before-hook or cloud function rejected the request. Carries its message verbatim.
    #[error("{0}")]
    HookRejected(String),
    /// The where-clause or include list has a shape the query compiler refuses.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Coarse classification of a [`DocumentStoreError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownOperator,
    NotAnArray,
    TypeMismatch,
    HookRejected,
    InvalidQuery,
    DocumentAlreadyExists,
    Serialization,
    Backend,
}

impl DocumentStoreError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocumentStoreError::UnknownOperator(..) => ErrorKind::UnknownOperator,
            DocumentStoreError::NotAnArray(_) => ErrorKind::NotAnArray,
            DocumentStoreError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            DocumentStoreError::HookRejected(_) => ErrorKind::HookRejected,
            DocumentStoreError::InvalidQuery(_) => ErrorKind::InvalidQuery,
            DocumentStoreError::DocumentAlreadyExists(..) => ErrorKind::DocumentAlreadyExists,
            DocumentStoreError::Serialization(_) => ErrorKind::Serialization,
            DocumentStoreError::Backend(_) => ErrorKind::Backend,
        }
    }

    pub(crate) fn invalid_query(message: impl Into<String>) -> Self {
        DocumentStoreError::InvalidQuery(message.into())
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_rejection_message_is_verbatim() {
        let err = DocumentStoreError::HookRejected("price must be positive".to_string());

        assert_eq!(err.to_string(), "price must be positive");
        assert_eq!(err.kind(), ErrorKind::HookRejected);
    }

    #[test]
    fn unknown_operator_names_the_field() {
        let err = DocumentStoreError::UnknownOperator("score".to_string(), "Multiply".to_string());

        assert!(err.to_string().contains("score"));
        assert!(err.to_string().contains("Multiply"));
    }
}
