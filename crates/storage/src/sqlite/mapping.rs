use crate::repository::StorageError;

/// Maps serialization/deserialization failures onto `StorageError`.
pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver-level failures onto the transient `Connection` class.
pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}
