use crate::{Error, error::StorageError};

/// Extension trait for Result types to simplify store error mapping
///
/// Storage backends talk to clients with their own error types. This trait
/// converts those errors into warden storage errors without repeating the
/// `map_err` closure at every call site.
///
/// # Example
///
/// ```rust,ignore
/// use warden_core::error::utilities::StoreResultExt;
///
/// // Instead of:
/// // cmd.query_async(conn).await.map_err(|e| Error::Storage(StorageError::Command(e.to_string())))?;
///
/// // Use:
/// cmd.query_async(conn).await.map_store_err()?;
/// ```
pub trait StoreResultExt<T> {
    /// Convert a store command error to a warden storage error
    fn map_store_err(self) -> Result<T, Error>;

    /// Convert a store command error to a warden storage error with additional context
    fn map_store_err_with_context(self, context: &str) -> Result<T, Error>;

    /// Convert a connection-level error (pool exhausted, host unreachable)
    fn map_connection_err(self) -> Result<T, Error>;
}

impl<T, E: std::fmt::Display> StoreResultExt<T> for Result<T, E> {
    fn map_store_err(self) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Command(e.to_string())))
    }

    fn map_store_err_with_context(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Command(format!("{context}: {e}"))))
    }

    fn map_connection_err(self) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Connection(e.to_string())))
    }
}
