//! Conversions between the errors of the storage engines, [`BlogError`], and [`tonic::Status`].

use crate::BlogError;
use std::sync::Arc;
use tonic::Status;

/// Convert an error into a [`tonic::Status`] with a stable status code.
pub trait IntoTonicStatus {
    /// Perform the conversion.
    fn into_tonic_status(self) -> Status;
}

impl IntoTonicStatus for BlogError {
    fn into_tonic_status(self) -> Status {
        let message = self.to_string();
        let mut status = match &self {
            Self::InvalidArgument(_) => Status::invalid_argument(message),
            Self::NotFound(_) => Status::not_found(message),
            Self::StoreUnavailable(_) => Status::unavailable(message),
            Self::InternalInconsistency(_) => Status::internal(message),
        };
        let _status = status.set_source(Arc::new(self));
        status
    }
}

impl From<BlogError> for Status {
    fn from(err: BlogError) -> Self {
        err.into_tonic_status()
    }
}

/// Convert an error into a [`tonic::Status`]. Useful as an argument to `.map_err`.
pub fn into_tonic_status(err: impl IntoTonicStatus) -> Status {
    err.into_tonic_status()
}

/// Classify an error raised by SQLite.
///
/// Failures to interpret a stored value are a sign of a corrupt or foreign document; everything
/// else is the store failing to do its job.
#[cfg(feature = "sqlite")]
pub(crate) fn classify_sqlite(err: rusqlite::Error) -> BlogError {
    use rusqlite::Error;

    match err {
        Error::FromSqlConversionFailure(..)
        | Error::IntegralValueOutOfRange(..)
        | Error::Utf8Error(..)
        | Error::InvalidColumnType(..) => BlogError::inconsistent(err),
        _ => BlogError::unavailable(err),
    }
}

/// Classify an error raised by DuckDB.
#[cfg(feature = "duckdb")]
pub(crate) fn classify_duckdb(err: duckdb::Error) -> BlogError {
    use duckdb::Error;

    match err {
        Error::FromSqlConversionFailure(..)
        | Error::IntegralValueOutOfRange(..)
        | Error::Utf8Error(..)
        | Error::InvalidColumnType(..) => BlogError::inconsistent(err),
        _ => BlogError::unavailable(err),
    }
}

/// Classify an error raised by RocksDB. RocksDB errors never describe the shape of a value, so
/// they always mean the store is unavailable.
#[cfg(feature = "rocksdb")]
pub(crate) fn classify_rocksdb(err: rocksdb::Error) -> BlogError {
    BlogError::unavailable(err)
}
