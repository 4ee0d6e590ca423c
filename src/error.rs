//! The failures a blog operation can produce.

use crate::{ObjectId, ParseObjectIdError};
use std::error::Error;

/// A boxed error that can be sent across threads.
pub(crate) type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Every failure of a blog operation, classified at the point it is detected.
///
/// The variants separate "the input was bad" from "the store is unavailable" from
/// "the store returned something it should not have". Each maps to a distinct gRPC status code
/// (see [`IntoTonicStatus`](crate::interop::IntoTonicStatus)).
#[derive(Debug, thiserror::Error)]
pub enum BlogError {
    /// A caller-supplied id is not well-formed. No store access was made.
    #[error("cannot parse blog id: {0}")]
    InvalidArgument(#[from] ParseObjectIdError),
    /// A well-formed id did not match any stored blog post.
    #[error("cannot find blog with id {0}")]
    NotFound(ObjectId),
    /// The store rejected or could not complete an operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] BoxError),
    /// The store reported success but produced data of an unexpected shape.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(#[source] BoxError),
}

impl BlogError {
    /// The store could not complete an operation.
    pub fn unavailable(err: impl Into<BoxError>) -> Self {
        Self::StoreUnavailable(err.into())
    }

    /// The store returned data that cannot be interpreted.
    pub fn inconsistent(err: impl Into<BoxError>) -> Self {
        Self::InternalInconsistency(err.into())
    }

    /// Whether the caller may reasonably retry the same request later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}
