//! Storage engines that can hold a collection of blog posts.
//!
//! A backend is the document store the [`BlogHandler`](crate::handler::BlogHandler) is built on.
//! It is opened once, before any request is served, and closed when it is dropped. Any type
//! implementing [`BlogBackend`] can be injected into a handler, which is how tests substitute
//! stores with injected faults.

#[cfg(feature = "duckdb")]
mod duckdb;
#[cfg(feature = "rocksdb")]
mod rocksdb;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "duckdb")]
pub use self::duckdb::DuckDb;
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::RocksDb;
#[cfg(feature = "sqlite")]
pub use self::sqlite::Sqlite;
use crate::structs::{BlogDocument, DeleteOneResult, InsertOneResult, NewBlog, ReplaceOneResult};
use crate::tracing_shim::trace;
use crate::{BlogError, Location, ObjectId};
use futures::Stream;

/// The `Send` future returned by a backend operation.
macro_rules! future_send {
    ($t:ty) => {
        impl ::core::future::Future<Output = $t> + Send
    };
}

/// A storage engine at a fixed location.
pub trait DatabaseBackend: Sized {
    /// The handle used to talk to the underlying database.
    type Connection;

    /// Open the store at the given location, creating the collection if necessary.
    fn at_location(location: Location) -> Result<Self, BlogError>;

    /// The location of the store.
    fn location(&self) -> &Location;

    /// Open a new connection to the database at `location`.
    ///
    /// Backends call this exactly once, from [`DatabaseBackend::at_location`]. It is recommended
    /// to **not** call this method directly unless you are implementing a new backend.
    fn connect(location: &Location) -> Result<Self::Connection, BlogError>;
}

/// A collection of blog posts supporting single-document operations and a full scan.
///
/// All methods must be safe to call concurrently. None of them may retry internally: failures are
/// returned immediately, classified as [`BlogError::StoreUnavailable`] or
/// [`BlogError::InternalInconsistency`].
pub trait BlogBackend: DatabaseBackend + Send + Sync {
    /// An open cursor over every document in the collection.
    ///
    /// The cursor yields documents in ascending id order. Dropping it releases every resource it
    /// holds. An `Err` item is terminal: the cursor yields nothing afterwards.
    type Cursor: Stream<Item = Result<BlogDocument, BlogError>> + Send + Unpin + 'static;

    /// Insert a new document, letting the store assign its id.
    fn insert_one(&self, blog: NewBlog) -> future_send!(Result<InsertOneResult, BlogError>);

    /// Find the document with the given id, if any.
    fn find_one(&self, id: ObjectId) -> future_send!(Result<Option<BlogDocument>, BlogError>);

    /// Replace every field of the document with the same id. Never inserts.
    fn replace_one(&self, blog: BlogDocument)
        -> future_send!(Result<ReplaceOneResult, BlogError>);

    /// Delete the document with the given id. Deleting nothing is not an error.
    fn delete_one(&self, id: ObjectId) -> future_send!(Result<DeleteOneResult, BlogError>);

    /// Open a cursor over every document in the collection.
    fn find_all(&self) -> future_send!(Result<Self::Cursor, BlogError>);
}

/// Raw column values of a stored document, before the id is checked.
#[cfg(any(feature = "sqlite", feature = "duckdb"))]
type RawDocument = (Vec<u8>, String, String, String);

/// Turn raw column values into a document, checking the shape of the stored id.
#[cfg(any(feature = "sqlite", feature = "duckdb"))]
fn decode_document(
    (id, title, content, author_id): RawDocument,
) -> Result<BlogDocument, BlogError> {
    Ok(BlogDocument {
        id: ObjectId::try_from(id.as_slice()).map_err(BlogError::inconsistent)?,
        title,
        content,
        author_id,
    })
}

/// Marks the lifetime of an open cursor, logging when it is released however the scan ends:
/// exhaustion, a failure, or the consumer dropping the stream.
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
struct CursorGuard {
    backend: &'static str,
}

impl CursorGuard {
    /// Mark a cursor of the named backend as open.
    fn new(backend: &'static str) -> Self {
        trace!(backend = backend, "blog cursor opened");
        Self { backend }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        trace!(backend = self.backend, "blog cursor released");
    }
}
