use crate::backend::{decode_document, BlogBackend, CursorGuard, DatabaseBackend, RawDocument};
use crate::interop::classify_sqlite;
use crate::structs::{BlogDocument, DeleteOneResult, InsertOneResult, NewBlog, ReplaceOneResult};
use crate::tracing_shim::{trace_span, Instrument};
use crate::{BlogError, DynStream, Location, ObjectId};
use async_stream::stream;
use rusqlite::{params, Connection, OptionalExtension as _};
use std::sync::{Arc, Mutex};

/// A backend utilizing SQLite.
///
/// A single connection is opened when the backend is created and shared, behind a mutex, by every
/// operation. The lock is never held across an `.await`.
#[derive(Debug)]
pub struct Sqlite {
    location: Location,
    connection: Arc<Mutex<Connection>>,
}

impl Sqlite {
    /// Run a closure with exclusive access to the connection.
    fn with_conn<T>(
        connection: &Mutex<Connection>,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, BlogError> {
        let conn = connection
            .lock()
            .map_err(|_| BlogError::unavailable("SQLite connection mutex poisoned"))?;
        f(&conn).map_err(classify_sqlite)
    }

    /// Fetch the first document whose id sorts after `after`, or the very first document if
    /// `after` is `None`.
    fn next_document(
        connection: &Mutex<Connection>,
        after: Option<&[u8]>,
    ) -> Result<Option<RawDocument>, BlogError> {
        Self::with_conn(connection, |db| {
            let read_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<RawDocument> {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            };
            match after {
                Some(after) => db
                    .query_row(
                        "SELECT id, title, content, author_id FROM blog
                        WHERE id > ? ORDER BY id LIMIT 1",
                        [after],
                        read_row,
                    )
                    .optional(),
                None => db
                    .query_row(
                        "SELECT id, title, content, author_id FROM blog ORDER BY id LIMIT 1",
                        [],
                        read_row,
                    )
                    .optional(),
            }
        })
    }
}

impl DatabaseBackend for Sqlite {
    type Connection = Connection;

    fn at_location(location: Location) -> Result<Self, BlogError> {
        let connection = Self::connect(&location)?;
        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS blog(
                    id BLOB PRIMARY KEY,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    author_id TEXT NOT NULL
                );",
            )
            .map_err(classify_sqlite)?;
        Ok(Self {
            location,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn location(&self) -> &Location {
        &self.location
    }

    fn connect(location: &Location) -> Result<Self::Connection, BlogError> {
        match location {
            Location::InMemory => Connection::open_in_memory(),
            Location::OnDisk { path } => Connection::open(path),
        }
        .map_err(classify_sqlite)
    }
}

impl BlogBackend for Sqlite {
    type Cursor = DynStream<Result<BlogDocument, BlogError>>;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn insert_one(&self, blog: NewBlog) -> Result<InsertOneResult, BlogError> {
        let NewBlog {
            title,
            content,
            author_id,
        } = blog;
        let id = ObjectId::generate();
        let inserted_id = Self::with_conn(&self.connection, |db| {
            db.query_row(
                "INSERT INTO blog(id, title, content, author_id) VALUES(?, ?, ?, ?) RETURNING id",
                params![id.bytes().as_slice(), title, content, author_id],
                |row| row.get(0),
            )
        })?;
        Ok(InsertOneResult { inserted_id })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn find_one(&self, id: ObjectId) -> Result<Option<BlogDocument>, BlogError> {
        let raw = Self::with_conn(&self.connection, |db| {
            db.query_row(
                "SELECT id, title, content, author_id FROM blog WHERE id = ?",
                [id.bytes().as_slice()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
        })?;
        raw.map(decode_document).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn replace_one(&self, blog: BlogDocument) -> Result<ReplaceOneResult, BlogError> {
        let BlogDocument {
            id,
            title,
            content,
            author_id,
        } = blog;
        let matched = Self::with_conn(&self.connection, |db| {
            db.execute(
                "UPDATE blog SET title = ?, content = ?, author_id = ? WHERE id = ?",
                params![title, content, author_id, id.bytes().as_slice()],
            )
        })?;
        Ok(ReplaceOneResult {
            matched_count: matched as u64,
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn delete_one(&self, id: ObjectId) -> Result<DeleteOneResult, BlogError> {
        let deleted = Self::with_conn(&self.connection, |db| {
            db.execute("DELETE FROM blog WHERE id = ?", [id.bytes().as_slice()])
        })?;
        Ok(DeleteOneResult {
            deleted_count: deleted as u64,
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn find_all(&self) -> Result<Self::Cursor, BlogError> {
        // Fail before streaming anything if the collection cannot be read at all.
        let first = Self::next_document(&self.connection, None)?;
        let connection = Arc::clone(&self.connection);

        let stream = stream!({
            let _guard = CursorGuard::new("SQLite");
            let mut next = first;
            while let Some(raw) = next.take() {
                let last_id = raw.0.clone();
                match decode_document(raw) {
                    Ok(document) => yield Ok(document),
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
                match Self::next_document(&connection, Some(last_id.as_slice())) {
                    Ok(raw) => next = raw,
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        })
        .instrument(trace_span!("SQLite blog cursor"));
        Ok(Box::pin(stream))
    }
}
