use crate::backend::{decode_document, BlogBackend, CursorGuard, DatabaseBackend, RawDocument};
use crate::interop::classify_duckdb;
use crate::structs::{BlogDocument, DeleteOneResult, InsertOneResult, NewBlog, ReplaceOneResult};
use crate::tracing_shim::{trace_span, Instrument};
use crate::{BlogError, DynStream, Location, ObjectId};
use async_stream::stream;
use duckdb::{params, Connection};
use std::sync::{Arc, Mutex};

/// A stored document as DuckDB returns it. Ids are kept as hexadecimal text.
type DuckDbRow = (String, String, String, String);

/// A backend utilizing DuckDB.
///
/// Ids are stored as hexadecimal text, which sorts identically to the raw bytes.
#[derive(Debug)]
pub struct DuckDb {
    location: Location,
    connection: Arc<Mutex<Connection>>,
}

/// Convert a row into raw column values, decoding the hexadecimal id.
fn into_raw((id, title, content, author_id): DuckDbRow) -> Result<RawDocument, BlogError> {
    let id = hex::decode(&id).map_err(BlogError::inconsistent)?;
    Ok((id, title, content, author_id))
}

impl DuckDb {
    /// Run a closure with exclusive access to the connection.
    fn with_conn<T>(
        connection: &Mutex<Connection>,
        f: impl FnOnce(&Connection) -> duckdb::Result<T>,
    ) -> Result<T, BlogError> {
        let conn = connection
            .lock()
            .map_err(|_| BlogError::unavailable("DuckDB connection mutex poisoned"))?;
        f(&conn).map_err(classify_duckdb)
    }

    /// Fetch the first document whose id sorts after `after`, or the very first document if
    /// `after` is `None`.
    fn next_document(
        connection: &Mutex<Connection>,
        after: Option<&str>,
    ) -> Result<Option<DuckDbRow>, BlogError> {
        Self::with_conn(connection, |db| {
            let read_row = |row: &duckdb::Row<'_>| -> duckdb::Result<DuckDbRow> {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            };
            let row = match after {
                Some(after) => db.query_row(
                    "SELECT id, title, content, author_id FROM blog
                    WHERE id > ? ORDER BY id LIMIT 1",
                    params![after],
                    read_row,
                ),
                None => db.query_row(
                    "SELECT id, title, content, author_id FROM blog ORDER BY id LIMIT 1",
                    [],
                    read_row,
                ),
            };
            match row {
                Ok(row) => Ok(Some(row)),
                Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(err),
            }
        })
    }
}

impl DatabaseBackend for DuckDb {
    type Connection = Connection;

    fn at_location(location: Location) -> Result<Self, BlogError> {
        let connection = Self::connect(&location)?;
        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS blog(
                    id VARCHAR PRIMARY KEY,
                    title VARCHAR NOT NULL,
                    content VARCHAR NOT NULL,
                    author_id VARCHAR NOT NULL
                );",
            )
            .map_err(classify_duckdb)?;
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
        .map_err(classify_duckdb)
    }
}

impl BlogBackend for DuckDb {
    type Cursor = DynStream<Result<BlogDocument, BlogError>>;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn insert_one(&self, blog: NewBlog) -> Result<InsertOneResult, BlogError> {
        let NewBlog {
            title,
            content,
            author_id,
        } = blog;
        let id = ObjectId::generate().to_hex();
        let inserted_id: String = Self::with_conn(&self.connection, |db| {
            db.query_row(
                "INSERT INTO blog(id, title, content, author_id) VALUES(?, ?, ?, ?) RETURNING id",
                params![id, title, content, author_id],
                |row| row.get(0),
            )
        })?;
        // A key that is not hexadecimal cannot be an id; pass the text through so that the
        // caller's shape check rejects it.
        let inserted_id = hex::decode(&inserted_id).unwrap_or_else(|_| inserted_id.into_bytes());
        Ok(InsertOneResult { inserted_id })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn find_one(&self, id: ObjectId) -> Result<Option<BlogDocument>, BlogError> {
        let id = id.to_hex();
        let row = Self::with_conn(&self.connection, |db| {
            match db.query_row(
                "SELECT id, title, content, author_id FROM blog WHERE id = ?",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            ) {
                Ok(row) => Ok(Some(row)),
                Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(err),
            }
        })?;
        row.map(|row| into_raw(row).and_then(decode_document))
            .transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn replace_one(&self, blog: BlogDocument) -> Result<ReplaceOneResult, BlogError> {
        let BlogDocument {
            id,
            title,
            content,
            author_id,
        } = blog;
        let id = id.to_hex();
        let matched = Self::with_conn(&self.connection, |db| {
            db.execute(
                "UPDATE blog SET title = ?, content = ?, author_id = ? WHERE id = ?",
                params![title, content, author_id, id],
            )
        })?;
        Ok(ReplaceOneResult {
            matched_count: matched as u64,
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn delete_one(&self, id: ObjectId) -> Result<DeleteOneResult, BlogError> {
        let id = id.to_hex();
        let deleted = Self::with_conn(&self.connection, |db| {
            db.execute("DELETE FROM blog WHERE id = ?", params![id])
        })?;
        Ok(DeleteOneResult {
            deleted_count: deleted as u64,
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn find_all(&self) -> Result<Self::Cursor, BlogError> {
        let first = Self::next_document(&self.connection, None)?;
        let connection = Arc::clone(&self.connection);

        let stream = stream!({
            let _guard = CursorGuard::new("DuckDB");
            let mut next = first;
            while let Some(row) = next.take() {
                let last_id = row.0.clone();
                match into_raw(row).and_then(decode_document) {
                    Ok(document) => yield Ok(document),
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
                match Self::next_document(&connection, Some(last_id.as_str())) {
                    Ok(row) => next = row,
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        })
        .instrument(trace_span!("DuckDB blog cursor"));
        Ok(Box::pin(stream))
    }
}
