use crate::backend::{BlogBackend, CursorGuard, DatabaseBackend};
use crate::interop::classify_rocksdb;
use crate::proto::blog::Blog;
use crate::structs::{BlogDocument, DeleteOneResult, InsertOneResult, NewBlog, ReplaceOneResult};
use crate::tracing_shim::{trace_span, Instrument};
use crate::{BlogError, DynStream, Location, ObjectId};
use async_stream::stream;
use prost::Message as _;
use rocksdb::{Direction, Env, IteratorMode, Options, TransactionDB, TransactionDBOptions};
use std::fmt;
use std::sync::Arc;

/// The path used for the database when it lives in RocksDB's in-memory environment.
const IN_MEMORY_PATH: &str = "blog";

/// A key-value pair as stored: the raw id and the encoded document.
type Entry = (Box<[u8]>, Box<[u8]>);

/// A backend utilizing RocksDB.
///
/// Keys are the raw id bytes, so RocksDB's byte-wise key order is the cursor order. Values are the
/// protobuf encoding of the document without its id.
pub struct RocksDb {
    location: Location,
    db: Arc<TransactionDB>,
}

impl fmt::Debug for RocksDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksDb")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Encode the caller-controlled fields of a document.
fn encode(title: String, content: String, author_id: String) -> Vec<u8> {
    Blog {
        id: String::new(),
        title,
        content,
        author_id,
    }
    .encode_to_vec()
}

/// Decode a stored entry, checking both the key and the value.
fn decode((key, value): Entry) -> Result<BlogDocument, BlogError> {
    let id = ObjectId::try_from(key.as_ref()).map_err(BlogError::inconsistent)?;
    let Blog {
        title,
        content,
        author_id,
        ..
    } = Blog::decode(value.as_ref()).map_err(BlogError::inconsistent)?;
    Ok(BlogDocument {
        id,
        title,
        content,
        author_id,
    })
}

impl RocksDb {
    /// Fetch the first entry whose key sorts after `after`, or the very first entry if `after` is
    /// `None`.
    fn next_entry(db: &TransactionDB, after: Option<&[u8]>) -> Result<Option<Entry>, BlogError> {
        let mode = match after {
            Some(after) => IteratorMode::From(after, Direction::Forward),
            None => IteratorMode::Start,
        };
        for item in db.iterator(mode) {
            let (key, value) = item.map_err(classify_rocksdb)?;
            if Some(key.as_ref()) != after {
                return Ok(Some((key, value)));
            }
        }
        Ok(None)
    }
}

impl DatabaseBackend for RocksDb {
    type Connection = TransactionDB;

    fn at_location(location: Location) -> Result<Self, BlogError> {
        let db = Self::connect(&location)?;
        Ok(Self {
            location,
            db: Arc::new(db),
        })
    }

    fn location(&self) -> &Location {
        &self.location
    }

    fn connect(location: &Location) -> Result<Self::Connection, BlogError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let txn_opts = TransactionDBOptions::default();
        match location {
            Location::InMemory => {
                let env = Env::mem_env().map_err(classify_rocksdb)?;
                opts.set_env(&env);
                TransactionDB::open(&opts, &txn_opts, IN_MEMORY_PATH)
            }
            Location::OnDisk { path } => TransactionDB::open(&opts, &txn_opts, path),
        }
        .map_err(classify_rocksdb)
    }
}

impl BlogBackend for RocksDb {
    type Cursor = DynStream<Result<BlogDocument, BlogError>>;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn insert_one(&self, blog: NewBlog) -> Result<InsertOneResult, BlogError> {
        let NewBlog {
            title,
            content,
            author_id,
        } = blog;
        let id = ObjectId::generate().bytes();
        self.db
            .put(id, encode(title, content, author_id))
            .map_err(classify_rocksdb)?;
        Ok(InsertOneResult {
            inserted_id: id.to_vec(),
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn find_one(&self, id: ObjectId) -> Result<Option<BlogDocument>, BlogError> {
        let key = id.bytes();
        let Some(value) = self.db.get(key).map_err(classify_rocksdb)? else {
            return Ok(None);
        };
        decode((Box::from(key.as_slice()), value.into_boxed_slice())).map(Some)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn replace_one(&self, blog: BlogDocument) -> Result<ReplaceOneResult, BlogError> {
        let BlogDocument {
            id,
            title,
            content,
            author_id,
        } = blog;
        let key = id.bytes();
        let txn = self.db.transaction();
        let exists = txn
            .get_for_update(key, true)
            .map_err(classify_rocksdb)?
            .is_some();
        if exists {
            txn.put(key, encode(title, content, author_id))
                .map_err(classify_rocksdb)?;
        }
        txn.commit().map_err(classify_rocksdb)?;
        Ok(ReplaceOneResult {
            matched_count: u64::from(exists),
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn delete_one(&self, id: ObjectId) -> Result<DeleteOneResult, BlogError> {
        let key = id.bytes();
        let txn = self.db.transaction();
        let exists = txn
            .get_for_update(key, true)
            .map_err(classify_rocksdb)?
            .is_some();
        if exists {
            txn.delete(key).map_err(classify_rocksdb)?;
        }
        txn.commit().map_err(classify_rocksdb)?;
        Ok(DeleteOneResult {
            deleted_count: u64::from(exists),
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    async fn find_all(&self) -> Result<Self::Cursor, BlogError> {
        let first = Self::next_entry(&self.db, None)?;
        let db = Arc::clone(&self.db);

        let stream = stream!({
            let _guard = CursorGuard::new("RocksDB");
            let mut next = first;
            while let Some(entry) = next.take() {
                let last_key = entry.0.clone();
                match decode(entry) {
                    Ok(document) => yield Ok(document),
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
                match Self::next_entry(&db, Some(last_key.as_ref())) {
                    Ok(entry) => next = entry,
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        })
        .instrument(trace_span!("RocksDB blog cursor"));
        Ok(Box::pin(stream))
    }
}
