//! Failure paths of the handler, driven by a backend with injected faults.

mod helpers;

use crate::helpers::{assert_code, new_blog};
use anyhow::Result;
use async_stream::stream;
use buffblog::backend::{BlogBackend, DatabaseBackend};
use buffblog::handler::BlogHandler;
use buffblog::proto::blog::{
    Blog, CreateBlogRequest, DeleteBlogRequest, ListBlogRequest, ReadBlogRequest,
    UpdateBlogRequest,
};
use buffblog::service::blog::BlogRpc as _;
use buffblog::structs::{
    BlogDocument, DeleteOneResult, InsertOneResult, NewBlog, ReplaceOneResult,
};
use buffblog::{BlogError, DynStream, Location, ObjectId};
use futures::StreamExt as _;
use std::collections::BTreeMap;
use std::error::Error as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tonic::{Code, Request};

/// What the backend does wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    None,
    /// Every operation fails as if the store were unreachable.
    Unreachable,
    /// Inserts are rejected.
    Insert,
    /// Inserts succeed but report a key that is not an id.
    BadInsertedId,
    /// Replacing finds nothing, as if the document were deleted after it was read.
    VanishOnReplace,
    /// Cursors cannot be opened.
    OpenCursor,
    /// Cursors yield this many documents, then a corrupt one, then keep going.
    CorruptAfter(usize),
    /// Cursors yield this many documents, then fail to advance, then keep going.
    AdvanceFails(usize),
}

/// Counts cursors that have been opened but not yet dropped.
struct OpenCursor(Arc<AtomicUsize>);

impl OpenCursor {
    fn new(count: &Arc<AtomicUsize>) -> Self {
        let _previous = count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for OpenCursor {
    fn drop(&mut self) {
        let _previous = self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct FaultyBackend {
    location: Location,
    fault: Fault,
    documents: Mutex<BTreeMap<ObjectId, BlogDocument>>,
    calls: AtomicUsize,
    open_cursors: Arc<AtomicUsize>,
}

impl Default for FaultyBackend {
    fn default() -> Self {
        Self {
            location: Location::InMemory,
            fault: Fault::None,
            documents: Mutex::default(),
            calls: AtomicUsize::new(0),
            open_cursors: Arc::default(),
        }
    }
}

impl FaultyBackend {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Record a call, failing it if the store is unreachable.
    fn enter(&self) -> Result<(), BlogError> {
        let _previous = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fault == Fault::Unreachable {
            return Err(BlogError::unavailable("connection refused"));
        }
        Ok(())
    }
}

impl DatabaseBackend for FaultyBackend {
    type Connection = ();

    fn at_location(location: Location) -> Result<Self, BlogError> {
        Ok(Self {
            location,
            ..Self::default()
        })
    }

    fn location(&self) -> &Location {
        &self.location
    }

    fn connect(_location: &Location) -> Result<Self::Connection, BlogError> {
        Ok(())
    }
}

impl BlogBackend for FaultyBackend {
    type Cursor = DynStream<Result<BlogDocument, BlogError>>;

    async fn insert_one(&self, blog: NewBlog) -> Result<InsertOneResult, BlogError> {
        self.enter()?;
        match self.fault {
            Fault::Insert => Err(BlogError::unavailable("insert refused")),
            Fault::BadInsertedId => Ok(InsertOneResult {
                inserted_id: b"not-an-id".to_vec(),
            }),
            _ => {
                let id = ObjectId::generate();
                let mut document = BlogDocument {
                    id,
                    title: String::new(),
                    content: String::new(),
                    author_id: String::new(),
                };
                document.replace_fields(blog);
                let _previous = self.documents.lock().unwrap().insert(id, document);
                Ok(InsertOneResult {
                    inserted_id: id.bytes().to_vec(),
                })
            }
        }
    }

    async fn find_one(&self, id: ObjectId) -> Result<Option<BlogDocument>, BlogError> {
        self.enter()?;
        Ok(self.documents.lock().unwrap().get(&id).cloned())
    }

    async fn replace_one(&self, blog: BlogDocument) -> Result<ReplaceOneResult, BlogError> {
        self.enter()?;
        if self.fault == Fault::VanishOnReplace {
            return Ok(ReplaceOneResult { matched_count: 0 });
        }
        let mut documents = self.documents.lock().unwrap();
        let matched_count = match documents.get_mut(&blog.id) {
            Some(document) => {
                *document = blog;
                1
            }
            None => 0,
        };
        Ok(ReplaceOneResult { matched_count })
    }

    async fn delete_one(&self, id: ObjectId) -> Result<DeleteOneResult, BlogError> {
        self.enter()?;
        let removed = self.documents.lock().unwrap().remove(&id);
        Ok(DeleteOneResult {
            deleted_count: u64::from(removed.is_some()),
        })
    }

    async fn find_all(&self) -> Result<Self::Cursor, BlogError> {
        self.enter()?;
        if self.fault == Fault::OpenCursor {
            return Err(BlogError::unavailable("cannot open cursor"));
        }

        let documents: Vec<_> = self.documents.lock().unwrap().values().cloned().collect();
        let fault = self.fault;
        let open = OpenCursor::new(&self.open_cursors);
        Ok(Box::pin(stream!({
            let _open = open;
            for (i, document) in documents.into_iter().enumerate() {
                match fault {
                    Fault::CorruptAfter(n) if n == i => {
                        yield Err(BlogError::inconsistent("stored id has 7 bytes"));
                    }
                    Fault::AdvanceFails(n) if n == i => {
                        yield Err(BlogError::unavailable("cursor advance failed"));
                    }
                    _ => {}
                }
                yield Ok(document);
            }
        })))
    }
}

async fn handler_with(fault: Fault, posts: usize) -> Result<BlogHandler<FaultyBackend>> {
    let handler = BlogHandler::new(FaultyBackend::default());
    for i in 0..posts {
        let _created = handler
            .create(NewBlog {
                title: format!("post {i}"),
                content: "content".to_owned(),
                author_id: "author".to_owned(),
            })
            .await?;
    }

    let FaultyBackend {
        documents, calls, ..
    } = handler.into_backend();
    calls.store(0, Ordering::SeqCst);
    Ok(BlogHandler::new(FaultyBackend {
        fault,
        documents,
        calls,
        ..FaultyBackend::default()
    }))
}

#[tokio::test]
async fn test_malformed_id_never_reaches_the_store() -> Result<()> {
    let handler = handler_with(Fault::None, 1).await?;

    assert!(matches!(
        handler.read("not-an-id").await,
        Err(BlogError::InvalidArgument(_))
    ));
    assert!(matches!(
        handler.update("", NewBlog::default()).await,
        Err(BlogError::InvalidArgument(_))
    ));
    assert!(matches!(
        handler.delete("0123").await,
        Err(BlogError::InvalidArgument(_))
    ));
    assert_eq!(handler.backend().calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_unreachable_store_is_unavailable() -> Result<()> {
    let handler = handler_with(Fault::Unreachable, 0).await?;
    let id = ObjectId::generate().to_hex();

    assert_code(
        handler
            .create_blog(Request::new(CreateBlogRequest {
                blog: Some(new_blog("author", "title", "content")),
            }))
            .await,
        Code::Unavailable,
    );
    assert_code(
        handler
            .read_blog(Request::new(ReadBlogRequest {
                blog_id: id.clone(),
            }))
            .await,
        Code::Unavailable,
    );
    assert_code(
        handler
            .update_blog(Request::new(UpdateBlogRequest {
                blog: Some(Blog {
                    id: id.clone(),
                    ..new_blog("author", "title", "content")
                }),
            }))
            .await,
        Code::Unavailable,
    );
    assert_code(
        handler
            .delete_blog(Request::new(DeleteBlogRequest { blog_id: id }))
            .await,
        Code::Unavailable,
    );
    assert_code(
        handler
            .list_blog(Request::new(ListBlogRequest {}))
            .await
            .map(drop),
        Code::Unavailable,
    );

    // Failures are not retried.
    assert_eq!(handler.backend().calls(), 5);

    Ok(())
}

#[tokio::test]
async fn test_rejected_insert_is_unavailable() -> Result<()> {
    let handler = handler_with(Fault::Insert, 0).await?;

    let err = handler
        .create(new_fields())
        .await
        .expect_err("insert should fail");
    assert!(matches!(err, BlogError::StoreUnavailable(_)));
    assert!(err.is_retryable());

    Ok(())
}

#[tokio::test]
async fn test_malformed_inserted_key_is_internal() -> Result<()> {
    let handler = handler_with(Fault::BadInsertedId, 0).await?;

    let status = handler
        .create_blog(Request::new(CreateBlogRequest {
            blog: Some(new_blog("author", "title", "content")),
        }))
        .await
        .expect_err("a malformed key should be reported");
    assert_eq!(status.code(), Code::Internal);

    let source = status.source().expect("status should carry its cause");
    assert!(matches!(
        source.downcast_ref::<BlogError>(),
        Some(BlogError::InternalInconsistency(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_document_vanishing_during_update_is_not_found() -> Result<()> {
    let handler = handler_with(Fault::VanishOnReplace, 1).await?;
    let mut stream = handler.list().await?;
    let existing = stream.next().await.expect("one post was created")?;
    drop(stream);

    let err = handler
        .update(&existing.id.to_hex(), new_fields())
        .await
        .expect_err("update should not succeed");
    assert!(matches!(err, BlogError::NotFound(id) if id == existing.id));

    Ok(())
}

#[tokio::test]
async fn test_cursor_open_failure_fails_before_streaming() -> Result<()> {
    let handler = handler_with(Fault::OpenCursor, 3).await?;

    assert!(matches!(
        handler.list().await,
        Err(BlogError::StoreUnavailable(_))
    ));
    assert_eq!(handler.backend().open_cursors(), 0);

    Ok(())
}

#[tokio::test]
async fn test_corrupt_document_ends_the_stream() -> Result<()> {
    let handler = handler_with(Fault::CorruptAfter(2), 5).await?;

    let mut stream = handler
        .list_blog(Request::new(ListBlogRequest {}))
        .await?
        .into_inner();
    assert_eq!(handler.backend().open_cursors(), 1);

    assert!(stream.next().await.expect("first post")?.blog.is_some());
    assert!(stream.next().await.expect("second post")?.blog.is_some());
    let status = stream
        .next()
        .await
        .expect("the failure is delivered")
        .expect_err("the third item is corrupt");
    assert_eq!(status.code(), Code::Internal);
    assert!(stream.next().await.is_none());

    assert_eq!(handler.backend().open_cursors(), 0);

    Ok(())
}

#[tokio::test]
async fn test_advance_failure_ends_the_stream() -> Result<()> {
    let handler = handler_with(Fault::AdvanceFails(2), 5).await?;

    let mut stream = handler
        .list_blog(Request::new(ListBlogRequest {}))
        .await?
        .into_inner();

    assert!(stream.next().await.expect("first post")?.blog.is_some());
    assert!(stream.next().await.expect("second post")?.blog.is_some());
    let status = stream
        .next()
        .await
        .expect("the failure is delivered")
        .expect_err("the cursor cannot advance");
    assert_eq!(status.code(), Code::Unavailable);
    // The remaining posts are never delivered.
    assert!(stream.next().await.is_none());

    assert_eq!(handler.backend().open_cursors(), 0);

    Ok(())
}

#[tokio::test]
async fn test_cursor_released_when_exhausted() -> Result<()> {
    let handler = handler_with(Fault::None, 3).await?;

    let documents: Vec<_> = handler.list().await?.collect().await;
    assert_eq!(documents.len(), 3);
    assert!(documents.iter().all(Result::is_ok));
    assert_eq!(handler.backend().open_cursors(), 0);

    Ok(())
}

#[tokio::test]
async fn test_cursor_released_when_dropped() -> Result<()> {
    let handler = handler_with(Fault::None, 3).await?;

    let mut stream = handler.list().await?;
    let _first = stream.next().await.expect("three posts were created")?;
    assert_eq!(handler.backend().open_cursors(), 1);
    drop(stream);
    assert_eq!(handler.backend().open_cursors(), 0);

    Ok(())
}

#[tokio::test]
async fn test_delete_reports_count() -> Result<()> {
    let handler = handler_with(Fault::None, 1).await?;
    let existing = handler
        .list()
        .await?
        .next()
        .await
        .expect("one post was created")?;
    let id = existing.id.to_hex();

    assert_eq!(handler.delete(&id).await?.deleted_count, 1);
    assert_eq!(handler.delete(&id).await?.deleted_count, 0);

    Ok(())
}

fn new_fields() -> NewBlog {
    NewBlog {
        title: "title".to_owned(),
        content: "content".to_owned(),
        author_id: "author".to_owned(),
    }
}
