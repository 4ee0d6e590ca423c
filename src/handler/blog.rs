//! A handler for blog posts.

use crate::backend::BlogBackend;
use crate::interop::IntoTonicStatus as _;
use crate::proto::blog::{
    Blog, CreateBlogRequest, CreateBlogResponse, DeleteBlogRequest, DeleteBlogResponse,
    ListBlogRequest, ListBlogResponse, ReadBlogRequest, ReadBlogResponse, UpdateBlogRequest,
    UpdateBlogResponse,
};
use crate::service::blog::BlogRpc;
use crate::structs::{BlogDocument, DeleteOneResult, InsertOneResult, NewBlog, ReplaceOneResult};
use crate::tracing_shim::{debug, error, warn};
use crate::{BlogError, DynStream, Location, ObjectId, RpcResponse};
use async_stream::stream;
use futures::StreamExt as _;
use std::path::PathBuf;
use tonic::{Request, Response, Status};

/// A handler for blog posts, each with a title, content, and an author.
///
/// The handler owns the store it was constructed with and issues at most one store operation per
/// request, apart from updates, which read the current document before replacing it. The read and
/// the replace are not atomic together; concurrent updates of the same post are last-writer-wins.
#[must_use]
#[derive(Debug)]
pub struct BlogHandler<Backend> {
    backend: Backend,
}

impl<Backend> BlogHandler<Backend> {
    /// Create a handler serving the given, already opened, store.
    #[inline]
    pub const fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// The store backing this handler.
    #[inline]
    pub const fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Take the store out of the handler.
    #[inline]
    pub fn into_backend(self) -> Backend {
        self.backend
    }
}

impl<Backend> BlogHandler<Backend>
where
    Backend: BlogBackend,
{
    /// Open the store at the given location and create a handler for it.
    #[inline]
    pub fn at_location(location: Location) -> Result<Self, BlogError> {
        Backend::at_location(location).map(Self::new)
    }

    /// Open the store at the given path on disk and create a handler for it.
    #[inline]
    pub fn at_path<P>(path: P) -> Result<Self, BlogError>
    where
        P: Into<PathBuf>,
    {
        Self::at_location(Location::OnDisk { path: path.into() })
    }

    /// Create a handler for a new, empty, in-memory store.
    #[inline]
    pub fn in_memory() -> Result<Self, BlogError> {
        Self::at_location(Location::InMemory)
    }

    /// Store a new blog post. The store assigns the id.
    ///
    /// # Errors
    ///
    /// [`BlogError::StoreUnavailable`] if the insert fails, [`BlogError::InternalInconsistency`]
    /// if the store reports an assigned key that is not an [`ObjectId`].
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn create(&self, blog: NewBlog) -> Result<BlogDocument, BlogError> {
        let InsertOneResult { inserted_id } = self.backend.insert_one(blog.clone()).await?;
        let id = ObjectId::try_from(inserted_id.as_slice()).map_err(|err| {
            BlogError::inconsistent(format!("cannot convert inserted key to an id: {err}"))
        })?;
        debug!(%id, "blog created");

        let NewBlog {
            title,
            content,
            author_id,
        } = blog;
        Ok(BlogDocument {
            id,
            title,
            content,
            author_id,
        })
    }

    /// Fetch the blog post with the given id.
    ///
    /// # Errors
    ///
    /// [`BlogError::InvalidArgument`] if `id` is malformed, [`BlogError::NotFound`] if there is no
    /// such post.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn read(&self, id: &str) -> Result<BlogDocument, BlogError> {
        let id = id.parse::<ObjectId>()?;
        self.backend
            .find_one(id)
            .await?
            .ok_or(BlogError::NotFound(id))
    }

    /// Replace the title, content, and author of an existing blog post.
    ///
    /// Every field is overwritten; there is no partial update.
    ///
    /// # Errors
    ///
    /// [`BlogError::InvalidArgument`] if `id` is malformed, [`BlogError::NotFound`] if there is no
    /// such post (including one deleted between the read and the replace).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn update(&self, id: &str, blog: NewBlog) -> Result<BlogDocument, BlogError> {
        let id = id.parse::<ObjectId>()?;
        let Some(mut document) = self.backend.find_one(id).await? else {
            return Err(BlogError::NotFound(id));
        };
        document.replace_fields(blog);

        let ReplaceOneResult { matched_count } =
            self.backend.replace_one(document.clone()).await?;
        debug!(%id, matched_count, "blog replaced");
        if matched_count == 0 {
            return Err(BlogError::NotFound(id));
        }
        Ok(document)
    }

    /// Delete the blog post with the given id.
    ///
    /// Deleting a post that does not exist succeeds; the returned count is zero.
    ///
    /// # Errors
    ///
    /// [`BlogError::InvalidArgument`] if `id` is malformed, [`BlogError::StoreUnavailable`] if the
    /// delete fails.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn delete(&self, id: &str) -> Result<DeleteOneResult, BlogError> {
        let id = id.parse::<ObjectId>()?;
        let result = self.backend.delete_one(id).await?;
        debug!(%id, deleted_count = result.deleted_count, "blog deleted");
        Ok(result)
    }

    /// Stream every blog post in the store's natural order.
    ///
    /// The stream is lazy: each item is read from the store only when it is polled. It ends after
    /// the last post or after the first error, whichever comes first. The underlying cursor is
    /// released when the stream ends or is dropped.
    ///
    /// # Errors
    ///
    /// [`BlogError::StoreUnavailable`] if the cursor cannot be opened. Errors while streaming are
    /// yielded as the final item.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn list(&self) -> Result<DynStream<Result<BlogDocument, BlogError>>, BlogError> {
        let mut cursor = self.backend.find_all().await?;
        let stream = stream!({
            while let Some(item) = cursor.next().await {
                let failed = item.is_err();
                yield item;
                if failed {
                    break;
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

impl From<BlogDocument> for Blog {
    fn from(document: BlogDocument) -> Self {
        let BlogDocument {
            id,
            title,
            content,
            author_id,
        } = document;
        Self {
            id: id.to_hex(),
            title,
            content,
            author_id,
        }
    }
}

/// Split a blog message into its id and the fields the caller controls. A missing message is
/// treated as one with every field empty.
fn split_blog(blog: Option<Blog>) -> (String, NewBlog) {
    let Blog {
        id,
        title,
        content,
        author_id,
    } = blog.unwrap_or_default();
    (
        id,
        NewBlog {
            title,
            content,
            author_id,
        },
    )
}

/// Convert a failure into a status, logging it at a level matching its kind.
fn into_status(err: BlogError) -> Status {
    match &err {
        BlogError::InvalidArgument(_) | BlogError::NotFound(_) => {
            debug!(%err, "blog request rejected");
        }
        BlogError::StoreUnavailable(_) => {
            warn!(%err, "blog store unavailable");
        }
        BlogError::InternalInconsistency(_) => {
            error!(%err, "blog store returned inconsistent data");
        }
    }
    err.into_tonic_status()
}

#[tonic::async_trait]
impl<Backend> BlogRpc for BlogHandler<Backend>
where
    Backend: BlogBackend + 'static,
{
    type ListBlogStream = DynStream<Result<ListBlogResponse, Status>>;

    async fn create_blog(
        &self,
        request: Request<CreateBlogRequest>,
    ) -> RpcResponse<CreateBlogResponse> {
        debug!("create blog request");
        let CreateBlogRequest { blog } = request.into_inner();
        let (_, blog) = split_blog(blog);
        let blog = self.create(blog).await.map_err(into_status)?;
        Ok(Response::new(CreateBlogResponse {
            blog: Some(blog.into()),
        }))
    }

    async fn read_blog(&self, request: Request<ReadBlogRequest>) -> RpcResponse<ReadBlogResponse> {
        debug!("read blog request");
        let ReadBlogRequest { blog_id } = request.into_inner();
        let blog = self.read(&blog_id).await.map_err(into_status)?;
        Ok(Response::new(ReadBlogResponse {
            blog: Some(blog.into()),
        }))
    }

    async fn update_blog(
        &self,
        request: Request<UpdateBlogRequest>,
    ) -> RpcResponse<UpdateBlogResponse> {
        debug!("update blog request");
        let UpdateBlogRequest { blog } = request.into_inner();
        let (id, blog) = split_blog(blog);
        let blog = self.update(&id, blog).await.map_err(into_status)?;
        Ok(Response::new(UpdateBlogResponse {
            blog: Some(blog.into()),
        }))
    }

    async fn delete_blog(
        &self,
        request: Request<DeleteBlogRequest>,
    ) -> RpcResponse<DeleteBlogResponse> {
        debug!("delete blog request");
        let DeleteBlogRequest { blog_id } = request.into_inner();
        let _result = self.delete(&blog_id).await.map_err(into_status)?;
        Ok(Response::new(DeleteBlogResponse { blog_id }))
    }

    async fn list_blog(
        &self,
        _request: Request<ListBlogRequest>,
    ) -> RpcResponse<Self::ListBlogStream> {
        debug!("list blog request");
        let documents = self.list().await.map_err(into_status)?;
        let stream = documents.map(|item| {
            item.map(|blog| ListBlogResponse {
                blog: Some(blog.into()),
            })
            .map_err(into_status)
        });
        Ok(Response::new(Box::pin(stream)))
    }
}
