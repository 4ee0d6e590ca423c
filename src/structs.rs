//! Frontend-agnostic representations of blog posts, as exchanged with a backend.

use crate::ObjectId;

/// The fields of a blog post that the caller controls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewBlog {
    /// The title of the post.
    pub title: String,
    /// The body of the post.
    pub content: String,
    /// An opaque reference to the author. It is never interpreted.
    pub author_id: String,
}

/// A blog post as it exists in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogDocument {
    /// The id assigned by the store on insert. It never changes.
    pub id: ObjectId,
    #[allow(missing_docs)]
    pub title: String,
    #[allow(missing_docs)]
    pub content: String,
    #[allow(missing_docs)]
    pub author_id: String,
}

impl BlogDocument {
    /// Overwrite every caller-controlled field, keeping the id.
    pub fn replace_fields(&mut self, blog: NewBlog) {
        let NewBlog {
            title,
            content,
            author_id,
        } = blog;
        self.title = title;
        self.content = content;
        self.author_id = author_id;
    }
}

/// The outcome of inserting a single document.
///
/// The key is returned exactly as the store produced it. It is the caller's responsibility to
/// check that it is a well-formed [`ObjectId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOneResult {
    /// The raw key of the new document.
    pub inserted_id: Vec<u8>,
}

/// The outcome of replacing a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOneResult {
    /// The number of documents whose key matched. Zero if the document no longer exists.
    pub matched_count: u64,
}

/// The outcome of deleting a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOneResult {
    /// The number of documents removed. Zero is not an error.
    pub deleted_count: u64,
}
