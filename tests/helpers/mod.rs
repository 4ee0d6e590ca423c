#![allow(dead_code)] // not every test binary uses every helper

use anyhow::{Context as _, Result};
use buffblog::proto::blog::{Blog, ListBlogResponse};
use futures::{Stream, StreamExt as _};
use tonic::{Code, Status};

/// A blog message with no id, as sent on create.
pub(crate) fn new_blog(author_id: &str, title: &str, content: &str) -> Blog {
    Blog {
        id: String::new(),
        author_id: author_id.to_owned(),
        title: title.to_owned(),
        content: content.to_owned(),
    }
}

/// Take the blog out of a response, failing if the server omitted it.
pub(crate) fn expect_blog(blog: Option<Blog>) -> Result<Blog> {
    blog.context("response contained no blog")
}

/// Drain a list stream, failing on the first error.
pub(crate) async fn collect_list<S>(mut stream: S) -> Result<Vec<Blog>>
where
    S: Stream<Item = Result<ListBlogResponse, Status>> + Unpin,
{
    let mut blogs = Vec::new();
    while let Some(response) = stream.next().await {
        blogs.push(expect_blog(response?.blog)?);
    }
    Ok(blogs)
}

pub(crate) fn assert_code<T>(result: Result<T, Status>, code: Code)
where
    T: std::fmt::Debug,
{
    match result {
        Ok(value) => panic!("expected status {code:?}, got {value:?}"),
        Err(status) => assert_eq!(status.code(), code, "{status:?}"),
    }
}
