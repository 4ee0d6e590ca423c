//! A blog post service exposed over gRPC and backed by an embedded document store.
//!
//! The request handling lives in [`handler::BlogHandler`], which is generic over a
//! [`backend::BlogBackend`]. Backends are selected at compile time through cargo features; each
//! one stores the posts of a single collection at a given [`Location`].

#[cfg(not(any(feature = "duckdb", feature = "sqlite", feature = "rocksdb")))]
compile_error!("at least one backend must be enabled (options are `duckdb`, `sqlite` and `rocksdb`)");

pub mod backend;
mod error;
pub mod handler;
pub mod interop;
mod location;
mod object_id;
pub mod reflection;
pub mod structs;
mod tracing_shim;
pub mod transitive;

use futures::Stream;
use std::pin::Pin;

pub use self::error::BlogError;
pub use self::location::Location;
pub use self::object_id::{ObjectId, ParseObjectIdError};

/// Code generated from the protobuf definitions.
#[allow(missing_docs, unreachable_pub, clippy::missing_docs_in_private_items)]
pub mod proto {
    /// Messages and service definitions for the blog service.
    pub mod blog {
        tonic::include_proto!("blog");

        /// The encoded file descriptor set of `blog.proto`, served through gRPC reflection.
        pub const FILE_DESCRIPTOR_SET: &[u8] =
            tonic::include_file_descriptor_set!("blog_descriptor");
    }
}

/// gRPC clients.
pub mod client {
    /// The client for the blog service.
    pub mod blog {
        pub use crate::proto::blog::blog_service_client::BlogServiceClient as BlogClient;
    }
}

/// gRPC servers.
pub mod server {
    /// The server for the blog service.
    pub mod blog {
        pub use crate::proto::blog::blog_service_server::BlogServiceServer as BlogServer;
    }
}

/// The traits that a gRPC service must implement.
pub mod service {
    /// The trait implemented by the blog service.
    pub mod blog {
        pub use crate::proto::blog::blog_service_server::BlogService as BlogRpc;
    }
}

/// The result of a unary or server-streaming RPC.
pub type RpcResponse<T> = Result<tonic::Response<T>, tonic::Status>;

/// A boxed stream that can be sent across threads.
pub type DynStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;
