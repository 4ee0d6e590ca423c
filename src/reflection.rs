//! gRPC server reflection for the blog service.
//!
//! Lets clients such as `grpcurl` discover `blog.BlogService` and its messages without a copy of
//! `blog.proto`.

use crate::proto::blog::FILE_DESCRIPTOR_SET;
use tonic_reflection::server::v1::{ServerReflection, ServerReflectionServer};
use tonic_reflection::server::{Builder, Error};

/// Build a reflection service describing `blog.BlogService`.
///
/// # Errors
///
/// Fails only if the embedded file descriptor set cannot be decoded.
pub fn service() -> Result<ServerReflectionServer<impl ServerReflection>, Error> {
    Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
}
